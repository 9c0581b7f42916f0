// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Single-slot coalescing event latch.
//!
//! An [`EventLatch`] is the trigger primitive used by every sensor
//! producer: a command arms it, the producer loop waits on it and clears
//! it atomically. Bursts of `arm()` calls before a drain collapse into a
//! single wakeup — the latch coalesces, it does not count.
//!
//! # Examples
//!
//! ```
//! use telelink::latch::EventLatch;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let latch = EventLatch::new();
//! latch.arm();
//! latch.arm(); // coalesces with the first arm
//! latch.wait().await; // returns once, latch is idle again
//! assert!(!latch.is_armed());
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// A boolean signal with arm / wait-and-clear semantics.
///
/// At most one pending arm is ever represented. The latch is a
/// single-consumer primitive: only one task may call [`wait`](Self::wait)
/// at a time.
#[derive(Debug, Default)]
pub struct EventLatch {
    armed: AtomicBool,
    notify: Notify,
}

impl EventLatch {
    /// Creates a new latch in the idle state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the latch, waking the waiter if one is suspended.
    ///
    /// Never fails. Arming an already-armed latch is a no-op.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    /// Returns true if the latch is currently armed.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Suspends until the latch is armed, then clears it and returns.
    ///
    /// The clear is atomic with the observation: exactly one `wait` returns
    /// per batch of arms since the previous return.
    pub async fn wait(&self) {
        loop {
            if self.armed.swap(false, Ordering::AcqRel) {
                return;
            }
            self.notify.notified().await;
        }
    }
}
