// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Edge device configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::connection::RetryPolicy;

/// Configuration for an edge device.
///
/// # Examples
///
/// ```
/// use telelink::config::EdgeConfig;
/// use telelink::connection::RetryPolicy;
///
/// let config = EdgeConfig::new("ws://hub.local:8765", "living_room")
///     .with_log_level("debug")
///     .with_session_retry(RetryPolicy::new(3, 1.0));
/// ```
#[derive(Debug, Clone)]
pub struct EdgeConfig {
    /// The hub URI (e.g. `ws://hub.local:8765`).
    pub uri: String,
    /// Location label stamped on every emitted reading.
    pub location: String,
    /// Log level hint for the host's subscriber setup.
    ///
    /// The library itself only emits `tracing` events and never installs
    /// a subscriber.
    pub log_level: Option<String>,
    /// Whether mutual TLS is enabled for the transport.
    pub use_tls: bool,
    /// Directory holding the CA certificate and the client cert/key pair.
    ///
    /// Only meaningful when `use_tls` is set; the host loads the
    /// certificates and hands the device a prebuilt connector.
    pub cert_dir: Option<PathBuf>,
    /// Session-level retry policy.
    pub session_retry: RetryPolicy,
    /// Connect-level retry policy.
    pub connect_retry: RetryPolicy,
    /// Outbound re-check delay while the transport is down.
    pub resend_delay: Duration,
    /// Grace period for draining queued messages on clean shutdown.
    pub shutdown_grace: Duration,
}

impl EdgeConfig {
    /// Creates a configuration with default retry policies and delays.
    #[must_use]
    pub fn new(uri: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            location: location.into(),
            log_level: None,
            use_tls: false,
            cert_dir: None,
            session_retry: RetryPolicy::session(),
            connect_retry: RetryPolicy::connect(),
            resend_delay: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(5),
        }
    }

    /// Sets the log level hint.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// Enables mutual TLS with certificates from the given directory.
    #[must_use]
    pub fn with_tls(mut self, cert_dir: impl Into<PathBuf>) -> Self {
        self.use_tls = true;
        self.cert_dir = Some(cert_dir.into());
        self
    }

    /// Sets the session-level retry policy.
    #[must_use]
    pub fn with_session_retry(mut self, policy: RetryPolicy) -> Self {
        self.session_retry = policy;
        self
    }

    /// Sets the connect-level retry policy.
    #[must_use]
    pub fn with_connect_retry(mut self, policy: RetryPolicy) -> Self {
        self.connect_retry = policy;
        self
    }

    /// Sets the outbound re-check delay.
    #[must_use]
    pub fn with_resend_delay(mut self, delay: Duration) -> Self {
        self.resend_delay = delay;
        self
    }

    /// Sets the clean-shutdown drain grace period.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}
