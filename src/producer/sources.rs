// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Built-in reading sources.
//!
//! Both sources are simulated stand-ins with the shape of the real
//! hardware: a BME280-style environment sensor and a camera. Real
//! hardware plugs in through the same [`ReadingSource`] trait.

use rand::Rng;

use crate::error::ProducerError;
use crate::message::{FieldValue, ReadingMap};

use super::{Reading, ReadingSource};

/// Simulated BME280 environment sensor.
///
/// Readings jitter inside a fixed band around the configured baselines:
/// temperature ± 0.5 °C, humidity ± 5 %.
#[derive(Debug, Clone)]
pub struct TemperatureSource {
    temperature_baseline: f64,
    humidity_baseline: f64,
}

impl TemperatureSource {
    const TEMPERATURE_JITTER: f64 = 0.5;
    const HUMIDITY_JITTER: f64 = 5.0;

    /// Creates a source with custom baselines.
    #[must_use]
    pub fn new(temperature_baseline: f64, humidity_baseline: f64) -> Self {
        Self {
            temperature_baseline,
            humidity_baseline,
        }
    }
}

impl Default for TemperatureSource {
    fn default() -> Self {
        Self::new(25.0, 50.0)
    }
}

impl ReadingSource for TemperatureSource {
    fn sensor(&self) -> &str {
        "BME280"
    }

    fn read(&self) -> Result<Reading, ProducerError> {
        let mut rng = rand::thread_rng();
        let temperature = self.temperature_baseline
            + rng.gen_range(-Self::TEMPERATURE_JITTER..=Self::TEMPERATURE_JITTER);
        let humidity =
            self.humidity_baseline + rng.gen_range(-Self::HUMIDITY_JITTER..=Self::HUMIDITY_JITTER);

        let mut data = ReadingMap::new();
        data.insert("temperature".to_string(), FieldValue::Number(temperature));
        data.insert("humidity".to_string(), FieldValue::Number(humidity));
        Ok(Reading::Telemetry(data))
    }
}

/// Simulated camera.
///
/// Emits the path of the captured picture; a real camera implementation
/// would write the file and report its location here.
#[derive(Debug, Clone)]
pub struct CameraSource {
    picture_path: String,
}

impl CameraSource {
    /// Creates a source reporting the given capture path.
    #[must_use]
    pub fn new(picture_path: impl Into<String>) -> Self {
        Self {
            picture_path: picture_path.into(),
        }
    }
}

impl Default for CameraSource {
    fn default() -> Self {
        Self::new("picture.jpg")
    }
}

impl ReadingSource for CameraSource {
    fn sensor(&self) -> &str {
        "camera"
    }

    fn read(&self) -> Result<Reading, ProducerError> {
        let mut data = ReadingMap::new();
        data.insert(
            "picture".to_string(),
            FieldValue::Text(self.picture_path.clone()),
        );
        Ok(Reading::Picture(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_stays_within_jitter_band() {
        let source = TemperatureSource::default();

        for _ in 0..100 {
            let Reading::Telemetry(data) = source.read().unwrap() else {
                panic!("expected telemetry reading");
            };
            let Some(FieldValue::Number(temperature)) = data.get("temperature") else {
                panic!("missing temperature field");
            };
            let Some(FieldValue::Number(humidity)) = data.get("humidity") else {
                panic!("missing humidity field");
            };

            assert!((24.5..=25.5).contains(temperature), "temperature {temperature}");
            assert!((45.0..=55.0).contains(humidity), "humidity {humidity}");
        }
    }

    #[test]
    fn custom_baselines_shift_the_band() {
        let source = TemperatureSource::new(-10.0, 80.0);
        let Reading::Telemetry(data) = source.read().unwrap() else {
            panic!("expected telemetry reading");
        };
        let Some(FieldValue::Number(temperature)) = data.get("temperature") else {
            panic!("missing temperature field");
        };
        assert!((-10.5..=-9.5).contains(temperature));
    }

    #[test]
    fn camera_reports_capture_path() {
        let source = CameraSource::new("shots/0001.jpg");
        let Reading::Picture(data) = source.read().unwrap() else {
            panic!("expected picture reading");
        };
        assert_eq!(data.get("picture"), Some(&FieldValue::from("shots/0001.jpg")));
    }

    #[test]
    fn sensor_names() {
        assert_eq!(TemperatureSource::default().sensor(), "BME280");
        assert_eq!(CameraSource::default().sensor(), "camera");
    }
}
