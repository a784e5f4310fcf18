//! Metric rendering and delivery.
//!
//! Every emission renders the *whole* device state into one [`MetricBatch`]
//! and hands it to each configured [`MetricSink`]. A failing sink is logged
//! and skipped; it never stops the other sinks or the scan loop.

pub mod mqtt;
pub mod pushgateway;

use crate::state::DeviceStates;
use serde::{Serialize, Serializer};
use std::future::Future;
use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, error};

/// Metric name of the unlabeled uptime gauge.
pub const UPTIME_METRIC: &str = "switchbotprobe_uptime";

/// Labeled per-device metric families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricFamily {
    Battery,
    Temperature,
    Humidity,
    CurtainPosition,
}

impl MetricFamily {
    pub const ALL: [MetricFamily; 4] = [
        MetricFamily::Battery,
        MetricFamily::Temperature,
        MetricFamily::Humidity,
        MetricFamily::CurtainPosition,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MetricFamily::Battery => "switchbot_battery",
            MetricFamily::Temperature => "switchbot_temperature",
            MetricFamily::Humidity => "switchbot_humidity",
            MetricFamily::CurtainPosition => "switchbot_curtain_position",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            MetricFamily::Battery => "Battery level of each SwitchBot device in percent.",
            MetricFamily::Temperature => "Temperature of each room in Celsius.",
            MetricFamily::Humidity => "Relative humidity of each room in percent.",
            MetricFamily::CurtainPosition => "Position of each SwitchBot curtain in percent.",
        }
    }
}

impl Serialize for MetricFamily {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Labels attached to every device sample, taken from the device's config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Labels {
    #[serde(rename = "type")]
    pub device_type: String,
    pub location: String,
    pub name: String,
}

/// One value of one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    #[serde(rename = "name")]
    pub family: MetricFamily,
    pub labels: Labels,
    pub value: f64,
}

/// Everything delivered to a sink in one emission.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricBatch {
    pub samples: Vec<MetricSample>,
    /// Unix time in seconds at emission.
    pub uptime: u64,
}

impl MetricBatch {
    pub fn new(states: &DeviceStates, now: SystemTime) -> Self {
        Self {
            samples: render_samples(states),
            uptime: now
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        }
    }

    pub fn family(&self, family: MetricFamily) -> impl Iterator<Item = &MetricSample> {
        self.samples.iter().filter(move |s| s.family == family)
    }
}

/// One sample per populated field of every seen device.
///
/// Absent fields produce no sample.
pub fn render_samples(states: &DeviceStates) -> Vec<MetricSample> {
    let mut samples = Vec::new();

    for (config, state) in states.snapshot() {
        let labels = Labels {
            device_type: config.device_type.clone(),
            location: config.location.clone(),
            name: config.name.clone(),
        };
        let reading = &state.reading;

        let mut add = |family: MetricFamily, value: Option<f64>| {
            if let Some(value) = value {
                samples.push(MetricSample {
                    family,
                    labels: labels.clone(),
                    value,
                });
            }
        };

        add(MetricFamily::Battery, reading.battery.map(f64::from));
        add(MetricFamily::Temperature, reading.temperature);
        add(MetricFamily::Humidity, reading.humidity.map(f64::from));
        add(
            MetricFamily::CurtainPosition,
            reading.curtain_position.map(f64::from),
        );
    }

    samples
}

/// Errors delivering a batch to a sink.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
    #[error("failed to serialize sample: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Future returned by [`MetricSink::push`].
pub type PushFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;

/// Destination for metric batches.
pub trait MetricSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Deliver one full batch.
    fn push<'a>(&'a self, batch: &'a MetricBatch) -> PushFuture<'a>;
}

/// Outcome of one emission.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EmitReport {
    pub samples: usize,
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

/// Fans one batch out to every sink.
pub struct Emitter {
    sinks: Vec<Box<dyn MetricSink>>,
}

impl Emitter {
    pub fn new(sinks: Vec<Box<dyn MetricSink>>) -> Self {
        Self { sinks }
    }

    /// Render the full state and push it to every sink.
    pub async fn emit(&self, states: &DeviceStates) -> EmitReport {
        let batch = MetricBatch::new(states, SystemTime::now());
        self.emit_batch(&batch).await
    }

    pub async fn emit_batch(&self, batch: &MetricBatch) -> EmitReport {
        let mut report = EmitReport {
            samples: batch.samples.len(),
            ..Default::default()
        };

        for sink in &self.sinks {
            match sink.push(batch).await {
                Ok(()) => {
                    debug!(sink = sink.name(), samples = batch.samples.len(), "pushed metrics");
                    report.delivered.push(sink.name().to_string());
                }
                Err(error) => {
                    error!(sink = sink.name(), %error, "failed to push metrics");
                    report.failed.push(sink.name().to_string());
                }
            }
        }

        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::reading::{DeviceType, Reading};
    use crate::test_utils::{CONTACT_MAC, TEST_MAC, test_registry};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Sink that records every batch it receives.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingSink {
        pub batches: Arc<Mutex<Vec<MetricBatch>>>,
    }

    impl MetricSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        fn push<'a>(&'a self, batch: &'a MetricBatch) -> PushFuture<'a> {
            self.batches.lock().unwrap().push(batch.clone());
            Box::pin(async { Ok(()) })
        }
    }

    /// Sink that always fails.
    pub(crate) struct FailingSink;

    impl MetricSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        fn push<'a>(&'a self, _batch: &'a MetricBatch) -> PushFuture<'a> {
            Box::pin(async { Err(SinkError::Status(503)) })
        }
    }

    pub(crate) fn meter_reading() -> Reading {
        Reading {
            battery: Some(90),
            temperature: Some(21.5),
            humidity: Some(45),
            ..Reading::empty(DeviceType::Meter)
        }
    }

    fn populated_states() -> DeviceStates {
        let mut states = DeviceStates::new(Arc::new(test_registry()));
        states.observe(TEST_MAC, meter_reading());
        states.observe(CONTACT_MAC, Reading::empty(DeviceType::Contact));
        states
    }

    #[test]
    fn test_absent_fields_produce_no_samples() {
        let states = populated_states();
        let batch = MetricBatch::new(&states, UNIX_EPOCH + Duration::from_secs(1_700_000_000));

        assert_eq!(batch.samples.len(), 3);
        assert_eq!(batch.family(MetricFamily::Temperature).count(), 1);
        assert_eq!(batch.family(MetricFamily::CurtainPosition).count(), 0);
        assert!(batch.samples.iter().all(|s| s.labels.name == "Living Room"));
        assert_eq!(batch.uptime, 1_700_000_000);
    }

    #[test]
    fn test_labels_come_from_config() {
        let states = populated_states();
        let samples = render_samples(&states);
        let temperature = samples
            .iter()
            .find(|s| s.family == MetricFamily::Temperature)
            .unwrap();
        assert_eq!(temperature.labels, Labels {
            device_type: "meter".to_string(),
            location: "living".to_string(),
            name: "Living Room".to_string(),
        });
        assert_eq!(temperature.value, 21.5);
    }

    #[test]
    fn test_sample_json_shape() {
        let sample = MetricSample {
            family: MetricFamily::Humidity,
            labels: Labels {
                device_type: "meter".to_string(),
                location: "living".to_string(),
                name: "Living Room".to_string(),
            },
            value: 45.0,
        };
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "switchbot_humidity",
                "labels": {"type": "meter", "location": "living", "name": "Living Room"},
                "value": 45.0
            })
        );
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_block_others() {
        let states = populated_states();
        let recording = RecordingSink::default();
        let emitter = Emitter::new(vec![Box::new(FailingSink), Box::new(recording.clone())]);

        let report = emitter.emit(&states).await;

        assert_eq!(report.failed, vec!["failing".to_string()]);
        assert_eq!(report.delivered, vec!["recording".to_string()]);
        assert_eq!(report.samples, 3);
        let batches = recording.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].samples.len(), 3);
    }

    #[tokio::test]
    async fn test_emit_without_sinks() {
        let states = populated_states();
        let report = Emitter::new(vec![]).emit(&states).await;
        assert_eq!(report.samples, 3);
        assert!(report.delivered.is_empty());
        assert!(report.failed.is_empty());
    }
}
