//! MQTT publish sink.
//!
//! Every sample becomes its own JSON message on the configured topic:
//!
//! ```json
//! {"name": "switchbot_temperature", "labels": {"type": "meter", "location": "living", "name": "Living Room"}, "value": 21.5}
//! ```
//!
//! The rumqttc event loop runs in its own task. Publishing only enqueues
//! into the client's request channel and never waits for the broker. When
//! the queue fills up partway through a batch, the samples already enqueued
//! are still sent, the rest are dropped and the batch is reported as failed.
//! The next emission carries the full state again.

use super::{MetricBatch, MetricSample, MetricSink, PushFuture, SinkError};
use crate::config::MqttConfig;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tracing::{info, warn};

/// Capacity of the request queue between publisher and event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 256;

/// Delay before polling again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Publishes samples to an MQTT broker.
pub struct MqttPublisher {
    client: AsyncClient,
    topic: String,
}

impl MqttPublisher {
    /// Create the client and spawn its event loop on the current runtime.
    pub fn connect(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        info!(host = %config.host, port = config.port, topic = %config.topic, "connecting to MQTT broker");
        tokio::spawn(drive(eventloop));

        Self::with_client(client, config.topic.clone())
    }

    pub fn with_client(client: AsyncClient, topic: String) -> Self {
        Self { client, topic }
    }

    fn publish_batch(&self, batch: &MetricBatch) -> Result<(), SinkError> {
        for sample in &batch.samples {
            let payload = message(sample)?;
            self.client
                .try_publish(self.topic.as_str(), QoS::AtMostOnce, false, payload)?;
        }
        Ok(())
    }
}

/// JSON body of one sample.
pub fn message(sample: &MetricSample) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(sample)
}

/// Poll the event loop forever; rumqttc reconnects on the next poll after an error.
async fn drive(mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => info!("connected to MQTT broker"),
            Ok(_) => {}
            Err(error) => {
                warn!(%error, "MQTT connection error");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

impl MetricSink for MqttPublisher {
    fn name(&self) -> &str {
        "mqtt"
    }

    fn push<'a>(&'a self, batch: &'a MetricBatch) -> PushFuture<'a> {
        let result = self.publish_batch(batch);
        Box::pin(async move { result })
    }
}
