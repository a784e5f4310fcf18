//! Prometheus Pushgateway sink.
//!
//! Each push replaces the whole job group (`PUT /metrics/job/<job>`), so a
//! device only ever shows its latest reading.

use super::{MetricBatch, MetricFamily, MetricSink, PushFuture, SinkError, UPTIME_METRIC};
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use reqwest::header::CONTENT_TYPE;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

const LABEL_NAMES: [&str; 3] = ["type", "location", "name"];

/// Upper bound for one push request, connect included.
const PUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Prefix of the job name; the host name is appended.
pub const JOB_PREFIX: &str = "switchbot_";

/// Job name derived from the local host name.
pub fn default_job_name() -> String {
    format!("{JOB_PREFIX}{}", hostname().unwrap_or_else(|| "localhost".to_string()))
}

fn hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY: buf is valid for writes of buf.len() bytes.
    let ret = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if ret != 0 {
        return None;
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = String::from_utf8_lossy(&buf[..len]).into_owned();
    (!name.is_empty()).then_some(name)
}

/// Build the push URL; a bare `host:port` is treated as plain HTTP.
pub fn push_url(gateway: &str, job: &str) -> String {
    let gateway = gateway.trim().trim_end_matches('/');
    if gateway.starts_with("http://") || gateway.starts_with("https://") {
        format!("{gateway}/metrics/job/{job}")
    } else {
        format!("http://{gateway}/metrics/job/{job}")
    }
}

/// Render a batch in the Prometheus text exposition format.
pub fn render(batch: &MetricBatch) -> Result<String, prometheus::Error> {
    let registry = Registry::new();

    let uptime = Gauge::new(UPTIME_METRIC, "Uptime of switchbot_probe")?;
    uptime.set(batch.uptime as f64);
    registry.register(Box::new(uptime))?;

    let mut families = HashMap::new();
    for family in MetricFamily::ALL {
        let gauge = GaugeVec::new(Opts::new(family.name(), family.help()), &LABEL_NAMES)?;
        registry.register(Box::new(gauge.clone()))?;
        families.insert(family, gauge);
    }

    for sample in &batch.samples {
        if let Some(gauge) = families.get(&sample.family) {
            gauge
                .get_metric_with_label_values(&[
                    sample.labels.device_type.as_str(),
                    sample.labels.location.as_str(),
                    sample.labels.name.as_str(),
                ])?
                .set(sample.value);
        }
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Pushes every batch to a Pushgateway job.
pub struct PushGateway {
    client: reqwest::Client,
    url: String,
}

impl PushGateway {
    pub fn new(gateway: &str, job: &str) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(PUSH_TIMEOUT).build()?;
        let url = push_url(gateway, job);
        info!(%url, "pushing metrics to pushgateway");
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, batch: &MetricBatch) -> Result<(), SinkError> {
        let body = render(batch)?;
        let response = self
            .client
            .put(&self.url)
            .header(CONTENT_TYPE, prometheus::TEXT_FORMAT)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status(status.as_u16()));
        }
        Ok(())
    }
}

impl MetricSink for PushGateway {
    fn name(&self) -> &str {
        "pushgateway"
    }

    fn push<'a>(&'a self, batch: &'a MetricBatch) -> PushFuture<'a> {
        Box::pin(self.send(batch))
    }
}
