//! Core application runner for `switchbot-probe`.
//!
//! Decoupled from CLI parsing, logging setup and process exit codes so the
//! whole decode → observe → emit path can be driven by a fake scanner and
//! fake sinks in tests.

use crate::advertisement::{AD_TYPE_SERVICE_DATA_16, RawAdvertisement};
use crate::config::{ConfigError, Settings};
use crate::decoder::decode;
use crate::output::mqtt::MqttPublisher;
use crate::output::pushgateway::{PushGateway, default_job_name};
use crate::output::{EmitReport, Emitter, MetricSink, SinkError};
use crate::registry::DeviceRegistry;
use crate::scanner::{Backend, ScanError};
use crate::state::DeviceStates;
use crate::throttle::Throttle;
use clap::Parser;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Command line options.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Settings file with the device list and sink addresses.
    #[arg(long, default_value = "settings.json")]
    pub config: PathBuf,

    /// Verbose output, log every observation and undecodable advertisement
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Emit at most once per interval for each device; readings are still recorded.
    /// Accepts duration with suffix: 3s, 1m, 500ms, 2h.
    /// Without suffix, value is interpreted as seconds.
    #[arg(long, value_parser = crate::throttle::parse_duration)]
    pub throttle: Option<Duration>,

    /// Bluetooth scanner backend to use
    #[arg(long, default_value_t, value_enum)]
    pub backend: Backend,

    /// Pushgateway job name [default: switchbot_<hostname>]
    #[arg(long)]
    pub job: Option<String>,
}

/// Errors returned by the core run loop.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to set up sink: {0}")]
    Sink(#[from] SinkError),
}

/// Future returned by [`Scanner::start_scan`].
pub type ScanFuture<'a> =
    Pin<Box<dyn Future<Output = Result<mpsc::Receiver<RawAdvertisement>, ScanError>> + Send + 'a>>;

/// Scanner abstraction to enable deterministic unit tests without Bluetooth hardware.
pub trait Scanner: Send + Sync {
    fn start_scan(&self, backend: Backend) -> ScanFuture<'_>;
}

/// Real scanner implementation that delegates to the compiled-in backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealScanner;

impl Scanner for RealScanner {
    fn start_scan(&self, backend: Backend) -> ScanFuture<'_> {
        Box::pin(crate::scanner::start_scan(backend))
    }
}

/// Application context: device state, sinks and the optional throttle.
pub struct App {
    states: DeviceStates,
    emitter: Emitter,
    throttle: Option<Throttle>,
}

impl App {
    pub fn new(registry: Arc<DeviceRegistry>, emitter: Emitter, throttle: Option<Duration>) -> Self {
        Self {
            states: DeviceStates::new(registry),
            emitter,
            throttle: throttle.map(Throttle::new),
        }
    }

    pub fn states(&self) -> &DeviceStates {
        &self.states
    }

    /// Process one advertisement.
    ///
    /// Returns the emission report when the advertisement updated a known
    /// device and triggered an emission.
    pub async fn handle(&mut self, adv: &RawAdvertisement) -> Option<EmitReport> {
        let (address, reading) = match decode(adv) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => return None,
            Err(error) => {
                debug!(address = %adv.address, %error, "dropping advertisement");
                return None;
            }
        };

        if !self.states.observe(address, reading) {
            warn!(%address, value = %service_data_hex(adv), "unknown device");
            return None;
        }

        let should_emit = self
            .throttle
            .as_mut()
            .is_none_or(|t| t.should_emit(address));
        if !should_emit {
            return None;
        }

        Some(self.emitter.emit(&self.states).await)
    }

    /// Handle advertisements until the channel closes.
    pub async fn run(&mut self, mut advertisements: mpsc::Receiver<RawAdvertisement>) {
        while let Some(adv) = advertisements.recv().await {
            self.handle(&adv).await;
        }
    }
}

/// Hex of the 16-bit service data, empty for marker-only advertisements.
fn service_data_hex(adv: &RawAdvertisement) -> String {
    adv.find(AD_TYPE_SERVICE_DATA_16)
        .map(|e| e.value.to_string())
        .unwrap_or_default()
}

/// Sinks configured by `settings`: always the Pushgateway, MQTT when configured.
///
/// Must be called within a tokio runtime when MQTT is configured.
pub fn build_sinks(
    settings: &Settings,
    job: Option<&str>,
) -> Result<Vec<Box<dyn MetricSink>>, RunError> {
    let job = job.map_or_else(default_job_name, str::to_string);

    let mut sinks: Vec<Box<dyn MetricSink>> =
        vec![Box::new(PushGateway::new(&settings.pushgateway, &job)?)];
    if let Some(mqtt) = &settings.mqtt {
        sinks.push(Box::new(MqttPublisher::connect(mqtt)));
    }
    Ok(sinks)
}

/// Start the scanner and run the loop with the given registry and sinks.
///
/// Returns the application once the scanner channel closes.
pub async fn run_with(
    options: &Options,
    registry: Arc<DeviceRegistry>,
    scanner: &dyn Scanner,
    emitter: Emitter,
) -> Result<App, RunError> {
    let mut app = App::new(registry, emitter, options.throttle);
    let advertisements = scanner.start_scan(options.backend).await?;
    info!(backend = %options.backend, "scanning for SwitchBot devices");

    app.run(advertisements).await;
    Ok(app)
}

/// Load the settings file, build the sinks and run until the scanner stops.
pub async fn run(options: Options, scanner: &dyn Scanner) -> Result<(), RunError> {
    let settings = Settings::load(&options.config)?;
    info!(
        config = %options.config.display(),
        devices = settings.registry.len(),
        "loaded settings"
    );

    let emitter = Emitter::new(build_sinks(&settings, options.job.as_deref())?);
    run_with(&options, Arc::new(settings.registry), scanner, emitter).await?;
    Ok(())
}
