//! `switchbot-probe` library.
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing, logging setup
//! and process exit codes. The decode → observe → emit loop lives in
//! [`crate::app`] where it can be tested deterministically with an injected
//! scanner and injected sinks.

pub mod advertisement;
pub mod app;
pub mod config;
pub mod decoder;
pub mod mac_address;
pub mod output;
pub mod reading;
pub mod registry;
pub mod scanner;
pub mod state;
pub mod throttle;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use advertisement::{AdStructure, AdValue, RawAdvertisement};
pub use app::{App, Options, RunError};
pub use config::{ConfigError, Settings};
pub use decoder::{DecodeError, DecodeResult, decode};
pub use mac_address::MacAddress;
pub use output::{EmitReport, Emitter, MetricBatch, MetricSink, SinkError};
pub use reading::{DeviceType, Reading};
pub use registry::{DeviceConfig, DeviceRegistry};
pub use scanner::{Backend, ScanError};
pub use state::DeviceStates;
pub use throttle::{Throttle, parse_duration};
