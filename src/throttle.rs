//! Optional per-device emission throttling.
//!
//! By default every observation of a known device triggers a full emission.
//! With `--throttle` an observation still updates the state, but an emission
//! is only triggered when the same device has not triggered one within the
//! interval.

use crate::mac_address::MacAddress;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A throttle that limits emissions per device.
///
/// Each device is tracked independently, allowing at most one emission per
/// `interval`. The first observation of a device is always allowed.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_emit: HashMap<MacAddress, Instant>,
}

impl Throttle {
    /// Create a new throttle with the specified minimum interval between emissions.
    ///
    /// ```
    /// use std::time::Duration;
    /// use switchbot_probe::throttle::Throttle;
    ///
    /// let throttle = Throttle::new(Duration::from_secs(3));
    /// ```
    pub fn new(interval: Duration) -> Self {
        Throttle {
            interval,
            last_emit: HashMap::new(),
        }
    }

    /// Check if an observation of `mac` should trigger an emission.
    ///
    /// If `true` is returned, the timer for this device is reset.
    pub fn should_emit(&mut self, mac: MacAddress) -> bool {
        self.should_emit_at(mac, Instant::now())
    }

    fn should_emit_at(&mut self, mac: MacAddress, now: Instant) -> bool {
        match self.last_emit.get(&mac) {
            Some(last) if now.duration_since(*last) < self.interval => false,
            _ => {
                self.last_emit.insert(mac, now);
                true
            }
        }
    }
}

/// Parse a `--throttle` value like `30`, `3s`, `500ms`, `1m` or `2h`.
///
/// A bare number is seconds.
///
/// ```
/// use switchbot_probe::throttle::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// ```
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    let src = src.trim();
    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    // "ms" must be tried before "m" and "s"
    const UNITS: [(&str, u64); 4] = [("ms", 1), ("h", 3_600_000), ("m", 60_000), ("s", 1000)];

    let (num, millis_per_unit) = UNITS
        .iter()
        .find_map(|(suffix, factor)| src.strip_suffix(suffix).map(|num| (num, *factor)))
        .unwrap_or((src, 1000));

    let value: u64 = num
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration: {}", src))?;
    value
        .checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| format!("duration too large: {}", src))
}
