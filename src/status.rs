//! Periodic status reporting.
//!
//! Both the capture agent and the host run loop log a summary line at a fixed
//! interval so that overflow and parse errors stay visible during long runs.

use std::time::{Duration, Instant};

/// Decides when the next status summary is due and computes the packet rate
/// since the previous one.
#[derive(Debug)]
pub struct StatusTicker {
    interval: Duration,
    last_report: Instant,
    last_count: u64,
}

impl StatusTicker {
    /// Create a ticker whose first report is due one `interval` from now.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use ble_sniffer::status::StatusTicker;
    ///
    /// let ticker = StatusTicker::new(Duration::from_secs(10));
    /// ```
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: Duration, start: Instant) -> Self {
        StatusTicker {
            interval,
            last_report: start,
            last_count: 0,
        }
    }

    /// Check whether a report is due at `now` given the lifetime packet total.
    ///
    /// Returns the rate in packets per second over the elapsed window when a
    /// report is due, resetting the window. Returns `None` otherwise.
    pub fn tick_at(&mut self, now: Instant, total: u64) -> Option<f64> {
        let elapsed = now.saturating_duration_since(self.last_report);
        if elapsed < self.interval {
            return None;
        }

        let delta = total.saturating_sub(self.last_count);
        let rate = if elapsed.is_zero() {
            0.0
        } else {
            delta as f64 / elapsed.as_secs_f64()
        };

        self.last_report = now;
        self.last_count = total;
        Some(rate)
    }

    pub fn tick(&mut self, total: u64) -> Option<f64> {
        self.tick_at(Instant::now(), total)
    }

    /// When the next report becomes due.
    pub fn next_due(&self) -> Instant {
        self.last_report + self.interval
    }
}

/// Parse a duration from a human-readable string.
///
/// Supports the following suffixes:
/// - `s` or no suffix: seconds
/// - `m`: minutes
/// - `h`: hours
/// - `ms`: milliseconds
///
/// # Examples
/// ```
/// use ble_sniffer::status::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
/// assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// ```
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    let src = src.trim();

    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    if let Some(num) = src.strip_suffix("ms") {
        let millis: u64 = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid milliseconds: {}", num))?;
        return Ok(Duration::from_millis(millis));
    }

    if let Some(num) = src.strip_suffix('h') {
        let hours: u64 = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid hours: {}", num))?;
        return Ok(Duration::from_secs(hours * 3600));
    }

    if let Some(num) = src.strip_suffix('m') {
        let minutes: u64 = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid minutes: {}", num))?;
        return Ok(Duration::from_secs(minutes * 60));
    }

    let num = src.strip_suffix('s').unwrap_or(src);
    let secs: u64 = num
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration: {}", src))?;
    Ok(Duration::from_secs(secs))
}
