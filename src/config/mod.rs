//! Connector configuration.
//!
//! [`ConnectorConfig`] is a pure data type; loading it from disk or flags is
//! the embedding process's concern. Interval fields are duration strings
//! (see [`parse_duration`]) so configuration files can say "1m30s" instead
//! of a raw count.

mod duration;

pub use duration::{parse_duration, DurationParseError};

/// Tuning knobs for the printer manager.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// How often to reconcile the local and cloud printer sets, as a
    /// duration string ("1m", "30s"). The timer restarts after each round
    /// completes, so a slow round never overlaps the next.
    pub printer_poll_interval: String,

    /// Maximum number of job documents downloaded concurrently across all
    /// printers.
    pub max_concurrent_download: usize,

    /// Maximum number of jobs submitted concurrently to any one printer.
    pub queue_size: usize,

    /// When false, the part of the job owner before the first `@` is used
    /// as the submitting user; when true, the full owner id is passed
    /// through.
    pub full_username: bool,

    /// When true, raw queues (printers without a capability document) are
    /// excluded from reconciliation.
    pub ignore_raw_printers: bool,

    /// Scope (user, group, or domain) newly registered printers are shared
    /// with. Empty disables sharing.
    pub share_scope: String,

    /// Upper bound on how long a submitted job is followed before it is
    /// reported as aborted, as a duration string. `None` follows forever.
    pub job_follow_timeout: Option<String>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            printer_poll_interval: "1m".to_string(),
            max_concurrent_download: 5,
            queue_size: 3,
            full_username: false,
            ignore_raw_printers: false,
            share_scope: String::new(),
            job_follow_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_poll_interval_parses() {
        let config = ConnectorConfig::default();
        assert!(parse_duration(&config.printer_poll_interval).is_ok());
        assert!(config.job_follow_timeout.is_none());
    }
}
