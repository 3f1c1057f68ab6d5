//! Error-log correlation for anomaly alerts
//!
//! On an alert the correlator walks the log buffer newest-first and collects
//! distinct error messages as diagnostic context.

use super::LogCorrelationBuffer;
use serde::Serialize;
use std::collections::HashSet;

/// Default number of distinct messages reported per alert
pub const DEFAULT_MAX_CORRELATED: usize = 5;

/// Severities that always count as errors
const ERROR_SEVERITIES: &[&str] = &["ERROR", "FATAL"];

/// A log entry attached to an alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrelatedLog {
    pub severity: String,
    pub message: String,
}

/// Scans recent logs for error entries related to an alert
#[derive(Debug, Clone)]
pub struct RcaCorrelator {
    max_entries: usize,
}

impl RcaCorrelator {
    pub fn new(max_entries: usize) -> Self {
        Self { max_entries }
    }

    /// Collect up to `max_entries` distinct error messages, newest first
    pub fn correlate(&self, buffer: &LogCorrelationBuffer) -> Vec<CorrelatedLog> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut found = Vec::with_capacity(self.max_entries);

        if self.max_entries == 0 {
            return found;
        }

        buffer.scan_newest_first(|record| {
            if is_error(&record.severity, &record.message) && seen.insert(record.message.clone())
            {
                found.push(CorrelatedLog {
                    severity: record.severity.clone(),
                    message: record.message.clone(),
                });
            }
            found.len() < self.max_entries
        });

        found
    }
}

impl Default for RcaCorrelator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CORRELATED)
    }
}

/// Error severity, or a message mentioning "error" in any case
fn is_error(severity: &str, message: &str) -> bool {
    ERROR_SEVERITIES.contains(&severity) || message.to_lowercase().contains("error")
}
