//! Lightweight root-cause analysis over recent logs
//!
//! This module provides:
//! - A bounded, time-ordered buffer of recent log records
//! - A correlator that extracts distinct error entries when an alert fires

mod buffer;
mod correlator;

pub use buffer::{LogCorrelationBuffer, DEFAULT_LOG_BUFFER_CAPACITY};
pub use correlator::{CorrelatedLog, RcaCorrelator, DEFAULT_MAX_CORRELATED};
