/// Observability port for the dual-store router
///
/// The router emits two kinds of signals: named counters and error
/// reports for recovered primary-side failures. Both go through the
/// `Observability` trait so deployments can plug in their own metrics
/// and error-tracking sinks; the bundled `LogObservability` writes
/// structured log events and keeps in-process tallies.
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::PuenteError;

/// Counter bumped when the primary store had no answer for a read but
/// the secondary did
pub const READ_FALLBACK_TOTAL: &str = "read_fallback_total";

/// Counter bumped when an unclassified command is passed through to the
/// secondary store
pub const METHOD_MISSING_TOTAL: &str = "method_missing_total";

/// Counter bumped for every recovered primary-side error report
pub const REPORTED_ERRORS_TOTAL: &str = "reported_errors_total";

/// Context attached to an error report
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Name of the command being routed when the error was caught
    pub command_name: String,
    /// Free-form detail (store role, routing phase)
    pub extra: String,
}

impl ErrorContext {
    pub fn new<S: Into<String>>(command_name: S) -> Self {
        Self {
            command_name: command_name.into(),
            extra: String::new(),
        }
    }

    pub fn with_extra<S: Into<String>>(mut self, extra: S) -> Self {
        self.extra = extra.into();
        self
    }
}

/// Sink for router counters and recovered-error reports
pub trait Observability: Send + Sync {
    /// Increment a named counter, labeled with the command name
    fn increment_counter(&self, counter: &str, command_name: &str);

    /// Report an error the router caught and recovered from
    fn report_error(&self, error: &PuenteError, context: &ErrorContext);
}

/// Log-backed observability sink with in-process counter tallies
///
/// Counters are kept in memory keyed by (counter, command) so callers
/// can read them back without an external metrics system; each report
/// also bumps `reported_errors_total` for the offending command.
#[derive(Default)]
pub struct LogObservability {
    counters: Mutex<HashMap<(String, String), u64>>,
}

impl LogObservability {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter for one command label
    pub fn counter_value(&self, counter: &str, command_name: &str) -> u64 {
        let counters = self.counters.lock().expect("counter registry poisoned");
        counters
            .get(&(counter.to_string(), command_name.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Snapshot of all counters, sorted for stable presentation
    pub fn snapshot(&self) -> Vec<(String, String, u64)> {
        let counters = self.counters.lock().expect("counter registry poisoned");
        let mut rows: Vec<_> = counters
            .iter()
            .map(|((counter, command), value)| (counter.clone(), command.clone(), *value))
            .collect();
        rows.sort();
        rows
    }
}

impl Observability for LogObservability {
    fn increment_counter(&self, counter: &str, command_name: &str) {
        let mut counters = self.counters.lock().expect("counter registry poisoned");
        *counters
            .entry((counter.to_string(), command_name.to_string()))
            .or_insert(0) += 1;
        tracing::debug!(counter, command = command_name, "counter incremented");
    }

    fn report_error(&self, error: &PuenteError, context: &ErrorContext) {
        tracing::warn!(
            command = %context.command_name,
            extra = %context.extra,
            severity = %error.severity(),
            error = %error,
            "recovered store error",
        );
        self.increment_counter(REPORTED_ERRORS_TOTAL, &context.command_name);
    }
}
