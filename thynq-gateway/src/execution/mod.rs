//! Execution of a validated operation.
//!
//! Root fields are resolved independently: a field that fails is reported and
//! omitted while its siblings still appear in the response. Below the root,
//! nulls produced for non-null fields propagate to the nearest nullable parent.

#[macro_use]
pub(crate) mod resolver;
pub(crate) mod engine;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use displaydoc::Display;
use thiserror::Error;

pub(crate) const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";

/// Source of the current instant, injected so that timestamps can be pinned in tests.
pub trait Clock: Send + Sync {
    /// The current instant, in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a given instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Per-request state shared by every resolver of one execution.
pub(crate) struct ExecutionContext {
    clock: Arc<dyn Clock>,
    started: Instant,
}

impl ExecutionContext {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            started: Instant::now(),
        }
    }

    /// The clock's current instant as an RFC 3339 UTC string.
    pub(crate) fn timestamp(&self) -> String {
        self.clock
            .now()
            .to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// Seconds elapsed since execution started.
    pub(crate) fn elapsed_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

/// Errors raised by an operation handler.
#[derive(Error, Display, Debug, Clone, PartialEq)]
pub(crate) enum FieldError {
    /// {0}
    Handler(String),

    /// Internal error while resolving field "{field}".
    Panicked { field: String },
}

impl From<FieldError> for apollo_compiler::resolvers::FieldError {
    fn from(error: FieldError) -> Self {
        Self {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn timestamps_are_rfc3339_utc() {
        let instant = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 58).unwrap();
        let context = ExecutionContext::new(Arc::new(FixedClock(instant)));
        assert_eq!(context.timestamp(), "2024-02-29T23:59:58Z");
        let parsed = DateTime::parse_from_rfc3339(&context.timestamp()).unwrap();
        assert_eq!(parsed, instant);
    }

    #[test]
    fn elapsed_time_is_never_negative() {
        let context = ExecutionContext::new(Arc::new(SystemClock));
        let first = context.elapsed_seconds();
        let second = context.elapsed_seconds();
        assert!(first >= 0.0);
        assert!(second >= first);
    }

    #[test]
    fn system_clock_is_close_to_now() {
        let delta = Utc::now() - SystemClock.now();
        assert!(delta.num_seconds().abs() < 5);
    }
}
