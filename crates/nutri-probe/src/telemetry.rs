// crates/nutri-probe/src/telemetry.rs
// ============================================================================
// Module: Probe Telemetry
// Description: Structured event records for logins, probes, and checks.
// Purpose: Emit machine-readable JSON-lines logs alongside console output.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every login attempt, probe, and check verdict produces a [`ProbeEvent`].
//! Events flow into a [`ProbeEventSink`]; the JSON-lines sink writes one
//! object per line and the no-op sink discards them.
//! Events carry status codes, timings, and identifiers only. Passwords,
//! anti-forgery tokens, and response bodies are never recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Outcome label attached to events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// Operation completed as expected.
    Ok,
    /// Operation completed with an unexpected result.
    Failed,
    /// Operation did not run.
    Skipped,
    /// Operation aborted on a transport or environment error.
    Error,
}

/// Structured probe event.
///
/// # Invariants
/// - No variant carries secrets or response bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProbeEvent {
    /// Login bootstrap attempt.
    Login {
        /// Username used for the attempt.
        username: String,
        /// Final status code, when a response was received.
        status: Option<u16>,
        /// Whether an anti-forgery token was found on the login page.
        token_found: bool,
        /// Attempt outcome.
        outcome: EventOutcome,
    },
    /// Single HTTP probe.
    Probe {
        /// HTTP method.
        method: String,
        /// Route path (no host, no query).
        path: String,
        /// Response status, when a response was received.
        status: Option<u16>,
        /// Wall-clock duration in milliseconds.
        elapsed_ms: u64,
        /// Probe outcome.
        outcome: EventOutcome,
        /// Network error category, when the probe failed in transport.
        error_kind: Option<&'static str>,
    },
    /// Check verdict.
    Check {
        /// Suite identifier.
        suite: String,
        /// Check name.
        check: String,
        /// Verdict outcome.
        outcome: EventOutcome,
    },
    /// Schema migration applied by the CLI.
    Migration {
        /// Migration identifier.
        id: String,
        /// Steps that changed the schema or data.
        applied: usize,
        /// Steps skipped because the change was already present.
        skipped: usize,
        /// Migration outcome.
        outcome: EventOutcome,
    },
}

/// Envelope written by the JSON-lines sink.
#[derive(Debug, Serialize)]
struct EventRecord<'a> {
    /// Milliseconds since the Unix epoch.
    ts_ms: u64,
    /// Flattened event payload.
    #[serde(flatten)]
    event: &'a ProbeEvent,
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Errors raised by event sinks.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The log writer failed.
    #[error("event log write failed: {0}")]
    WriteFailed(String),
}

/// Destination for probe events.
pub trait ProbeEventSink: Send + Sync {
    /// Records one event.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError`] when the event cannot be written.
    fn record(&self, event: &ProbeEvent) -> Result<(), TelemetryError>;
}

/// Shared handle to a sink.
pub type SharedSink = Arc<dyn ProbeEventSink>;

/// Sink that discards every event.
pub struct NoopEventSink;

impl ProbeEventSink for NoopEventSink {
    fn record(&self, _event: &ProbeEvent) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Sink writing one JSON object per line.
pub struct JsonlEventSink<W: Write + Send> {
    /// Output writer for event records.
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonlEventSink<W> {
    /// Creates a JSON-lines sink over the writer.
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the sink and returns the writer.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError`] when the writer mutex is poisoned.
    pub fn into_inner(self) -> Result<W, TelemetryError> {
        self.writer
            .into_inner()
            .map_err(|_| TelemetryError::WriteFailed("event writer mutex poisoned".to_string()))
    }
}

impl<W: Write + Send> ProbeEventSink for JsonlEventSink<W> {
    fn record(&self, event: &ProbeEvent) -> Result<(), TelemetryError> {
        let record = EventRecord {
            ts_ms: unix_millis(),
            event,
        };
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| TelemetryError::WriteFailed("event writer mutex poisoned".to_string()))?;
        serde_json::to_writer(&mut *guard, &record)
            .map_err(|err| TelemetryError::WriteFailed(err.to_string()))?;
        guard.write_all(b"\n").map_err(|err| TelemetryError::WriteFailed(err.to_string()))?;
        guard.flush().map_err(|err| TelemetryError::WriteFailed(err.to_string()))?;
        drop(guard);
        Ok(())
    }
}

/// Returns a no-op shared sink.
#[must_use]
pub fn noop_sink() -> SharedSink {
    Arc::new(NoopEventSink)
}

/// Records an event, discarding sink failures.
///
/// Event logging is auxiliary: a broken log file must not change probe verdicts.
pub(crate) fn emit(sink: &dyn ProbeEventSink, event: &ProbeEvent) {
    let _ = sink.record(event);
}

/// Returns the current time in milliseconds since the Unix epoch.
fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
