// crates/nutri-probe/src/lib.rs
// ============================================================================
// Module: Nutri Probe
// Description: Session-based HTTP probing of a Nutri Tracker deployment.
// Purpose: Bootstrap sessions, probe routes, assert content, and report.
// Dependencies: reqwest, regex, serde, serde_json, toml, url
// ============================================================================

//! ## Overview
//! `nutri-probe` drives a running Nutri Tracker instance over HTTP the way a
//! browser would: it logs in through the HTML form, keeps cookies, and then
//! probes pages and JSON APIs. Each probe is checked against typed
//! expectations and every check yields a typed verdict. A run aggregates
//! verdicts into one report with one exit status.
//!
//! Control flow is linear: [`session`] bootstraps, [`probe`] sends,
//! [`assertions`] judges, [`report`] renders. [`suite`] ties them together
//! and [`catalog`] holds the built-in checks.
//! All I/O is blocking and single-threaded; there are no retries.

pub mod assertions;
pub mod catalog;
pub mod config;
pub mod html;
pub mod probe;
pub mod report;
pub mod session;
pub mod suite;
pub mod telemetry;

pub use assertions::CaseMode;
pub use assertions::CheckVerdict;
pub use assertions::Evaluation;
pub use assertions::Expectation;
pub use config::ConfigError;
pub use config::Credentials;
pub use config::ProbeConfig;
pub use probe::Method;
pub use probe::ProbeError;
pub use probe::ProbeRequest;
pub use probe::ProbeResponse;
pub use report::RunReport;
pub use report::RunSummary;
pub use session::LoginOutcome;
pub use session::ProbeSession;
pub use session::SessionError;
pub use suite::AuthMode;
pub use suite::Check;
pub use suite::Suite;
pub use suite::SuiteRunner;
pub use telemetry::JsonlEventSink;
pub use telemetry::ProbeEventSink;
pub use telemetry::SharedSink;
