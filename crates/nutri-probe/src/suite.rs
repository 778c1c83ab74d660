// crates/nutri-probe/src/suite.rs
// ============================================================================
// Module: Suite Runner
// Description: Executes named checks with lazily bootstrapped sessions.
// Purpose: Produce one typed result per check and one report per run.
// Dependencies: nutri-probe session, probe, assertions, report
// ============================================================================

//! ## Overview
//! A [`Suite`] is an ordered list of [`Check`]s. Each check names the identity
//! it runs as, one probe request, and the expectations its response must meet.
//! The [`SuiteRunner`] logs in at most once per identity and reuses that
//! session for the rest of the run.
//!
//! ## Invariants
//! - A check whose identity could not log in is `Skipped`; it never runs on an
//!   anonymous session in place of the intended one.
//! - A skip caused by a rejected login is flagged on the result and fails the
//!   run. A skip for an identity that is not configured does not.
//! - Every expectation of a check is evaluated; the check passes only if all do.
//! - A transport failure marks only that check as `Error`; the run continues.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::assertions::CheckVerdict;
use crate::assertions::Evaluation;
use crate::assertions::Expectation;
use crate::assertions::classify_failure;
use crate::config::ProbeConfig;
use crate::probe::ProbeRequest;
use crate::report::CheckResult;
use crate::report::RunReport;
use crate::report::SuiteReport;
use crate::session::ProbeSession;
use crate::telemetry::EventOutcome;
use crate::telemetry::ProbeEvent;
use crate::telemetry::SharedSink;
use crate::telemetry::emit;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Identity a check runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// No login.
    Anonymous,
    /// The configured regular user.
    User,
    /// The configured administrator.
    Admin,
}

impl AuthMode {
    /// Returns the stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

/// One probe plus the expectations its response must meet.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    /// Human-readable check name.
    pub name: String,
    /// Identity the probe runs as.
    pub auth: AuthMode,
    /// Request to send.
    pub request: ProbeRequest,
    /// Conditions on the response.
    pub expectations: Vec<Expectation>,
}

impl Check {
    /// Creates a check without expectations.
    pub fn new(name: impl Into<String>, auth: AuthMode, request: ProbeRequest) -> Self {
        Self {
            name: name.into(),
            auth,
            request,
            expectations: Vec::new(),
        }
    }

    /// Appends an expectation.
    #[must_use]
    pub fn expect(mut self, expectation: Expectation) -> Self {
        self.expectations.push(expectation);
        self
    }
}

/// Named, ordered group of checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Suite {
    /// Stable identifier used on the command line.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Checks in execution order.
    pub checks: Vec<Check>,
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Reason an identity has no session.
#[derive(Debug, Clone)]
enum Unavailable {
    /// No credentials are configured for the identity.
    NotConfigured(String),
    /// The session could not be created or the login was rejected.
    LoginFailed(String),
}

/// Session bootstrap result cached per identity.
type SessionSlot = Result<ProbeSession, Unavailable>;

/// Executes suites against the configured target.
pub struct SuiteRunner {
    /// Shared configuration.
    config: Arc<ProbeConfig>,
    /// Event destination.
    sink: SharedSink,
    /// Sessions bootstrapped so far, or the reason they could not be.
    sessions: HashMap<AuthMode, SessionSlot>,
}

impl SuiteRunner {
    /// Creates a runner; no network traffic happens until a suite runs.
    #[must_use]
    pub fn new(config: Arc<ProbeConfig>, sink: SharedSink) -> Self {
        Self {
            config,
            sink,
            sessions: HashMap::new(),
        }
    }

    /// Runs every suite in order and collects the run report.
    pub fn run_all(&mut self, suites: &[Suite]) -> RunReport {
        let started = Instant::now();
        let reports = suites.iter().map(|suite| self.run_suite(suite)).collect();
        RunReport {
            base_url: self.config.target.base_url.clone(),
            suites: reports,
            elapsed_ms: elapsed_ms(started),
        }
    }

    /// Runs one suite.
    pub fn run_suite(&mut self, suite: &Suite) -> SuiteReport {
        let checks = suite.checks.iter().map(|check| self.run_check(&suite.id, check)).collect();
        SuiteReport {
            id: suite.id.clone(),
            title: suite.title.clone(),
            checks,
        }
    }

    /// Runs one check and records its verdict event.
    fn run_check(&mut self, suite_id: &str, check: &Check) -> CheckResult {
        let started = Instant::now();
        let mut login_failed = false;
        let (verdict, detail, evaluations) = match self.session_for(check.auth) {
            Err(Unavailable::NotConfigured(reason)) => {
                (CheckVerdict::Skipped, Some(reason), Vec::new())
            }
            Err(Unavailable::LoginFailed(reason)) => {
                login_failed = true;
                (CheckVerdict::Skipped, Some(reason), Vec::new())
            }
            Ok(session) => match session.send(&check.request, self.sink.as_ref()) {
                Err(err) => (CheckVerdict::Error, Some(err.to_string()), Vec::new()),
                Ok(response) => {
                    let evaluations: Vec<Evaluation> =
                        check.expectations.iter().map(|exp| exp.evaluate(&response)).collect();
                    if evaluations.iter().all(Evaluation::passed) {
                        (CheckVerdict::Pass, None, evaluations)
                    } else {
                        let cause = classify_failure(&response)
                            .map(|kind| format!("server failure: {kind}"));
                        (CheckVerdict::Fail, cause, evaluations)
                    }
                }
            },
        };
        emit(
            self.sink.as_ref(),
            &ProbeEvent::Check {
                suite: suite_id.to_string(),
                check: check.name.clone(),
                outcome: match verdict {
                    CheckVerdict::Pass => EventOutcome::Ok,
                    CheckVerdict::Fail => EventOutcome::Failed,
                    CheckVerdict::Skipped => EventOutcome::Skipped,
                    CheckVerdict::Error => EventOutcome::Error,
                },
            },
        );
        CheckResult {
            suite: suite_id.to_string(),
            name: check.name.clone(),
            target: format!("{} {}", check.request.method, check.request.path),
            verdict,
            detail,
            login_failed,
            evaluations,
            elapsed_ms: elapsed_ms(started),
        }
    }

    /// Returns the cached session for an identity, bootstrapping it once.
    fn session_for(&mut self, auth: AuthMode) -> SessionSlot {
        if let Some(slot) = self.sessions.get(&auth) {
            return slot.clone();
        }
        let slot = self.bootstrap(auth);
        self.sessions.insert(auth, slot.clone());
        slot
    }

    /// Creates the session for an identity.
    fn bootstrap(&self, auth: AuthMode) -> SessionSlot {
        let credentials = match auth {
            AuthMode::Anonymous => {
                return ProbeSession::anonymous(Arc::clone(&self.config))
                    .map_err(|err| Unavailable::LoginFailed(err.to_string()));
            }
            AuthMode::Admin => self.config.credentials.admin.as_ref(),
            AuthMode::User => self.config.credentials.user.as_ref(),
        };
        let Some(credentials) = credentials else {
            return Err(Unavailable::NotConfigured(format!(
                "no {} credentials configured",
                auth.as_str()
            )));
        };
        ProbeSession::login(Arc::clone(&self.config), credentials, self.sink.as_ref())
            .map(|(session, _)| session)
            .map_err(|err| {
                Unavailable::LoginFailed(format!("login as {} failed: {err}", credentials.username))
            })
    }
}

/// Milliseconds elapsed since `started`.
fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
