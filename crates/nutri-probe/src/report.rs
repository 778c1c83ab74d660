// crates/nutri-probe/src/report.rs
// ============================================================================
// Module: Run Reports
// Description: Aggregated check results with text and JSON renderers.
// Purpose: Give operators a readable summary and CI a single exit status.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Check results are grouped per suite and summarized per run. The text
//! renderer prints banner lines and one marker per check; the JSON renderer
//! writes the same data as one document. [`RunReport::exit_status`] is the
//! only place that maps verdicts to a process status.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::assertions::CheckVerdict;
use crate::assertions::Evaluation;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Exit status for a run where nothing failed or errored.
pub const EXIT_PASS: u8 = 0;
/// Exit status for a run with a failed or errored check, or a failed login.
pub const EXIT_FAIL: u8 = 1;
/// Width of banner rules.
const RULE_WIDTH: usize = 70;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Report rendering errors.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The output writer failed.
    #[error("report write failed: {0}")]
    Io(String),
    /// The report could not be serialized.
    #[error("report serialization failed: {0}")]
    Serialize(String),
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Suite identifier.
    pub suite: String,
    /// Check name.
    pub name: String,
    /// `METHOD /path` of the probe.
    pub target: String,
    /// Aggregate verdict.
    pub verdict: CheckVerdict,
    /// Skip reason, transport error, or failure cause.
    pub detail: Option<String>,
    /// Set when the check was skipped because its identity could not log in.
    #[serde(default)]
    pub login_failed: bool,
    /// Per-expectation results.
    pub evaluations: Vec<Evaluation>,
    /// Probe duration in milliseconds.
    pub elapsed_ms: u64,
}

/// Results of one suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Suite identifier.
    pub id: String,
    /// Suite title.
    pub title: String,
    /// Check results in execution order.
    pub checks: Vec<CheckResult>,
}

impl SuiteReport {
    /// Counts verdicts in this suite.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for check in &self.checks {
            summary.add(check);
        }
        summary
    }
}

/// Verdict counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Passed checks.
    pub passed: usize,
    /// Failed checks.
    pub failed: usize,
    /// Skipped checks.
    pub skipped: usize,
    /// Errored checks.
    pub errored: usize,
    /// Skipped checks whose identity was rejected at login.
    #[serde(default)]
    pub login_failures: usize,
}

impl RunSummary {
    /// Counts one check result.
    const fn add(&mut self, check: &CheckResult) {
        if check.login_failed {
            self.login_failures += 1;
        }
        match check.verdict {
            CheckVerdict::Pass => self.passed += 1,
            CheckVerdict::Fail => self.failed += 1,
            CheckVerdict::Skipped => self.skipped += 1,
            CheckVerdict::Error => self.errored += 1,
        }
    }

    /// Total number of checks.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.errored
    }

    /// True when no check failed or errored and every login succeeded.
    ///
    /// Skips for an identity that is not configured do not count against the
    /// run; skips caused by a rejected login do.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed == 0 && self.errored == 0 && self.login_failures == 0
    }
}

/// Results of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Base URL probed.
    pub base_url: String,
    /// Suite reports in execution order.
    pub suites: Vec<SuiteReport>,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
}

impl RunReport {
    /// Counts verdicts across all suites.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for check in self.suites.iter().flat_map(|suite| &suite.checks) {
            summary.add(check);
        }
        summary
    }

    /// Returns the process exit status for this run.
    #[must_use]
    pub fn exit_status(&self) -> u8 {
        if self.summary().is_success() { EXIT_PASS } else { EXIT_FAIL }
    }
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// JSON document written by [`render_json`].
#[derive(Serialize)]
struct JsonReport<'a> {
    /// Verdict counts.
    summary: RunSummary,
    /// Exit status the run maps to.
    exit_status: u8,
    /// Full report.
    #[serde(flatten)]
    report: &'a RunReport,
}

/// Writes a human-readable report.
///
/// # Errors
///
/// Returns [`ReportError::Io`] when the writer fails.
pub fn render_text<W: Write>(report: &RunReport, writer: &mut W) -> Result<(), ReportError> {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    line(writer, &heavy)?;
    line(writer, &format!("🧪 Nutri Tracker probe run against {}", report.base_url))?;
    line(writer, &heavy)?;
    for suite in &report.suites {
        line(writer, "")?;
        let counts = suite.summary();
        let heading = format!(
            "📋 {} - {} ({}/{} passed)",
            suite.id,
            suite.title,
            counts.passed,
            counts.total()
        );
        line(writer, &heading)?;
        for check in &suite.checks {
            render_check(writer, check)?;
        }
    }
    let summary = report.summary();
    line(writer, "")?;
    line(writer, &light)?;
    line(
        writer,
        &format!(
            "📊 Summary: {} passed, {} failed, {} skipped, {} errored ({} total, {} ms)",
            summary.passed,
            summary.failed,
            summary.skipped,
            summary.errored,
            summary.total(),
            report.elapsed_ms
        ),
    )?;
    if summary.login_failures > 0 {
        line(
            writer,
            &format!("🔒 {} checks skipped because login failed.", summary.login_failures),
        )?;
    }
    if summary.is_success() {
        line(writer, "🎉 All executed checks passed.")?;
    } else {
        line(writer, "⚠️  Some checks failed. See the details above.")?;
    }
    line(writer, &light)
}

/// Writes the report as one JSON document.
///
/// # Errors
///
/// Returns [`ReportError`] when serialization or writing fails.
pub fn render_json<W: Write>(report: &RunReport, writer: &mut W) -> Result<(), ReportError> {
    let document = JsonReport {
        summary: report.summary(),
        exit_status: report.exit_status(),
        report,
    };
    serde_json::to_writer_pretty(&mut *writer, &document)
        .map_err(|err| ReportError::Serialize(err.to_string()))?;
    writer.write_all(b"\n").map_err(|err| ReportError::Io(err.to_string()))
}

/// Writes one check line plus failure details.
fn render_check<W: Write>(writer: &mut W, check: &CheckResult) -> Result<(), ReportError> {
    let marker = verdict_marker(check.verdict);
    let heading = format!("  {marker} {} [{}] ({} ms)", check.name, check.target, check.elapsed_ms);
    line(writer, &heading)?;
    if check.verdict == CheckVerdict::Fail {
        for eval in check.evaluations.iter().filter(|eval| !eval.passed()) {
            line(writer, &format!("       expected {}, got {}", eval.expected, eval.actual))?;
        }
    }
    if let Some(detail) = &check.detail {
        line(writer, &format!("       {detail}"))?;
    }
    Ok(())
}

/// Console marker for a verdict.
const fn verdict_marker(verdict: CheckVerdict) -> &'static str {
    match verdict {
        CheckVerdict::Pass => "✅",
        CheckVerdict::Fail => "❌",
        CheckVerdict::Skipped => "⏭️ ",
        CheckVerdict::Error => "💥",
    }
}

/// Writes one line.
fn line<W: Write>(writer: &mut W, text: &str) -> Result<(), ReportError> {
    writeln!(writer, "{text}").map_err(|err| ReportError::Io(err.to_string()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use serde_json::Value;

    use super::CheckResult;
    use super::EXIT_FAIL;
    use super::EXIT_PASS;
    use super::RunReport;
    use super::SuiteReport;
    use super::render_json;
    use super::render_text;
    use crate::assertions::CheckVerdict;
    use crate::assertions::Evaluation;

    /// Builds a check result with the given verdict.
    fn check(name: &str, verdict: CheckVerdict) -> CheckResult {
        CheckResult {
            suite: "auth".to_string(),
            name: name.to_string(),
            target: "GET /dashboard/reports".to_string(),
            verdict,
            detail: None,
            login_failed: false,
            evaluations: Vec::new(),
            elapsed_ms: 2,
        }
    }

    /// Wraps checks in a single-suite run.
    fn report(checks: Vec<CheckResult>) -> RunReport {
        RunReport {
            base_url: "http://127.0.0.1:5001".to_string(),
            suites: vec![SuiteReport {
                id: "auth".to_string(),
                title: "Authentication".to_string(),
                checks,
            }],
            elapsed_ms: 10,
        }
    }

    #[test]
    fn skipped_checks_do_not_fail_the_run() {
        let run = report(vec![check("a", CheckVerdict::Pass), check("b", CheckVerdict::Skipped)]);
        let summary = run.summary();
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(run.exit_status(), EXIT_PASS);
    }

    #[test]
    fn failures_and_errors_fail_the_run() {
        assert_eq!(report(vec![check("a", CheckVerdict::Fail)]).exit_status(), EXIT_FAIL);
        assert_eq!(report(vec![check("a", CheckVerdict::Error)]).exit_status(), EXIT_FAIL);
    }

    #[test]
    fn rejected_login_fails_the_run() {
        let mut blocked = check("uploads page renders", CheckVerdict::Skipped);
        blocked.login_failed = true;
        blocked.detail = Some("login as admin failed: login rejected with status 200".to_string());
        let run = report(vec![check("a", CheckVerdict::Pass), blocked]);
        let summary = run.summary();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.login_failures, 1);
        assert_eq!(run.exit_status(), EXIT_FAIL);

        let mut out = Vec::new();
        render_text(&run, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("1 checks skipped because login failed"));
        assert!(!text.contains("All executed checks passed"));
    }

    #[test]
    fn text_report_lists_failed_expectations() {
        let mut failed = check("reports page renders", CheckVerdict::Fail);
        failed.evaluations = vec![Evaluation {
            expected: "status 200".to_string(),
            actual: "500".to_string(),
            verdict: CheckVerdict::Fail,
        }];
        failed.detail = Some("server failure: undefined template value".to_string());
        let mut out = Vec::new();
        render_text(&report(vec![failed]), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("❌ reports page renders [GET /dashboard/reports]"));
        assert!(text.contains("expected status 200, got 500"));
        assert!(text.contains("server failure: undefined template value"));
        assert!(text.contains("0 passed, 1 failed"));
    }

    #[test]
    fn json_report_carries_summary_and_exit_status() {
        let mut out = Vec::new();
        render_json(&report(vec![check("a", CheckVerdict::Pass)]), &mut out).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["exit_status"], 0);
        assert_eq!(value["summary"]["passed"], 1);
        assert_eq!(value["suites"][0]["checks"][0]["verdict"], "pass");
    }
}
