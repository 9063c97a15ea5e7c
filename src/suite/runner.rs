//! Executes a suite case by case and writes the report.
//!
//! Output format, one line per case:
//!
//! ```text
//! Running tests for class 'ValkeyGlideTest'...
//! testEcho     [PASSED]
//! testPing     [FAILED]
//!
//! Skipped test: ...
//!
//! Assertion failed: testPing - ...
//! ```

use std::io::Write;
use std::sync::Arc;

use colored::{Color, Colorize};
use tracing::{debug, info};

use super::{select_cases, Suite, TestCase};
use crate::context::{RunContext, TestContext};
use crate::error::{HarnessError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        }
    }

    fn color(self) -> Color {
        match self {
            Self::Passed => Color::Green,
            Self::Failed => Color::Red,
            Self::Skipped => Color::Yellow,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaseResult {
    pub name: &'static str,
    pub outcome: Outcome,
    pub failures: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub suite: String,
    pub results: Vec<CaseResult>,
}

impl SuiteReport {
    /// No case failed. An empty selection passes.
    pub fn is_success(&self) -> bool {
        self.count(Outcome::Failed) == 0
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn outcome_of(&self, name: &str) -> Option<Outcome> {
        self.results.iter().find(|r| r.name == name).map(|r| r.outcome)
    }
}

pub struct SuiteRunner {
    run: Arc<RunContext>,
    colorize: bool,
}

impl SuiteRunner {
    pub fn new(run: Arc<RunContext>) -> Self {
        Self { run, colorize: false }
    }

    pub fn colorize(mut self, enabled: bool) -> Self {
        self.colorize = enabled;
        self
    }

    pub fn run_context(&self) -> &Arc<RunContext> {
        &self.run
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.colorize {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        if self.colorize {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    /// Run every selected case of `suite`.
    ///
    /// Returns `Err` only for a fatal error, after the offending case has been
    /// torn down; the caller must stop the whole run.
    pub async fn run_suite(
        &self,
        suite: &dyn Suite,
        filter: Option<&str>,
        out: &mut dyn Write,
    ) -> Result<SuiteReport> {
        writeln!(out, "Running tests for class '{}'...", suite.name())?;
        let cases = select_cases(suite.cases(), filter);
        let width = cases.iter().map(|c| c.name.len()).max().unwrap_or(0) + 1;

        let mut results = Vec::with_capacity(cases.len());
        for case in &cases {
            write!(out, "{}", self.bold(&format!("{:width$}", case.name)))?;
            out.flush()?;
            let result = self.run_case(suite, case).await?;
            let label = result.outcome.label();
            writeln!(out, "[{}]", self.paint(label, result.outcome.color()))?;
            results.push(result);
        }

        writeln!(out)?;
        for warning in results.iter().flat_map(|r| &r.warnings) {
            write!(out, "{warning}")?;
        }
        writeln!(out)?;

        let report = SuiteReport {
            suite: suite.name().to_string(),
            results,
        };
        if report.is_success() {
            writeln!(out, "All tests passed. \\o/")?;
        } else {
            for failure in report.results.iter().flat_map(|r| &r.failures) {
                write!(out, "{failure}")?;
            }
        }
        info!(
            suite = %report.suite,
            passed = report.count(Outcome::Passed),
            failed = report.count(Outcome::Failed),
            skipped = report.count(Outcome::Skipped),
            "suite finished"
        );
        Ok(report)
    }

    async fn run_case(&self, suite: &dyn Suite, case: &TestCase) -> Result<CaseResult> {
        let mut ctx = TestContext::new(suite.deployment(), Arc::clone(&self.run), case.name);
        let body = match ctx.set_up().await {
            Ok(()) => (case.run)(&ctx).await,
            Err(e) => Err(e),
        };
        ctx.tear_down().await;

        let outcome = match body {
            Err(e) if e.is_fatal() => return Err(e),
            Err(HarnessError::Skipped(reason)) => {
                debug!(case = case.name, %reason, "skipped");
                if ctx.has_failures() {
                    Outcome::Failed
                } else {
                    Outcome::Skipped
                }
            }
            Err(e) => {
                ctx.fail_uncaught(&e);
                Outcome::Failed
            }
            Ok(()) if ctx.has_failures() => Outcome::Failed,
            Ok(()) => Outcome::Passed,
        };

        Ok(CaseResult {
            name: case.name,
            outcome,
            failures: ctx.failures(),
            warnings: ctx.take_warnings(),
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────────
