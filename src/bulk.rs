//! Bulk regression driver: one subprocess per standalone test.
//!
//! Each catalog entry runs the execution driver in its own process so a
//! crash or fatal exit only takes down that one test. Classification looks
//! at stdout and the exit status only.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;

use memchr::memmem;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{HarnessError, Result};
use crate::suite::{BuiltinSuite, Suite};

/// Overrides the execution driver binary.
pub const RUNNER_ENV_VAR: &str = "CONFORMANCE_RUNNER";

/// Class every bulk child runs.
pub const BULK_CLASS: &str = "ValkeyGlide";

const RULE: &str = "========================";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Failed,
    Skipped,
}

/// Skipped wins over the exit status; otherwise success decides.
pub fn classify(stdout: &[u8], success: bool) -> Verdict {
    if memmem::find(&stdout.to_ascii_lowercase(), b"skipped").is_some() {
        Verdict::Skipped
    } else if success {
        Verdict::Passed
    } else {
        Verdict::Failed
    }
}

/// Names of the single-node regression surface.
pub fn catalog() -> Vec<&'static str> {
    BuiltinSuite::Standalone.cases().iter().map(|c| c.name).collect()
}

/// `CONFORMANCE_RUNNER`, else the `conformance` binary next to this one.
pub fn runner_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(RUNNER_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .ok_or_else(|| HarnessError::Config(format!("{} has no parent directory", exe.display())))?;
    Ok(dir.join(format!("conformance{}", std::env::consts::EXE_SUFFIX)))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
}

impl BulkSummary {
    pub fn record(&mut self, name: &str, verdict: Verdict) {
        match verdict {
            Verdict::Passed => self.passed += 1,
            Verdict::Failed => self.failed.push(name.to_string()),
            Verdict::Skipped => self.skipped.push(name.to_string()),
        }
    }

    pub fn exit_code(&self) -> i32 {
        i32::from(!self.failed.is_empty())
    }

    pub fn write_to(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "{RULE}")?;
        writeln!(out, "Test summary:")?;
        writeln!(out, "Total tests run: {}", self.total)?;
        writeln!(out, "Passed: {}", self.passed)?;
        writeln!(out, "Failed: {}", self.failed.len())?;
        writeln!(out, "Skipped: {}", self.skipped.len())?;
        if !self.failed.is_empty() {
            writeln!(out, "\nFailed tests:")?;
            for name in &self.failed {
                writeln!(out, "- {name}")?;
            }
        }
        if !self.skipped.is_empty() {
            writeln!(out, "\nSkipped tests:")?;
            for name in &self.skipped {
                writeln!(out, "- {name}")?;
            }
        }
        writeln!(out, "{RULE}")
    }
}

/// Runs catalog entries one at a time through an external program.
#[derive(Debug, Clone)]
pub struct BulkDriver {
    program: PathBuf,
    extra_args: Vec<OsString>,
}

impl BulkDriver {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    /// Arguments placed before the per-test ones.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    fn command(&self, name: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.extra_args)
            .args(["--class", BULK_CLASS, "--test", name, "--nocolors"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        cmd
    }

    /// Run one test; returns its captured stdout and verdict.
    pub async fn run_one(&self, name: &str) -> Result<(Vec<u8>, Option<i32>, Verdict)> {
        let output = self.command(name).output().await?;
        let verdict = classify(&output.stdout, output.status.success());
        debug!(test = name, status = ?output.status.code(), ?verdict, "child finished");
        Ok((output.stdout, output.status.code(), verdict))
    }

    pub async fn run(&self, names: &[&str], out: &mut dyn Write) -> Result<BulkSummary> {
        let mut summary = BulkSummary {
            total: names.len(),
            ..BulkSummary::default()
        };
        for &name in names {
            writeln!(out, "Running {name}...")?;
            let verdict = match self.run_one(name).await {
                Ok((stdout, code, verdict)) => {
                    out.write_all(&stdout)?;
                    if !stdout.ends_with(b"\n") {
                        writeln!(out)?;
                    }
                    match verdict {
                        Verdict::Skipped => writeln!(out, "[SKIPPED] {name} was skipped.\n")?,
                        Verdict::Passed => writeln!(out, "[SUCCESS] {name} completed.\n")?,
                        Verdict::Failed => {
                            let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                            writeln!(out, "[FAILURE] {name} failed with exit code {code}.\n")?
                        }
                    }
                    verdict
                }
                Err(e) => {
                    warn!(test = name, error = %e, "could not start runner");
                    writeln!(out, "[FAILURE] {name} could not be started: {e}\n")?;
                    Verdict::Failed
                }
            };
            summary.record(name, verdict);
            out.flush()?;
        }
        summary.write_to(out)?;
        Ok(summary)
    }
}

// ── Tests ──────────────────────────────────────────────────────────
