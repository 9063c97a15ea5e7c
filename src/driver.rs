//! Execution driver: command line, class resolution and the aggregate exit code.
//!
//! The binary parses [`Cli`], then hands off to [`run`]. Everything below
//! the argument parsing writes to an injected sink so tests can capture the
//! report.

use std::io::{IsTerminal, Write};
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use crate::config::{Credential, Endpoint, DEFAULT_CLUSTER_SEED, DEFAULT_HOST, DEFAULT_PORT};
use crate::connect::{ConnectionFactory, Target};
use crate::context::RunContext;
use crate::error::{HarnessError, Result};
use crate::seeds::{SeedResolver, SeedSources};
use crate::suite::runner::SuiteRunner;
use crate::suite::{parse_class_list, BuiltinSuite, SuiteRegistry};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

#[derive(Debug, Clone, Parser)]
#[command(name = "conformance")]
#[command(about = "Run Valkey/Redis client conformance suites", long_about = None)]
pub struct Cli {
    /// Server host.
    #[arg(long = "host", env = "CONFORMANCE_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Server port.
    #[arg(long = "port", env = "CONFORMANCE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Test classes to run; repeatable and comma-delimited. Defaults to every built-in.
    #[arg(long = "class", value_name = "CLASS")]
    pub class: Vec<String>,

    /// Run only the matching test (exact name, or a substring).
    #[arg(long = "test", value_name = "NAME")]
    pub test: Option<String>,

    /// Disable colored output.
    #[arg(long = "nocolors")]
    pub nocolors: bool,

    #[arg(long = "user", env = "CONFORMANCE_USER")]
    pub user: Option<String>,

    #[arg(long = "auth", env = "CONFORMANCE_AUTH")]
    pub auth: Option<String>,

    /// Connect over TLS (certificates are not verified).
    #[arg(long = "tls")]
    pub tls: bool,

    /// Seed used by the cluster connection factory.
    #[arg(
        long = "cluster-seed",
        env = "CONFORMANCE_CLUSTER_SEED",
        default_value = DEFAULT_CLUSTER_SEED
    )]
    pub cluster_seed: Endpoint,
}

impl Cli {
    /// The server the run is aimed at.
    pub fn target(&self) -> Target {
        Target {
            host: self.host.clone(),
            port: self.port,
            credential: Credential::from_parts(self.user.as_deref(), self.auth.as_deref()),
            tls: self.tls,
            cluster_seed: self.cluster_seed.clone(),
        }
    }

    /// Requested class ids, or every built-in when none were given.
    pub fn class_ids(&self) -> Vec<String> {
        if self.class.is_empty() {
            BuiltinSuite::ALL.iter().map(|s| s.id().to_string()).collect()
        } else {
            parse_class_list(&self.class)
        }
    }

    /// Colors only when allowed and stdout is a terminal.
    pub fn colorize(&self) -> bool {
        !self.nocolors && std::io::stdout().is_terminal()
    }
}

/// Run the classes `cli` selects against the live server.
///
/// `Err` means the report sink itself failed; test outcomes are in the code.
pub async fn run(cli: &Cli, out: &mut dyn Write) -> Result<i32> {
    if cli.tls {
        writeln!(out, "Assuming TLS connection for client constructor feature tests.")?;
    }
    let target = cli.target();
    let seeds = SeedResolver::new(SeedSources::from_environment(target.endpoint()));
    let run = Arc::new(RunContext::new(ConnectionFactory::live(target), seeds));
    let runner = SuiteRunner::new(run).colorize(cli.colorize());
    run_classes(
        &SuiteRegistry::new(),
        &runner,
        &cli.class_ids(),
        cli.test.as_deref(),
        out,
    )
    .await
}

/// Resolve and run each class in order.
///
/// Every class runs; the result collapses into one bit. An unknown class
/// counts as a failure. A fatal error prints its diagnostic and stops the run.
/// Write errors on `out` are returned as [`HarnessError::Io`].
pub async fn run_classes(
    registry: &SuiteRegistry,
    runner: &SuiteRunner,
    class_ids: &[String],
    filter: Option<&str>,
    out: &mut dyn Write,
) -> Result<i32> {
    let mut failed = false;
    for id in class_ids {
        let suite = match registry.resolve(id) {
            Ok(suite) => suite,
            Err(e) => {
                writeln!(out, "{e}")?;
                failed = true;
                continue;
            }
        };
        info!(class = suite.name(), "running");
        match runner.run_suite(suite.as_ref(), filter, out).await {
            Ok(report) => failed |= !report.is_success(),
            Err(e @ HarnessError::Fatal { .. }) => {
                error!(error = %e, "aborting run");
                writeln!(out, "{e}")?;
                out.flush()?;
                return Ok(EXIT_FAILURE);
            }
            Err(e) => return Err(e),
        }
    }
    out.flush()?;
    Ok(if failed { EXIT_FAILURE } else { EXIT_SUCCESS })
}

// ── Tests ──────────────────────────────────────────────────────────
