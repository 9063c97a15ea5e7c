//! `conformance`: run one or more test classes against a server.

use clap::Parser;
use tracing::error;

use valkey_conformance::driver::{self, Cli};
use valkey_conformance::{logging, runtime};

fn main() {
    logging::init();
    let cli = Cli::parse();
    let mut stdout = std::io::stdout().lock();
    let code = match runtime::block_on(driver::run(&cli, &mut stdout)) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "report output failed");
            driver::EXIT_FAILURE
        }
    };
    drop(stdout);
    std::process::exit(code);
}
