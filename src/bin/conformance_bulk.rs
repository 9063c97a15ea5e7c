//! `conformance-bulk`: every standalone test in its own process.

use tracing::error;

use valkey_conformance::bulk::{self, BulkDriver};
use valkey_conformance::{logging, runtime};

fn main() {
    logging::init();
    let program = match bulk::runner_path() {
        Ok(path) => path,
        Err(e) => {
            error!(error = %e, "cannot locate the conformance runner");
            std::process::exit(1);
        }
    };
    let names = bulk::catalog();
    let mut stdout = std::io::stdout().lock();
    let code = match runtime::block_on(BulkDriver::new(program).run(&names, &mut stdout)) {
        Ok(summary) => summary.exit_code(),
        Err(e) => {
            error!(error = %e, "bulk run aborted");
            1
        }
    };
    drop(stdout);
    std::process::exit(code);
}
