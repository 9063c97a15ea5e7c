//! Global tokio runtime management.
//!
//! The drivers are synchronous `main` functions; every suite, connector and
//! subprocess call runs on one shared multi-threaded runtime reached through
//! [`block_on`].

use std::sync::OnceLock;
use tokio::runtime::Runtime;

/// Global tokio runtime, initialized once on first use.
static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Get (or initialize) the global tokio runtime.
///
/// Worker count defaults to the number of cores. Override with the
/// `CONFORMANCE_RUNTIME_THREADS` environment variable.
pub fn get_runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder.enable_all();

        if let Some(n) = std::env::var("CONFORMANCE_RUNTIME_THREADS")
            .ok()
            .and_then(|threads| threads.parse::<usize>().ok())
            .filter(|&n| n > 0)
        {
            builder.worker_threads(n);
        }

        match builder.thread_name("conformance-rt").build() {
            Ok(rt) => rt,
            // Nothing can run without a runtime (e.g. ulimit too low).
            Err(e) => panic!("conformance: failed to create tokio runtime: {e}"),
        }
    })
}

/// Block on a future using the global runtime.
///
/// Must not be called from within an async context (will panic).
pub fn block_on<F: std::future::Future>(future: F) -> F::Output {
    get_runtime().block_on(future)
}

// ── Tests ──────────────────────────────────────────────────────────
