//! Conformance harness for Valkey/Redis clients.
//!
//! Suites of async test cases run against a standalone server, a cluster,
//! or offline. The [`driver`] selects and runs them; [`bulk`] re-runs the
//! standalone surface one test per process.

pub mod bulk;
pub mod client;
pub mod cluster;
pub mod config;
pub mod connect;
pub mod context;
pub mod driver;
pub mod error;
pub mod fixtures;
pub mod info;
pub mod logging;
pub mod reply;
pub mod runtime;
pub mod seeds;
pub mod suite;

pub use client::{ClientHandle, Route, StoreClient, Topology};
pub use context::{Deployment, RunContext, TestContext};
pub use error::{HarnessError, Result};
pub use reply::Reply;
