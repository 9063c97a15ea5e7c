//! Test suites: named lists of async cases plus the registry that resolves
//! class ids to suites.
//!
//! A case is a plain `async fn(&TestContext) -> Result<()>`. The [`case!`]
//! macro turns it into a [`TestCase`] the runner can call through a function
//! pointer.

pub mod cluster;
pub mod cluster_features;
pub mod connection_request;
pub mod features;
pub mod runner;
pub mod standalone;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::{Deployment, TestContext};
use crate::error::{HarnessError, Result};

/// Future produced by one test case.
pub type CaseFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Entry point of one test case.
pub type CaseFn = for<'a> fn(&'a TestContext) -> CaseFuture<'a>;

#[derive(Clone, Copy)]
pub struct TestCase {
    pub name: &'static str,
    pub run: CaseFn,
}

impl TestCase {
    pub const fn new(name: &'static str, run: CaseFn) -> Self {
        Self { name, run }
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TestCase").field(&self.name).finish()
    }
}

/// `case!("testPing", test_ping)` wraps an `async fn(&TestContext) -> Result<()>`.
#[macro_export]
macro_rules! case {
    ($name:literal, $func:path) => {
        $crate::suite::TestCase::new($name, {
            fn run(ctx: &$crate::context::TestContext) -> $crate::suite::CaseFuture<'_> {
                Box::pin($func(ctx))
            }
            run
        })
    };
}

/// A named collection of cases run against one kind of deployment.
pub trait Suite: Send + Sync {
    /// Class name shown in the report.
    fn name(&self) -> &str;

    fn deployment(&self) -> Deployment;

    fn cases(&self) -> Vec<TestCase>;
}

/// The suites shipped with the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinSuite {
    ConnectionRequest,
    Standalone,
    Cluster,
    Features,
    ClusterFeatures,
}

impl BuiltinSuite {
    pub const ALL: [BuiltinSuite; 5] = [
        Self::ConnectionRequest,
        Self::Standalone,
        Self::Cluster,
        Self::Features,
        Self::ClusterFeatures,
    ];

    /// Lookup by lower-cased class id.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|suite| suite.id() == id)
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::ConnectionRequest => "connectionrequest",
            Self::Standalone => "valkeyglide",
            Self::Cluster => "valkeyglidecluster",
            Self::Features => "valkeyglideclientfeatures",
            Self::ClusterFeatures => "valkeyglideclusterfeatures",
        }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            Self::ConnectionRequest => "ConnectionRequestTest",
            Self::Standalone => "ValkeyGlideTest",
            Self::Cluster => "ValkeyGlideClusterTest",
            Self::Features => "ValkeyGlideFeaturesTest",
            Self::ClusterFeatures => "ValkeyGlideClusterFeaturesTest",
        }
    }
}

impl Suite for BuiltinSuite {
    fn name(&self) -> &str {
        self.class_name()
    }

    fn deployment(&self) -> Deployment {
        match self {
            Self::ConnectionRequest => Deployment::Offline,
            Self::Standalone | Self::Features => Deployment::Standalone,
            Self::Cluster | Self::ClusterFeatures => Deployment::Cluster,
        }
    }

    fn cases(&self) -> Vec<TestCase> {
        match self {
            Self::ConnectionRequest => connection_request::cases(),
            Self::Standalone => standalone::cases(),
            Self::Cluster => cluster::cases(),
            Self::Features => features::cases(),
            Self::ClusterFeatures => cluster_features::cases(),
        }
    }
}

/// Resolves class ids: built-ins first, then registered plugins.
#[derive(Default)]
pub struct SuiteRegistry {
    plugins: Vec<(String, Arc<dyn Suite>)>,
}

impl SuiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `suite` available under `id` (matched case-insensitively).
    /// Built-in ids cannot be shadowed.
    pub fn register(&mut self, id: &str, suite: Arc<dyn Suite>) {
        self.plugins.push((id.to_lowercase(), suite));
    }

    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Suite>> {
        let id = id.to_lowercase();
        if let Some(builtin) = BuiltinSuite::from_id(&id) {
            return Ok(Arc::new(builtin));
        }
        self.plugins
            .iter()
            .find(|(plugin_id, _)| *plugin_id == id)
            .map(|(_, suite)| Arc::clone(suite))
            .ok_or(HarnessError::UnknownSuite(id))
    }
}

/// Split comma-separated class ids, lower-case them and drop duplicates,
/// keeping first-seen order.
pub fn parse_class_list<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in values
        .iter()
        .flat_map(|v| v.as_ref().split(','))
        .map(|id| id.trim().to_lowercase())
        .filter(|id| !id.is_empty())
    {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Apply the `--test` filter. An exact (case-insensitive) name wins;
/// otherwise every case containing the filter is kept.
pub fn select_cases(cases: Vec<TestCase>, filter: Option<&str>) -> Vec<TestCase> {
    let Some(filter) = filter.map(str::to_lowercase).filter(|f| !f.is_empty()) else {
        return cases;
    };
    if let Some(exact) = cases.iter().find(|c| c.name.to_lowercase() == filter) {
        return vec![*exact];
    }
    cases
        .into_iter()
        .filter(|c| c.name.to_lowercase().contains(&filter))
        .collect()
}

// ── Tests ──────────────────────────────────────────────────────────
