//! Per-test context: one client, server metadata and the failure recorder.
//!
//! A fresh [`TestContext`] is built for every test case. `set_up` obtains
//! the client, `tear_down` releases it. Assertions record a failure and
//! return `false` instead of aborting the test body, so one case can report
//! several broken expectations.

use std::fmt::Debug;
use std::panic::Location;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::client::{ClientHandle, Route};
use crate::connect::{ConnectionFactory, Target};
use crate::error::{HarnessError, Result};
use crate::info::{self, InfoMap, UNKNOWN_VERSION};
use crate::reply::Reply;
use crate::seeds::SeedResolver;

const UNREACHABLE: &str =
    "Failed to connect to Valkey/Redis server. Please ensure server is running and accessible.";

/// What kind of server a suite needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    /// No server; the suite inspects locally built values.
    Offline,
    Standalone,
    Cluster,
}

/// State shared by every test of one run.
pub struct RunContext {
    factory: ConnectionFactory,
    seeds: SeedResolver,
}

impl RunContext {
    pub fn new(factory: ConnectionFactory, seeds: SeedResolver) -> Self {
        Self { factory, seeds }
    }

    pub fn factory(&self) -> &ConnectionFactory {
        &self.factory
    }

    pub fn seeds(&self) -> &SeedResolver {
        &self.seeds
    }

    pub fn target(&self) -> &Target {
        self.factory.target()
    }
}

#[derive(Debug, Default)]
struct Recorder {
    failures: Vec<String>,
    warnings: Vec<String>,
}

pub struct TestContext {
    deployment: Deployment,
    run: Arc<RunContext>,
    case_name: String,
    client: Option<ClientHandle>,
    version: String,
    is_valkey: bool,
    recorder: Mutex<Recorder>,
}

impl TestContext {
    pub fn new(deployment: Deployment, run: Arc<RunContext>, case_name: impl Into<String>) -> Self {
        Self {
            deployment,
            run,
            case_name: case_name.into(),
            client: None,
            version: UNKNOWN_VERSION.to_string(),
            is_valkey: false,
            recorder: Mutex::new(Recorder::default()),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    pub async fn set_up(&mut self) -> Result<()> {
        match self.deployment {
            Deployment::Offline => Ok(()),
            Deployment::Standalone => self.set_up_standalone().await,
            Deployment::Cluster => self.set_up_cluster().await,
        }
    }

    async fn set_up_standalone(&mut self) -> Result<()> {
        let client = self.new_instance().await?;
        self.client = Some(client.clone());
        match client.info(Route::Default).await? {
            Some(info) => {
                self.apply_info(&info);
                Ok(())
            }
            None => Err(HarnessError::Unreachable(UNREACHABLE.into())),
        }
    }

    pub(crate) fn apply_info(&mut self, info: &InfoMap) {
        self.version = info.server_version().to_string();
        self.is_valkey = info.is_valkey();
        debug!(version = %self.version, valkey = self.is_valkey, "server detected");
    }

    /// Release the client if one was obtained. Close errors are logged only.
    pub async fn tear_down(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.close().await {
                debug!(error = %e, "close during teardown failed");
            }
        }
    }

    /// A new standalone client for the target, authenticated when a
    /// credential is configured. A rejected credential is recorded as a
    /// failed assertion; the client is still returned.
    pub async fn new_instance(&self) -> Result<ClientHandle> {
        let client = self.factory().standalone().await?;
        let credential = &self.target().credential;
        if !credential.is_none() {
            let accepted = client.auth(credential).await?;
            self.assert_true(accepted);
        }
        Ok(client)
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn deployment(&self) -> Deployment {
        self.deployment
    }

    pub fn run(&self) -> &Arc<RunContext> {
        &self.run
    }

    pub fn factory(&self) -> &ConnectionFactory {
        self.run.factory()
    }

    pub fn target(&self) -> &Target {
        self.run.target()
    }

    pub fn case_name(&self) -> &str {
        &self.case_name
    }

    pub(crate) fn set_client(&mut self, client: ClientHandle) {
        self.client = Some(client);
    }

    /// The client obtained in `set_up`.
    pub fn client(&self) -> Result<&ClientHandle> {
        self.client
            .as_ref()
            .ok_or_else(|| HarnessError::Connection("no client: set_up did not run or failed".into()))
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_valkey(&self) -> bool {
        self.is_valkey
    }

    /// True iff the server version is at least `version`.
    pub fn min_version_check(&self, version: &str) -> bool {
        info::version_at_least(&self.version, version)
    }

    /// Pipelining is not exercised yet.
    pub fn have_pipeline(&self) -> bool {
        false
    }

    /// MULTI/EXEC is not exercised yet.
    pub fn have_multi(&self) -> bool {
        false
    }

    pub fn auth_fragment(&self) -> String {
        self.target().credential.auth_fragment()
    }

    /// Standalone session store path: `tcp://host:port?<auth>`.
    pub fn session_save_path(&self) -> String {
        format!("tcp://{}:{}?{}", self.target().host, self.target().port, self.auth_fragment())
    }

    /// Raw command for protocol-level checks. In a cluster `key` routes the
    /// command to its owning primary; standalone ignores it.
    pub async fn raw_command_array(&self, key: &str, args: &[&str]) -> Result<Reply> {
        let client = self.client()?;
        match self.deployment {
            Deployment::Cluster => client.raw_command_routed(key, args).await,
            _ => client.raw_command(args).await,
        }
    }

    // ── Outcome recording ────────────────────────────────────────

    pub fn failures(&self) -> Vec<String> {
        self.recorder.lock().failures.clone()
    }

    pub fn has_failures(&self) -> bool {
        !self.recorder.lock().failures.is_empty()
    }

    pub fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut self.recorder.lock().warnings)
    }

    fn record(&self, location: &Location<'_>, message: String) {
        let prefix = "Assertion failed:";
        let entry = format!(
            "{prefix} {} - {message}\n{:width$} {}:{}\n",
            self.case_name,
            "",
            location.file(),
            location.line(),
            width = prefix.len()
        );
        self.recorder.lock().failures.push(entry);
    }

    /// Record an error that escaped the test body.
    pub fn fail_uncaught(&self, error: &HarnessError) {
        self.recorder
            .lock()
            .failures
            .push(format!("Uncaught error '{error}' ({})\n", self.case_name));
    }

    /// End the test as skipped: `return ctx.skip("reason");`
    #[track_caller]
    pub fn skip<T>(&self, reason: impl Into<String>) -> Result<T> {
        let reason = reason.into();
        let location = Location::caller();
        self.recorder.lock().warnings.push(format!(
            "Skipped test: {}:{} ({}) {reason}\n",
            location.file(),
            location.line(),
            self.case_name
        ));
        Err(HarnessError::Skipped(reason))
    }

    // ── Assertions ───────────────────────────────────────────────

    #[track_caller]
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.record(Location::caller(), format!("'{}'", message.into()));
        false
    }

    #[track_caller]
    pub fn assert_true(&self, value: bool) -> bool {
        if !value {
            self.record(Location::caller(), "expected true".into());
        }
        value
    }

    #[track_caller]
    pub fn assert_false(&self, value: bool) -> bool {
        if value {
            self.record(Location::caller(), "expected false".into());
        }
        !value
    }

    #[track_caller]
    pub fn assert_eq<T: PartialEq + Debug + ?Sized>(&self, expected: &T, actual: &T) -> bool {
        self.assert_eq_at(Location::caller(), expected, actual)
    }

    pub(crate) fn assert_eq_at<T: PartialEq + Debug + ?Sized>(
        &self,
        location: &Location<'_>,
        expected: &T,
        actual: &T,
    ) -> bool {
        let ok = expected == actual;
        if !ok {
            self.record(location, format!("{expected:?} !== {actual:?}"));
        }
        ok
    }

    #[track_caller]
    pub fn assert_ne<T: PartialEq + Debug + ?Sized>(&self, wrong: &T, actual: &T) -> bool {
        let ok = wrong != actual;
        if !ok {
            self.record(Location::caller(), format!("{wrong:?} === {actual:?}"));
        }
        ok
    }

    #[track_caller]
    pub fn assert_contains<T: PartialEq + Debug>(&self, haystack: &[T], needle: &T) -> bool {
        let ok = haystack.contains(needle);
        if !ok {
            self.record(Location::caller(), format!("{needle:?} not found in {haystack:?}"));
        }
        ok
    }

    #[track_caller]
    pub fn assert_string_contains(&self, needle: &str, haystack: &str) -> bool {
        let ok = haystack.contains(needle);
        if !ok {
            self.record(Location::caller(), format!("'{needle}' not found in '{haystack}'"));
        }
        ok
    }

    /// Same elements, any order.
    #[track_caller]
    pub fn assert_unordered_eq<T: Ord + Clone + Debug>(&self, expected: &[T], actual: &[T]) -> bool {
        self.assert_unordered_eq_at(Location::caller(), expected, actual)
    }

    pub(crate) fn assert_unordered_eq_at<T: Ord + Clone + Debug>(
        &self,
        location: &Location<'_>,
        expected: &[T],
        actual: &[T],
    ) -> bool {
        let mut e = expected.to_vec();
        let mut a = actual.to_vec();
        e.sort();
        a.sort();
        if e != a {
            self.record(location, format!("{e:?} !== {a:?} (canonicalized)"));
            return false;
        }
        true
    }

    /// Unwrap `result`, recording the error as a failure.
    #[track_caller]
    pub fn assert_ok<T>(&self, result: Result<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.record(Location::caller(), format!("unexpected error: {e}"));
                None
            }
        }
    }

    /// Expect an error; returns it so the caller can inspect the kind.
    #[track_caller]
    pub fn assert_err<T: Debug>(&self, result: Result<T>) -> Option<HarnessError> {
        match result {
            Ok(v) => {
                self.record(Location::caller(), format!("expected an error, got {v:?}"));
                None
            }
            Err(e) => Some(e),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
