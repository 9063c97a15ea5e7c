//! Cluster flavour of the test context.
//!
//! Differences from standalone: the client is built through the fixed seed
//! and a construction failure is fatal for the whole run; server info comes
//! from a random node and a missing reply is tolerated; fixtures can be
//! populated and verified per key type.

use std::collections::BTreeMap;

use tracing::debug;

use crate::client::{ClientHandle, Route};
use crate::context::TestContext;
use crate::error::{HarnessError, Result};
use crate::fixtures::{self, FixtureValue, KeyType};
use crate::info::UNKNOWN_VERSION;
use crate::seeds::SeedSet;

/// Key prefix for sessions stored in a cluster.
pub const SESSION_PREFIX: &str = "VALKEY_GLIDE_PHP_CLUSTER_SESSION:";
/// Session save handler name for clusters.
pub const SESSION_SAVE_HANDLER: &str = "rediscluster";

impl TestContext {
    pub(crate) async fn set_up_cluster(&mut self) -> Result<()> {
        // Resolve early so a fatal diagnostic can name the source; failure
        // stays deferred until a caller actually needs the seeds.
        if let Err(e) = self.cluster_seeds().await {
            debug!(error = %e, "cluster seeds unavailable");
        }

        let client = self.new_cluster_instance().await?;
        self.set_client(client.clone());

        let info = match client.info(Route::RandomNode).await {
            Ok(info) => info,
            Err(e) => {
                debug!(error = %e, "INFO from random node failed");
                None
            }
        };
        match info {
            Some(info) => self.apply_info(&info),
            None => debug!("no INFO from cluster; assuming version {UNKNOWN_VERSION}"),
        }
        Ok(())
    }

    /// Cluster client through the fixed seed. Any construction failure is
    /// returned as [`HarnessError::Fatal`], which stops the run.
    pub async fn new_cluster_instance(&self) -> Result<ClientHandle> {
        self.factory().cluster().await.map_err(|e| HarnessError::Fatal {
            message: e.to_string(),
            seed_source: self.run().seeds().source_description(),
        })
    }

    /// The run's seed list, resolved on first use.
    pub async fn cluster_seeds(&self) -> Result<SeedSet> {
        self.run().seeds().resolve(self.factory()).await
    }

    /// `seed[]=h:p&seed[]=h:p…&<auth>`.
    pub async fn cluster_session_save_path(&self) -> Result<String> {
        let seeds = self.cluster_seeds().await?;
        let joined = seeds
            .seeds
            .iter()
            .map(|seed| format!("seed[]={seed}"))
            .collect::<Vec<_>>()
            .join("&");
        Ok(format!("{joined}&{}", self.auth_fragment()))
    }

    /// Populate fixture `index` of `kind` and record what was written in
    /// `ledger`. Returns the derived key name.
    pub async fn set_key_vals(
        &self,
        index: usize,
        kind: KeyType,
        ledger: &mut BTreeMap<String, FixtureValue>,
    ) -> Result<String> {
        let key = fixtures::key_name(kind, index);
        let value = FixtureValue::generate(kind, &key);
        fixtures::write_fixture(self.client()?, &key, &value).await?;
        ledger.insert(key.clone(), value);
        Ok(key)
    }

    /// Compare the live value of `key` against `expected`.
    ///
    /// Sets compare as sorted member lists, sorted sets with the
    /// cardinality/members/score-sum rule, everything else exactly.
    /// Returns `false` (and records a failure) on mismatch.
    #[track_caller]
    pub fn check_key_value<'a>(
        &'a self,
        key: &'a str,
        kind: KeyType,
        expected: &'a FixtureValue,
    ) -> impl std::future::Future<Output = Result<bool>> + Send + 'a {
        let location = std::panic::Location::caller();
        async move {
            if expected.kind() != kind {
                return Err(HarnessError::Fixture(format!(
                    "{key}: expected value is a {}, not a {kind}",
                    expected.kind()
                )));
            }
            let actual = fixtures::read_fixture(self.client()?, kind, key).await?;
            Ok(match (expected, &actual) {
                (FixtureValue::Members(e), FixtureValue::Members(a)) => {
                    self.assert_unordered_eq_at(location, e, a)
                }
                (FixtureValue::Scored(e), FixtureValue::Scored(a)) => {
                    fixtures::zset_equivalent(e, a) || self.assert_eq_at(location, e, a)
                }
                (e, a) => self.assert_eq_at(location, e, a),
            })
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
