//! Invite cache refresher.

use std::sync::Arc;

use shared::retry::Retry;
use tracing::{debug, info, warn};

use super::invite_cache::{InviteCache, InviteSnapshot};
use super::platform::{InvitePlatform, PlatformError};

/// Fetches live invite state and installs it into the [`InviteCache`].
///
/// Every platform call goes through the best-effort retry controller: when
/// retries run out the cache keeps its previous (possibly absent) snapshot.
pub struct CacheRefresher {
    platform: Arc<dyn InvitePlatform>,
    cache: Arc<InviteCache>,
    retry: Retry,
}

impl CacheRefresher {
    pub fn new(platform: Arc<dyn InvitePlatform>, cache: Arc<InviteCache>, retry: Retry) -> Self {
        Self {
            platform,
            cache,
            retry,
        }
    }

    pub fn cache(&self) -> &Arc<InviteCache> {
        &self.cache
    }

    /// Rebuild one guild's snapshot from live data.
    ///
    /// Returns the installed snapshot, or `None` if every attempt failed.
    pub async fn refresh_guild(&self, guild_id: &str) -> Option<Arc<InviteSnapshot>> {
        let snapshot = self
            .retry
            .best_effort("refresh_guild_invites", || self.fetch_snapshot(guild_id))
            .await?;

        let snapshot = Arc::new(snapshot);
        self.cache.set(guild_id, snapshot.clone());
        debug!(
            guild_id = %guild_id,
            invites = snapshot.len(),
            vanity_uses = ?snapshot.vanity_uses(),
            "Invite cache refreshed"
        );
        Some(snapshot)
    }

    /// Every guild visible to the client. Empty if the listing failed.
    pub async fn list_guilds(&self) -> Vec<String> {
        self.retry
            .best_effort("list_guilds", || self.platform.list_guilds())
            .await
            .unwrap_or_default()
    }

    /// The guild's vanity code, or `None` if it has none or the lookup failed.
    pub async fn vanity_code(&self, guild_id: &str) -> Option<String> {
        self.retry
            .best_effort("fetch_vanity_code", || self.platform.vanity_code(guild_id))
            .await
            .flatten()
    }

    /// Current vanity use count. A missing count is read as zero; `None`
    /// means the lookup failed.
    pub async fn fetch_vanity_uses(&self, guild_id: &str) -> Option<u64> {
        self.retry
            .best_effort("fetch_vanity_uses", || self.platform.fetch_vanity_uses(guild_id))
            .await
            .map(|uses| uses.unwrap_or(0))
    }

    async fn fetch_snapshot(&self, guild_id: &str) -> Result<InviteSnapshot, PlatformError> {
        let invites = self.platform.fetch_invites(guild_id).await?;

        // Vanity failures leave the count out; the invite counts are still installed.
        let vanity_uses = match self.platform.vanity_code(guild_id).await {
            Ok(Some(_)) => match self.platform.fetch_vanity_uses(guild_id).await {
                Ok(uses) => Some(uses.unwrap_or(0)),
                Err(e) => {
                    self.log_vanity_failure(guild_id, &e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                self.log_vanity_failure(guild_id, &e);
                None
            }
        };

        Ok(InviteSnapshot::from_invites(&invites, vanity_uses))
    }

    fn log_vanity_failure(&self, guild_id: &str, err: &PlatformError) {
        if self.retry.is_verbose() {
            warn!(guild_id = %guild_id, error = %err, "Failed to fetch vanity data");
        } else {
            debug!(guild_id = %guild_id, error = %err, "Failed to fetch vanity data");
        }
    }
}

impl std::fmt::Debug for CacheRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRefresher")
            .field("cached_guilds", &self.cache.len())
            .field("retry", &self.retry)
            .finish()
    }
}

/// Log line for a finished full pass.
pub(crate) fn log_refresh_pass(total: usize, refreshed: usize) {
    if refreshed == total {
        info!(guilds = total, "Cached invites for all guilds");
    } else {
        warn!(
            guilds = total,
            refreshed = refreshed,
            failed = total - refreshed,
            "Cached invites for some guilds; the rest will be retried on their next event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LiveInvite;
    use crate::services::platform::MockInvitePlatform;
    use shared::retry::RetryPolicy;
    use std::time::Duration;

    fn refresher(platform: Arc<MockInvitePlatform>) -> CacheRefresher {
        CacheRefresher::new(
            platform,
            Arc::new(InviteCache::new()),
            Retry::new(RetryPolicy::new(3, Duration::ZERO), false),
        )
    }

    #[tokio::test]
    async fn test_refresh_installs_live_counts() {
        let platform = Arc::new(MockInvitePlatform::new());
        platform.set_invites(
            "g",
            vec![
                LiveInvite::new("a", 3),
                LiveInvite {
                    code: "b".to_string(),
                    uses: None,
                    inviter_id: None,
                },
            ],
        );
        let refresher = refresher(platform.clone());

        let snapshot = refresher.refresh_guild("g").await.unwrap();

        assert_eq!(snapshot.uses("a"), Some(3));
        assert_eq!(snapshot.uses("b"), Some(0));
        assert_eq!(snapshot.vanity_uses(), None);
        assert_eq!(refresher.cache().get("g").unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_unchanged_data_yields_no_diff() {
        let platform = Arc::new(MockInvitePlatform::new());
        platform.set_uses("g", "a", 3);
        platform.set_uses("g", "b", 9);
        let refresher = refresher(platform.clone());

        refresher.refresh_guild("g").await.unwrap();
        let live = platform.fetch_invites("g").await.unwrap();

        assert!(refresher.cache().get("g").unwrap().moved(&live).is_empty());
    }

    #[tokio::test]
    async fn test_refresh_includes_vanity_uses() {
        let platform = Arc::new(MockInvitePlatform::new());
        platform.set_uses("g", "a", 1);
        platform.set_vanity("g", "cool", Some(12));
        let refresher = refresher(platform.clone());

        let snapshot = refresher.refresh_guild("g").await.unwrap();

        assert_eq!(snapshot.vanity_uses(), Some(12));
    }

    #[tokio::test]
    async fn test_vanity_failure_omits_vanity_count() {
        let platform = Arc::new(MockInvitePlatform::new());
        platform.set_uses("g", "a", 1);
        platform.set_vanity("g", "cool", Some(12));
        platform.fail_vanity_fetches(true);
        let refresher = refresher(platform.clone());

        let snapshot = refresher.refresh_guild("g").await.unwrap();

        assert_eq!(snapshot.uses("a"), Some(1));
        assert_eq!(snapshot.vanity_uses(), None);
        assert_eq!(platform.invite_fetch_count("g"), 1);
    }

    #[tokio::test]
    async fn test_vanity_code_failure_still_installs_invites() {
        let platform = Arc::new(MockInvitePlatform::new());
        platform.set_uses("g", "a", 4);
        platform.set_vanity("g", "cool", Some(12));
        platform.fail_vanity_code_lookups(true);
        let refresher = refresher(platform.clone());

        let snapshot = refresher.refresh_guild("g").await.unwrap();

        assert_eq!(snapshot.uses("a"), Some(4));
        assert_eq!(snapshot.vanity_uses(), None);
        assert!(refresher.cache().get("g").is_some());
        assert_eq!(platform.invite_fetch_count("g"), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let platform = Arc::new(MockInvitePlatform::new());
        platform.set_uses("g", "a", 1);
        platform.fail_next_invite_fetches(2);
        let refresher = refresher(platform.clone());

        assert!(refresher.refresh_guild("g").await.is_some());
        assert_eq!(platform.invite_fetch_count("g"), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_keep_previous_snapshot() {
        let platform = Arc::new(MockInvitePlatform::new());
        platform.set_uses("g", "a", 1);
        let refresher = refresher(platform.clone());
        refresher.refresh_guild("g").await.unwrap();

        platform.set_uses("g", "a", 5);
        platform.fail_next_invite_fetches(3);

        assert!(refresher.refresh_guild("g").await.is_none());
        assert_eq!(refresher.cache().get("g").unwrap().uses("a"), Some(1));
        assert_eq!(platform.invite_fetch_count("g"), 4);
    }
}
