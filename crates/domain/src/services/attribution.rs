//! Join attribution.
//!
//! Attribution diffs live invite use counts against the cached snapshot. The
//! first invite whose count grew (in platform order) is taken as the one the
//! member used. When two invites moved between refreshes the choice is
//! ambiguous; the result still names the first one and a warning lists all
//! of them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::retry::Retry;
use tracing::{debug, info, warn};

use super::fake_join::FakeJoinDetector;
use super::invite_cache::InviteCache;
use super::ledger::JoinLedger;
use super::platform::InvitePlatform;
use super::refresher::CacheRefresher;
use crate::models::{AttributionResult, LiveInvite, Member};

pub struct AttributionResolver {
    platform: Arc<dyn InvitePlatform>,
    cache: Arc<InviteCache>,
    refresher: Arc<CacheRefresher>,
    detector: FakeJoinDetector,
    ledger: Arc<JoinLedger>,
    retry: Retry,
}

impl AttributionResolver {
    pub fn new(
        platform: Arc<dyn InvitePlatform>,
        refresher: Arc<CacheRefresher>,
        detector: FakeJoinDetector,
        ledger: Arc<JoinLedger>,
        retry: Retry,
    ) -> Self {
        Self {
            platform,
            cache: refresher.cache().clone(),
            refresher,
            detector,
            ledger,
            retry,
        }
    }

    /// Attribute a join and persist it.
    ///
    /// The caller must hold the guild's lock. When the guild has no cached
    /// baseline yet, the cache is refreshed for the next join and an
    /// `unknown` result is returned without writing a record.
    pub async fn attribute_join(&self, member: &Member, now: DateTime<Utc>) -> AttributionResult {
        let guild_id = member.guild_id.as_str();
        let fake = self.detector.is_fake(member, &self.ledger, now).await;
        let mut result = AttributionResult::unknown(guild_id, member.user_id.as_str(), fake, now);

        let Some(baseline) = self.cache.get(guild_id) else {
            info!(guild_id = %guild_id, user_id = %member.user_id, "No invite baseline for guild, join left unattributed");
            self.refresher.refresh_guild(guild_id).await;
            return result;
        };

        let vanity_code = self.refresher.vanity_code(guild_id).await;

        let live = self
            .retry
            .best_effort("fetch_invites", || self.platform.fetch_invites(guild_id))
            .await;
        let used = live
            .as_deref()
            .and_then(|invites| first_moved(guild_id, &baseline.moved(invites)));

        // Resync before classifying so the next join diffs against current counts.
        self.refresher.refresh_guild(guild_id).await;

        if let Some(invite) = used {
            if vanity_code.as_deref() == Some(invite.code.as_str()) {
                result.attribute_vanity(invite.code);
            } else {
                result.attribute_invite(invite.code, invite.inviter_id);
            }
        } else if let Some(code) = vanity_code.as_deref() {
            let previous = baseline.vanity_uses().unwrap_or(0);
            if let Some(current) = self.refresher.fetch_vanity_uses(guild_id).await {
                if current > previous {
                    result.attribute_vanity(code);
                }
            }
        }

        // The refresh above may predate the vanity check, so store the latest count.
        if vanity_code.is_some() {
            if let Some(latest) = self.refresher.fetch_vanity_uses(guild_id).await {
                self.cache.set_vanity_uses(guild_id, latest);
            }
        }

        debug!(
            guild_id = %guild_id,
            user_id = %member.user_id,
            join_type = %result.join_type,
            invite_code = ?result.invite_code,
            fake = result.fake,
            "Join attributed"
        );

        self.ledger.record_join(&result).await;
        result
    }
}

/// First moved invite, warning when the choice was ambiguous.
fn first_moved(guild_id: &str, moved: &[&LiveInvite]) -> Option<LiveInvite> {
    if moved.len() > 1 {
        let codes: Vec<&str> = moved.iter().map(|i| i.code.as_str()).collect();
        warn!(
            guild_id = %guild_id,
            moved = ?codes,
            attributed = %codes[0],
            "Several invites were used since the last refresh; attributing to the first"
        );
    }
    moved.first().map(|invite| (*invite).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JoinType;
    use crate::services::ledger::InMemoryJoinRecordStore;
    use crate::services::platform::MockInvitePlatform;
    use chrono::Duration;
    use shared::retry::RetryPolicy;
    use std::time::Duration as StdDuration;

    struct Fixture {
        platform: Arc<MockInvitePlatform>,
        store: Arc<InMemoryJoinRecordStore>,
        cache: Arc<InviteCache>,
        refresher: Arc<CacheRefresher>,
        resolver: AttributionResolver,
    }

    fn fixture() -> Fixture {
        let platform = Arc::new(MockInvitePlatform::new());
        let store = Arc::new(InMemoryJoinRecordStore::new());
        let cache = Arc::new(InviteCache::new());
        let retry = Retry::new(RetryPolicy::new(3, StdDuration::ZERO), false);
        let refresher = Arc::new(CacheRefresher::new(platform.clone(), cache.clone(), retry.clone()));
        let ledger = Arc::new(JoinLedger::new(store.clone(), false));
        let resolver = AttributionResolver::new(
            platform.clone(),
            refresher.clone(),
            FakeJoinDetector::default(),
            ledger,
            retry,
        );
        Fixture {
            platform,
            store,
            cache,
            refresher,
            resolver,
        }
    }

    fn veteran(guild: &str, user: &str) -> Member {
        Member::new(guild, user).with_account_created_at(Utc::now() - Duration::days(400))
    }

    #[tokio::test]
    async fn test_moved_invite_is_attributed() {
        let f = fixture();
        f.platform.set_invites(
            "g",
            vec![
                LiveInvite::new("other", 10).with_inviter("100"),
                LiveInvite::new("X", 3).with_inviter("200"),
            ],
        );
        f.refresher.refresh_guild("g").await.unwrap();
        f.platform.set_uses("g", "X", 4);

        let result = f.resolver.attribute_join(&veteran("g", "1"), Utc::now()).await;

        assert_eq!(result.join_type, JoinType::Normal);
        assert_eq!(result.invite_code.as_deref(), Some("X"));
        assert_eq!(result.inviter_id.as_deref(), Some("200"));
        assert!(!result.fake);

        let records = f.store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].invite_code.as_deref(), Some("X"));
        assert!(records[0].left_at.is_none());

        assert_eq!(f.cache.get("g").unwrap().uses("X"), Some(4));
    }

    #[tokio::test]
    async fn test_moved_vanity_code_is_vanity() {
        let f = fixture();
        f.platform.set_invites("g", vec![LiveInvite::new("cool", 5).with_inviter("300")]);
        f.platform.set_vanity("g", "cool", Some(5));
        f.refresher.refresh_guild("g").await.unwrap();
        f.platform.set_uses("g", "cool", 6);

        let result = f.resolver.attribute_join(&veteran("g", "1"), Utc::now()).await;

        assert_eq!(result.join_type, JoinType::Vanity);
        assert_eq!(result.invite_code.as_deref(), Some("cool"));
        assert!(result.inviter_id.is_none());
        assert!(f.store.records()[0].inviter_id.is_none());
    }

    #[tokio::test]
    async fn test_vanity_counter_increase_is_vanity() {
        let f = fixture();
        f.platform.set_uses("g", "a", 1);
        f.platform.set_vanity("g", "cool", Some(20));
        f.refresher.refresh_guild("g").await.unwrap();
        f.platform.set_vanity_uses("g", 21);

        let result = f.resolver.attribute_join(&veteran("g", "1"), Utc::now()).await;

        assert_eq!(result.join_type, JoinType::Vanity);
        assert_eq!(result.invite_code.as_deref(), Some("cool"));
        assert_eq!(f.cache.get("g").unwrap().vanity_uses(), Some(21));
    }

    #[tokio::test]
    async fn test_no_baseline_is_unknown_and_refreshes() {
        let f = fixture();
        f.platform.set_uses("g", "a", 1);

        let result = f.resolver.attribute_join(&veteran("g", "1"), Utc::now()).await;

        assert_eq!(result.join_type, JoinType::Unknown);
        assert!(result.invite_code.is_none());
        assert!(f.cache.get("g").is_some());
        assert!(f.store.records().is_empty());
    }

    #[tokio::test]
    async fn test_nothing_moved_is_unknown() {
        let f = fixture();
        f.platform.set_uses("g", "a", 1);
        f.refresher.refresh_guild("g").await.unwrap();

        let result = f.resolver.attribute_join(&veteran("g", "1"), Utc::now()).await;

        assert_eq!(result.join_type, JoinType::Unknown);
        assert!(result.invite_code.is_none());
        assert_eq!(f.store.records().len(), 1);
        assert_eq!(f.store.records()[0].join_type, JoinType::Unknown);
    }

    #[tokio::test]
    async fn test_vanity_unchanged_is_unknown() {
        let f = fixture();
        f.platform.set_uses("g", "a", 1);
        f.platform.set_vanity("g", "cool", Some(3));
        f.refresher.refresh_guild("g").await.unwrap();

        let result = f.resolver.attribute_join(&veteran("g", "1"), Utc::now()).await;

        assert_eq!(result.join_type, JoinType::Unknown);
    }

    #[tokio::test]
    async fn test_first_of_several_moved_invites_wins() {
        let f = fixture();
        f.platform.set_uses("g", "a", 1);
        f.platform.set_uses("g", "b", 1);
        f.refresher.refresh_guild("g").await.unwrap();
        f.platform.set_uses("g", "a", 2);
        f.platform.set_uses("g", "b", 2);

        let result = f.resolver.attribute_join(&veteran("g", "1"), Utc::now()).await;

        assert_eq!(result.invite_code.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_newly_created_invite_counts_from_zero() {
        let f = fixture();
        f.platform.set_uses("g", "a", 1);
        f.refresher.refresh_guild("g").await.unwrap();
        f.platform.set_invites(
            "g",
            vec![LiveInvite::new("a", 1), LiveInvite::new("late", 1).with_inviter("7")],
        );

        let result = f.resolver.attribute_join(&veteran("g", "1"), Utc::now()).await;

        assert_eq!(result.invite_code.as_deref(), Some("late"));
        assert_eq!(result.inviter_id.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_failed_live_fetch_still_records_join() {
        let f = fixture();
        f.platform.set_uses("g", "a", 1);
        f.refresher.refresh_guild("g").await.unwrap();
        f.platform.set_uses("g", "a", 2);
        // Exhausts the diff fetch; the follow-up refresh succeeds.
        f.platform.fail_next_invite_fetches(3);

        let result = f.resolver.attribute_join(&veteran("g", "1"), Utc::now()).await;

        assert_eq!(result.join_type, JoinType::Unknown);
        assert_eq!(f.store.records().len(), 1);
        assert_eq!(f.cache.get("g").unwrap().uses("a"), Some(2));
    }

    #[tokio::test]
    async fn test_new_account_is_flagged_and_persisted() {
        let f = fixture();
        f.platform.set_uses("g", "a", 1);
        f.refresher.refresh_guild("g").await.unwrap();
        f.platform.set_uses("g", "a", 2);
        let member = Member::new("g", "1").with_account_created_at(Utc::now() - Duration::hours(1));

        let result = f.resolver.attribute_join(&member, Utc::now()).await;

        assert!(result.fake);
        assert_eq!(result.join_type, JoinType::Normal);
        assert!(f.store.records()[0].fake);
    }
}
