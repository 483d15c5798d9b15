//! Fake-join heuristic.
//!
//! A join is labelled fake when the account is younger than the account-age
//! threshold, or when the member left the same guild more recently than the
//! rejoin threshold. The label is advisory and never blocks a join.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::ledger::JoinLedger;
use crate::models::{Member, TrackerOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeJoinDetector {
    account_age_threshold: Duration,
    rejoin_threshold: Duration,
}

impl FakeJoinDetector {
    pub fn new(account_age_threshold: Duration, rejoin_threshold: Duration) -> Self {
        Self {
            account_age_threshold,
            rejoin_threshold,
        }
    }

    pub fn from_options(options: &TrackerOptions) -> Self {
        Self::new(options.account_age_threshold(), options.rejoin_threshold())
    }

    /// Account-age signal. Unknown creation time never fires.
    pub fn is_new_account(&self, member: &Member, now: DateTime<Utc>) -> bool {
        member
            .created_at()
            .map(|created_at| now - created_at < self.account_age_threshold)
            .unwrap_or(false)
    }

    /// Rejoin signal, given the member's most recent leave in the guild.
    pub fn is_recent_rejoin(&self, last_left_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        last_left_at
            .map(|left_at| now - left_at < self.rejoin_threshold)
            .unwrap_or(false)
    }

    /// Score a joining member. The ledger is only consulted when the
    /// account-age signal did not fire.
    pub async fn is_fake(&self, member: &Member, ledger: &JoinLedger, now: DateTime<Utc>) -> bool {
        if self.is_new_account(member, now) {
            debug!(guild_id = %member.guild_id, user_id = %member.user_id, "Fake join: new account");
            return true;
        }

        let last_left_at = ledger
            .find_fake_signal(&member.guild_id, &member.user_id)
            .await;
        if self.is_recent_rejoin(last_left_at, now) {
            debug!(guild_id = %member.guild_id, user_id = %member.user_id, "Fake join: recent rejoin");
            return true;
        }

        false
    }
}

impl Default for FakeJoinDetector {
    fn default() -> Self {
        Self::from_options(&TrackerOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttributionResult, NewJoinRecord};
    use crate::services::ledger::InMemoryJoinRecordStore;
    use std::sync::Arc;
    use uuid::Uuid;

    fn member_aged(now: DateTime<Utc>, age: Duration) -> Member {
        Member::new("g", "42").with_account_created_at(now - age)
    }

    fn ledger_with_leave(left_at: Option<DateTime<Utc>>) -> JoinLedger {
        let store = Arc::new(InMemoryJoinRecordStore::new());
        if let Some(left_at) = left_at {
            let joined = AttributionResult::unknown("g", "42", false, left_at - Duration::days(1));
            let mut record = NewJoinRecord::from(&joined).into_record(Uuid::new_v4());
            record.left_at = Some(left_at);
            store.seed(record);
        }
        JoinLedger::new(store, false)
    }

    #[tokio::test]
    async fn test_hour_old_account_is_fake() {
        let now = Utc::now();
        let detector = FakeJoinDetector::default();

        let member = member_aged(now, Duration::hours(1));

        assert!(detector.is_fake(&member, &ledger_with_leave(None), now).await);
        assert!(
            detector
                .is_fake(&member, &ledger_with_leave(Some(now - Duration::days(60))), now)
                .await
        );
    }

    #[tokio::test]
    async fn test_recent_leave_is_fake() {
        let now = Utc::now();
        let detector = FakeJoinDetector::default();
        let member = member_aged(now, Duration::days(30));

        let ledger = ledger_with_leave(Some(now - Duration::days(2)));

        assert!(detector.is_fake(&member, &ledger, now).await);
    }

    #[tokio::test]
    async fn test_old_leave_is_not_fake() {
        let now = Utc::now();
        let detector = FakeJoinDetector::default();
        let member = member_aged(now, Duration::days(30));

        let ledger = ledger_with_leave(Some(now - Duration::days(30)));

        assert!(!detector.is_fake(&member, &ledger, now).await);
    }

    #[tokio::test]
    async fn test_established_first_join_is_not_fake() {
        let now = Utc::now();
        let detector = FakeJoinDetector::default();

        let member = member_aged(now, Duration::days(365));

        assert!(!detector.is_fake(&member, &ledger_with_leave(None), now).await);
    }

    #[test]
    fn test_unknown_creation_time_does_not_fire() {
        let detector = FakeJoinDetector::default();
        assert!(!detector.is_new_account(&Member::new("g", "not-a-snowflake"), Utc::now()));
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let now = Utc::now();
        let detector = FakeJoinDetector::new(Duration::days(30), Duration::hours(1));

        assert!(detector.is_new_account(&member_aged(now, Duration::days(10)), now));
        assert!(!detector.is_recent_rejoin(Some(now - Duration::hours(2)), now));
        assert!(detector.is_recent_rejoin(Some(now - Duration::minutes(30)), now));
    }
}
