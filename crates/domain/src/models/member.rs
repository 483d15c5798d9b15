//! Platform-side models: guild members and live invites.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::snowflake::snowflake_timestamp;

/// A member joining or leaving a guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Member {
    pub guild_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Account creation time, when the platform supplied it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_created_at: Option<DateTime<Utc>>,
}

impl Member {
    pub fn new(guild_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            user_id: user_id.into(),
            username: None,
            account_created_at: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_account_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.account_created_at = Some(created_at);
        self
    }

    /// Account creation time, falling back to the time encoded in the user id.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.account_created_at
            .or_else(|| snowflake_timestamp(&self.user_id))
    }
}

/// An invite as currently reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LiveInvite {
    pub code: String,
    #[serde(default)]
    pub uses: Option<u64>,
    #[serde(default)]
    pub inviter_id: Option<String>,
}

impl LiveInvite {
    pub fn new(code: impl Into<String>, uses: u64) -> Self {
        Self {
            code: code.into(),
            uses: Some(uses),
            inviter_id: None,
        }
    }

    pub fn with_inviter(mut self, inviter_id: impl Into<String>) -> Self {
        self.inviter_id = Some(inviter_id.into());
        self
    }

    /// Use count, treating a missing count as zero.
    pub fn use_count(&self) -> u64 {
        self.uses.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_explicit_creation_time_wins() {
        let explicit = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let member = Member::new("1", "175928847299117063").with_account_created_at(explicit);
        assert_eq!(member.created_at(), Some(explicit));
    }

    #[test]
    fn test_creation_time_from_snowflake() {
        let member = Member::new("1", "175928847299117063");
        assert_eq!(
            member.created_at().map(|t| t.timestamp_millis()),
            Some(1_462_015_105_796)
        );
    }

    #[test]
    fn test_unparsable_id_has_no_creation_time() {
        assert!(Member::new("1", "someone").created_at().is_none());
    }

    #[test]
    fn test_missing_uses_counts_as_zero() {
        let invite: LiveInvite = serde_json::from_str(r#"{"code":"abc"}"#).unwrap();
        assert_eq!(invite.use_count(), 0);
        assert!(invite.inviter_id.is_none());
    }
}
