//! Attribution result model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::join_record::JoinType;

/// Outcome of attributing one join. Handed to the ledger and to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AttributionResult {
    pub guild_id: String,
    pub invitee_id: String,
    /// Creator of the invite. Absent for vanity and unknown joins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inviter_id: Option<String>,
    /// Code that was consumed. Absent for unknown joins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
    pub join_type: JoinType,
    pub fake: bool,
    pub joined_at: DateTime<Utc>,
}

impl AttributionResult {
    /// A result with no invite information yet.
    pub fn unknown(
        guild_id: impl Into<String>,
        invitee_id: impl Into<String>,
        fake: bool,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            guild_id: guild_id.into(),
            invitee_id: invitee_id.into(),
            inviter_id: None,
            invite_code: None,
            join_type: JoinType::Unknown,
            fake,
            joined_at,
        }
    }

    pub fn attribute_invite(&mut self, code: impl Into<String>, inviter_id: Option<String>) {
        self.join_type = JoinType::Normal;
        self.invite_code = Some(code.into());
        self.inviter_id = inviter_id;
    }

    pub fn attribute_vanity(&mut self, code: impl Into<String>) {
        self.join_type = JoinType::Vanity;
        self.invite_code = Some(code.into());
        self.inviter_id = None;
    }
}
