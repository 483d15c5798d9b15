//! Join record domain models.
//!
//! A join record is one stay of a member in a guild: created when the join is
//! attributed, closed by setting `left_at` when the member leaves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::attribution::AttributionResult;

/// How a join was attributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    /// Joined through a regular invite code.
    Normal,
    /// Joined through the guild's vanity link.
    Vanity,
    /// The invite could not be determined.
    Unknown,
}

impl JoinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Normal => "normal",
            JoinType::Vanity => "vanity",
            JoinType::Unknown => "unknown",
        }
    }
}

impl FromStr for JoinType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(JoinType::Normal),
            "vanity" => Ok(JoinType::Vanity),
            "unknown" => Ok(JoinType::Unknown),
            _ => Err(format!("Invalid join type: {}", s)),
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted join record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JoinRecord {
    pub id: Uuid,
    pub guild_id: String,
    pub invitee_id: String,
    pub inviter_id: Option<String>,
    pub invite_code: Option<String>,
    pub join_type: JoinType,
    pub fake: bool,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

impl JoinRecord {
    /// Returns true while the member is believed to be in the guild.
    pub fn is_open(&self) -> bool {
        self.left_at.is_none()
    }
}

/// Input for inserting a join record. `left_at` always starts empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJoinRecord {
    pub guild_id: String,
    pub invitee_id: String,
    pub inviter_id: Option<String>,
    pub invite_code: Option<String>,
    pub join_type: JoinType,
    pub fake: bool,
    pub joined_at: DateTime<Utc>,
}

impl NewJoinRecord {
    /// Materialize into a record with the given id.
    pub fn into_record(self, id: Uuid) -> JoinRecord {
        JoinRecord {
            id,
            guild_id: self.guild_id,
            invitee_id: self.invitee_id,
            inviter_id: self.inviter_id,
            invite_code: self.invite_code,
            join_type: self.join_type,
            fake: self.fake,
            joined_at: self.joined_at,
            left_at: None,
        }
    }
}

impl From<&AttributionResult> for NewJoinRecord {
    fn from(result: &AttributionResult) -> Self {
        Self {
            guild_id: result.guild_id.clone(),
            invitee_id: result.invitee_id.clone(),
            inviter_id: result.inviter_id.clone(),
            invite_code: result.invite_code.clone(),
            join_type: result.join_type,
            fake: result.fake,
            joined_at: result.joined_at,
        }
    }
}
