//! Events consumed from the platform and notifications emitted to observers.

use serde::{Deserialize, Serialize};

use super::attribution::AttributionResult;
use super::join_record::JoinRecord;
use super::member::Member;

/// An event delivered by the platform gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEvent {
    /// The gateway connection is ready.
    Ready,
    MemberJoined { member: Member },
    MemberLeft { member: Member },
    InviteCreated { guild_id: String, code: String },
    InviteDeleted { guild_id: String, code: String },
}

impl PlatformEvent {
    /// Event name used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PlatformEvent::Ready => "ready",
            PlatformEvent::MemberJoined { .. } => "member_joined",
            PlatformEvent::MemberLeft { .. } => "member_left",
            PlatformEvent::InviteCreated { .. } => "invite_created",
            PlatformEvent::InviteDeleted { .. } => "invite_deleted",
        }
    }

    /// The guild the event concerns, if any.
    pub fn guild_id(&self) -> Option<&str> {
        match self {
            PlatformEvent::Ready => None,
            PlatformEvent::MemberJoined { member } | PlatformEvent::MemberLeft { member } => {
                Some(member.guild_id.as_str())
            }
            PlatformEvent::InviteCreated { guild_id, .. }
            | PlatformEvent::InviteDeleted { guild_id, .. } => Some(guild_id.as_str()),
        }
    }
}

/// Notification re-emitted to observers of the tracker.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    /// A join was attributed.
    InviteJoin {
        member: Member,
        attribution: AttributionResult,
    },
    /// A member left. `record` is the closed join record, if one was open.
    InviteLeave {
        member: Member,
        record: Option<JoinRecord>,
    },
}
