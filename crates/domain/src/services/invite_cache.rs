//! Per-guild invite use counts.
//!
//! Each guild maps to an immutable [`InviteSnapshot`]. Refreshes install a
//! whole new snapshot, so readers see either the previous mapping or the new
//! one, never a mix. Entries are never evicted; the map grows with the number
//! of guilds and is lost when the process exits.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::models::LiveInvite;

/// Use counts observed for one guild at refresh time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InviteSnapshot {
    uses: HashMap<String, u64>,
    /// Vanity link use count. `None` when the guild has no vanity link or the
    /// vanity lookup failed during the refresh.
    vanity_uses: Option<u64>,
}

impl InviteSnapshot {
    pub fn from_invites(invites: &[LiveInvite], vanity_uses: Option<u64>) -> Self {
        Self {
            uses: invites
                .iter()
                .map(|invite| (invite.code.clone(), invite.use_count()))
                .collect(),
            vanity_uses,
        }
    }

    pub fn uses(&self, code: &str) -> Option<u64> {
        self.uses.get(code).copied()
    }

    pub fn vanity_uses(&self) -> Option<u64> {
        self.vanity_uses
    }

    pub fn len(&self) -> usize {
        self.uses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uses.is_empty()
    }

    /// A copy with the vanity count replaced.
    pub fn with_vanity_uses(&self, vanity_uses: Option<u64>) -> Self {
        Self {
            uses: self.uses.clone(),
            vanity_uses,
        }
    }

    /// Live invites whose use count grew past the cached count, in platform
    /// order. Codes missing from the snapshot count as zero.
    pub fn moved<'a>(&self, live: &'a [LiveInvite]) -> Vec<&'a LiveInvite> {
        live.iter()
            .filter(|invite| invite.use_count() > self.uses(&invite.code).unwrap_or(0))
            .collect()
    }
}

/// Guild id to latest snapshot.
#[derive(Debug, Default)]
pub struct InviteCache {
    guilds: RwLock<HashMap<String, Arc<InviteSnapshot>>>,
}

impl InviteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot installed by the last successful refresh, if any.
    pub fn get(&self, guild_id: &str) -> Option<Arc<InviteSnapshot>> {
        self.guilds
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(guild_id)
            .cloned()
    }

    /// Replace the guild's snapshot wholesale.
    pub fn set(&self, guild_id: &str, snapshot: Arc<InviteSnapshot>) {
        self.guilds
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(guild_id.to_string(), snapshot);
    }

    /// Overwrite only the vanity count of an existing snapshot.
    ///
    /// Returns false when the guild has no snapshot yet.
    pub fn set_vanity_uses(&self, guild_id: &str, vanity_uses: u64) -> bool {
        let mut guilds = self.guilds.write().unwrap_or_else(|e| e.into_inner());
        match guilds.get_mut(guild_id) {
            Some(snapshot) => {
                *snapshot = Arc::new(snapshot.with_vanity_uses(Some(vanity_uses)));
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.guilds.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
