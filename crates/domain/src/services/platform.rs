//! Platform collaborator.
//!
//! The tracker reads live invite state through [`InvitePlatform`]. The host
//! process provides the real implementation; [`MockInvitePlatform`] keeps the
//! state in memory for development and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use thiserror::Error;

use crate::models::LiveInvite;

/// Errors returned by the platform.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Platform request failed: {0}")]
    Request(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid platform response: {0}")]
    Decode(String),
}

/// Read access to guild invite state.
#[async_trait::async_trait]
pub trait InvitePlatform: Send + Sync {
    /// Live invites of a guild, in platform order.
    async fn fetch_invites(&self, guild_id: &str) -> Result<Vec<LiveInvite>, PlatformError>;

    /// The guild's vanity code, if it has one.
    async fn vanity_code(&self, guild_id: &str) -> Result<Option<String>, PlatformError>;

    /// Use count of the guild's vanity link. `None` when the platform omits it.
    async fn fetch_vanity_uses(&self, guild_id: &str) -> Result<Option<u64>, PlatformError>;

    /// Ids of every guild visible to the client.
    async fn list_guilds(&self) -> Result<Vec<String>, PlatformError>;
}

#[derive(Debug, Clone, Default)]
struct MockGuild {
    invites: Vec<LiveInvite>,
    vanity_code: Option<String>,
    vanity_uses: Option<u64>,
}

/// In-memory platform for development and testing.
///
/// Guilds are listed in insertion order. Failures can be injected per call
/// kind to exercise the retry paths.
#[derive(Debug, Default)]
pub struct MockInvitePlatform {
    guilds: Mutex<Vec<(String, MockGuild)>>,
    failing_invite_fetches: AtomicU32,
    failing_vanity: AtomicBool,
    failing_vanity_code: AtomicBool,
    invite_fetches: Mutex<HashMap<String, u32>>,
}

impl MockInvitePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_guild<R>(&self, guild_id: &str, f: impl FnOnce(&mut MockGuild) -> R) -> R {
        let mut guilds = self.guilds.lock().unwrap_or_else(|e| e.into_inner());
        let index = match guilds.iter().position(|(id, _)| id == guild_id) {
            Some(index) => index,
            None => {
                guilds.push((guild_id.to_string(), MockGuild::default()));
                guilds.len() - 1
            }
        };
        f(&mut guilds[index].1)
    }

    fn read_guild<R>(&self, guild_id: &str, f: impl FnOnce(&MockGuild) -> R) -> Option<R> {
        let guilds = self.guilds.lock().unwrap_or_else(|e| e.into_inner());
        guilds
            .iter()
            .find(|(id, _)| id == guild_id)
            .map(|(_, guild)| f(guild))
    }

    /// Register a guild with no invites.
    pub fn add_guild(&self, guild_id: &str) {
        self.with_guild(guild_id, |_| ());
    }

    /// Replace a guild's invite list.
    pub fn set_invites(&self, guild_id: &str, invites: Vec<LiveInvite>) {
        self.with_guild(guild_id, |guild| guild.invites = invites);
    }

    /// Set the use count of one invite, appending it if unknown.
    pub fn set_uses(&self, guild_id: &str, code: &str, uses: u64) {
        self.with_guild(guild_id, |guild| {
            match guild.invites.iter_mut().find(|i| i.code == code) {
                Some(invite) => invite.uses = Some(uses),
                None => guild.invites.push(LiveInvite::new(code, uses)),
            }
        });
    }

    /// Give the guild a vanity link.
    pub fn set_vanity(&self, guild_id: &str, code: &str, uses: Option<u64>) {
        self.with_guild(guild_id, |guild| {
            guild.vanity_code = Some(code.to_string());
            guild.vanity_uses = uses;
        });
    }

    pub fn set_vanity_uses(&self, guild_id: &str, uses: u64) {
        self.with_guild(guild_id, |guild| guild.vanity_uses = Some(uses));
    }

    /// Make the next `count` invite fetches fail, whatever the guild.
    pub fn fail_next_invite_fetches(&self, count: u32) {
        self.failing_invite_fetches.store(count, Ordering::SeqCst);
    }

    /// Make every vanity use lookup fail until reset.
    pub fn fail_vanity_fetches(&self, fail: bool) {
        self.failing_vanity.store(fail, Ordering::SeqCst);
    }

    /// Make every vanity code lookup fail until reset.
    pub fn fail_vanity_code_lookups(&self, fail: bool) {
        self.failing_vanity_code.store(fail, Ordering::SeqCst);
    }

    /// Number of invite fetches issued for a guild, failed ones included.
    pub fn invite_fetch_count(&self, guild_id: &str) -> u32 {
        self.invite_fetches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(guild_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl InvitePlatform for MockInvitePlatform {
    async fn fetch_invites(&self, guild_id: &str) -> Result<Vec<LiveInvite>, PlatformError> {
        *self
            .invite_fetches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(guild_id.to_string())
            .or_insert(0) += 1;

        let should_fail = self
            .failing_invite_fetches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(PlatformError::Request(format!(
                "simulated invite fetch failure for guild {}",
                guild_id
            )));
        }

        self.read_guild(guild_id, |guild| guild.invites.clone())
            .ok_or_else(|| PlatformError::NotFound(format!("guild {}", guild_id)))
    }

    async fn vanity_code(&self, guild_id: &str) -> Result<Option<String>, PlatformError> {
        if self.failing_vanity_code.load(Ordering::SeqCst) {
            return Err(PlatformError::Request(format!(
                "simulated guild lookup failure for guild {}",
                guild_id
            )));
        }

        self.read_guild(guild_id, |guild| guild.vanity_code.clone())
            .ok_or_else(|| PlatformError::NotFound(format!("guild {}", guild_id)))
    }

    async fn fetch_vanity_uses(&self, guild_id: &str) -> Result<Option<u64>, PlatformError> {
        if self.failing_vanity.load(Ordering::SeqCst) {
            return Err(PlatformError::Request(format!(
                "simulated vanity fetch failure for guild {}",
                guild_id
            )));
        }

        match self.read_guild(guild_id, |guild| (guild.vanity_code.is_some(), guild.vanity_uses)) {
            Some((true, uses)) => Ok(uses),
            Some((false, _)) => Err(PlatformError::NotFound(format!(
                "guild {} has no vanity url",
                guild_id
            ))),
            None => Err(PlatformError::NotFound(format!("guild {}", guild_id))),
        }
    }

    async fn list_guilds(&self) -> Result<Vec<String>, PlatformError> {
        let guilds = self.guilds.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guilds.iter().map(|(id, _)| id.clone()).collect())
    }
}
