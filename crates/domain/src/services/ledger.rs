//! Join/leave ledger.
//!
//! [`JoinRecordStore`] is the storage seam; the persistence crate implements
//! it over PostgreSQL and [`InMemoryJoinRecordStore`] keeps records in memory.
//! [`JoinLedger`] wraps a store with the tracker's failure policy: storage
//! errors are logged and swallowed so attribution never fails on a storage
//! hiccup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::models::{AttributionResult, JoinRecord, NewJoinRecord};

/// Errors returned by a join record store.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Join record not found: {0}")]
    NotFound(Uuid),
}

/// Storage for join records.
#[async_trait::async_trait]
pub trait JoinRecordStore: Send + Sync {
    /// Insert a new open record.
    async fn insert(&self, record: NewJoinRecord) -> Result<JoinRecord, LedgerError>;

    /// The open record of a member in a guild, newest `joined_at` first.
    async fn find_open(
        &self,
        guild_id: &str,
        invitee_id: &str,
    ) -> Result<Option<JoinRecord>, LedgerError>;

    /// Set `left_at` on a record and return the updated record.
    async fn close(&self, id: Uuid, left_at: DateTime<Utc>) -> Result<JoinRecord, LedgerError>;

    /// Most recent `left_at` among the member's closed records in a guild.
    async fn latest_left_at(
        &self,
        guild_id: &str,
        invitee_id: &str,
    ) -> Result<Option<DateTime<Utc>>, LedgerError>;
}

/// In-memory join record store for development and testing.
#[derive(Debug, Default)]
pub struct InMemoryJoinRecordStore {
    records: Mutex<Vec<JoinRecord>>,
    fail_writes: AtomicBool,
}

impl InMemoryJoinRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record as-is, bypassing the ledger.
    pub fn seed(&self, record: JoinRecord) {
        self.lock().push(record);
    }

    /// Snapshot of all records in insertion order.
    pub fn records(&self) -> Vec<JoinRecord> {
        self.lock().clone()
    }

    /// Make inserts and updates fail until reset.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<JoinRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self) -> Result<(), LedgerError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(LedgerError::Storage("simulated write failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl JoinRecordStore for InMemoryJoinRecordStore {
    async fn insert(&self, record: NewJoinRecord) -> Result<JoinRecord, LedgerError> {
        self.check_writable()?;
        let record = record.into_record(Uuid::new_v4());
        self.lock().push(record.clone());
        Ok(record)
    }

    async fn find_open(
        &self,
        guild_id: &str,
        invitee_id: &str,
    ) -> Result<Option<JoinRecord>, LedgerError> {
        Ok(self
            .lock()
            .iter()
            .filter(|r| r.guild_id == guild_id && r.invitee_id == invitee_id && r.is_open())
            .max_by_key(|r| r.joined_at)
            .cloned())
    }

    async fn close(&self, id: Uuid, left_at: DateTime<Utc>) -> Result<JoinRecord, LedgerError> {
        self.check_writable()?;
        let mut records = self.lock();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(LedgerError::NotFound(id))?;
        record.left_at = Some(left_at);
        Ok(record.clone())
    }

    async fn latest_left_at(
        &self,
        guild_id: &str,
        invitee_id: &str,
    ) -> Result<Option<DateTime<Utc>>, LedgerError> {
        Ok(self
            .lock()
            .iter()
            .filter(|r| r.guild_id == guild_id && r.invitee_id == invitee_id)
            .filter_map(|r| r.left_at)
            .max())
    }
}

/// Join/leave history with the tracker's failure policy applied.
#[derive(Clone)]
pub struct JoinLedger {
    store: Arc<dyn JoinRecordStore>,
    verbose: bool,
}

impl JoinLedger {
    pub fn new(store: Arc<dyn JoinRecordStore>, verbose: bool) -> Self {
        Self { store, verbose }
    }

    /// Persist an open record for an attributed join.
    ///
    /// A record still open for the same member (a missed leave) is closed at
    /// the new join time first, so a member never has two open records in a
    /// guild. Returns `None` when storage failed.
    pub async fn record_join(&self, attribution: &AttributionResult) -> Option<JoinRecord> {
        let guild_id = &attribution.guild_id;
        let invitee_id = &attribution.invitee_id;

        match self.store.find_open(guild_id, invitee_id).await {
            Ok(Some(dangling)) => {
                info!(
                    guild_id = %guild_id,
                    invitee_id = %invitee_id,
                    record_id = %dangling.id,
                    "Closing join record left open by a missed leave"
                );
                if let Err(e) = self.store.close(dangling.id, attribution.joined_at).await {
                    self.log_failure("close dangling join record", guild_id, invitee_id, &e);
                }
            }
            Ok(None) => {}
            Err(e) => self.log_failure("look up open join record", guild_id, invitee_id, &e),
        }

        match self.store.insert(NewJoinRecord::from(attribution)).await {
            Ok(record) => Some(record),
            Err(e) => {
                self.log_failure("save join record", guild_id, invitee_id, &e);
                None
            }
        }
    }

    /// Close the member's open record at `left_at`.
    ///
    /// Returns the closed record, or `None` if the member had no open record
    /// (joined before tracking started) or storage failed.
    pub async fn record_leave(
        &self,
        guild_id: &str,
        invitee_id: &str,
        left_at: DateTime<Utc>,
    ) -> Option<JoinRecord> {
        let open = match self.store.find_open(guild_id, invitee_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(guild_id = %guild_id, invitee_id = %invitee_id, "No open join record on leave");
                return None;
            }
            Err(e) => {
                self.log_failure("look up open join record", guild_id, invitee_id, &e);
                return None;
            }
        };

        match self.store.close(open.id, left_at).await {
            Ok(record) => Some(record),
            Err(e) => {
                self.log_failure("update left_at", guild_id, invitee_id, &e);
                None
            }
        }
    }

    /// Most recent leave time of the member in the guild, for the rejoin signal.
    pub async fn find_fake_signal(
        &self,
        guild_id: &str,
        invitee_id: &str,
    ) -> Option<DateTime<Utc>> {
        match self.store.latest_left_at(guild_id, invitee_id).await {
            Ok(left_at) => left_at,
            Err(e) => {
                self.log_failure("look up last leave", guild_id, invitee_id, &e);
                None
            }
        }
    }

    fn log_failure(&self, action: &str, guild_id: &str, invitee_id: &str, err: &LedgerError) {
        if self.verbose {
            error!(guild_id = %guild_id, invitee_id = %invitee_id, error = %err, "Failed to {}", action);
        } else {
            debug!(guild_id = %guild_id, invitee_id = %invitee_id, error = %err, "Failed to {}", action);
        }
    }
}
