//! Event-driven invite tracker.
//!
//! [`InviteTracker`] consumes [`PlatformEvent`]s, keeps the invite cache in
//! sync, attributes joins, closes join records on leave, and re-emits the
//! outcome as [`TrackerEvent`]s to subscribers.
//!
//! [`InviteTracker::run`] gives every guild its own queue drained by one
//! worker task, so a guild's events are handled one at a time in arrival
//! order while different guilds proceed concurrently. The ready pass and
//! direct callers take the guild's [`GuildLocks`] entry instead, so two joins
//! landing together never diff against the same baseline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use shared::retry::Retry;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::attribution::AttributionResolver;
use super::fake_join::FakeJoinDetector;
use super::guild_lock::GuildLocks;
use super::invite_cache::InviteCache;
use super::ledger::{JoinLedger, JoinRecordStore};
use super::platform::InvitePlatform;
use super::refresher::{log_refresh_pass, CacheRefresher};
use crate::models::{AttributionResult, JoinRecord, Member, PlatformEvent, TrackerEvent, TrackerOptions};

/// Capacity of the observer notification channel.
pub const NOTIFICATION_CAPACITY: usize = 256;

pub struct InviteTracker {
    options: TrackerOptions,
    cache: Arc<InviteCache>,
    refresher: Arc<CacheRefresher>,
    resolver: AttributionResolver,
    ledger: Arc<JoinLedger>,
    locks: GuildLocks,
    notifications: broadcast::Sender<TrackerEvent>,
    ready: AtomicBool,
}

impl InviteTracker {
    /// Build a tracker whose retries sleep on the tokio timer.
    pub fn new(
        platform: Arc<dyn InvitePlatform>,
        store: Arc<dyn JoinRecordStore>,
        options: TrackerOptions,
    ) -> Self {
        let retry = Retry::new(options.retry_policy(), options.verbose());
        Self::with_retry(platform, store, options, retry)
    }

    /// Build a tracker with an explicit retry controller.
    pub fn with_retry(
        platform: Arc<dyn InvitePlatform>,
        store: Arc<dyn JoinRecordStore>,
        options: TrackerOptions,
        retry: Retry,
    ) -> Self {
        let cache = Arc::new(InviteCache::new());
        let refresher = Arc::new(CacheRefresher::new(
            platform.clone(),
            cache.clone(),
            retry.clone(),
        ));
        let ledger = Arc::new(JoinLedger::new(store, options.verbose()));
        let resolver = AttributionResolver::new(
            platform,
            refresher.clone(),
            FakeJoinDetector::from_options(&options),
            ledger.clone(),
            retry,
        );
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Self {
            options,
            cache,
            refresher,
            resolver,
            ledger,
            locks: GuildLocks::new(),
            notifications,
            ready: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &TrackerOptions {
        &self.options
    }

    pub fn cache(&self) -> &InviteCache {
        &self.cache
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Receive `InviteJoin`/`InviteLeave` notifications from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.notifications.subscribe()
    }

    /// Consume events until the channel closes, then wait for in-flight handlers.
    ///
    /// Events for a guild go to that guild's queue in the order received.
    /// Guild-less events (ready) run on their own task.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<PlatformEvent>) {
        let mut in_flight = JoinSet::new();
        let mut queues: HashMap<String, mpsc::UnboundedSender<PlatformEvent>> = HashMap::new();

        while let Some(event) = events.recv().await {
            let guild_id = event.guild_id().map(str::to_string);
            let Some(guild_id) = guild_id else {
                let tracker = Arc::clone(&self);
                in_flight.spawn(async move { tracker.handle(event).await });
                continue;
            };

            let unqueued = match queues.get(&guild_id) {
                Some(queue) => queue.send(event).err().map(|SendError(event)| event),
                None => Some(event),
            };
            // First event for the guild, or its worker died mid-handler.
            if let Some(event) = unqueued {
                let (queue, pending) = mpsc::unbounded_channel();
                in_flight.spawn(Arc::clone(&self).drain_guild(guild_id.clone(), event, pending));
                queues.insert(guild_id, queue);
            }

            // Reap finished handlers so the set does not grow unbounded.
            while let Some(finished) = in_flight.try_join_next() {
                if let Err(e) = finished {
                    error!(error = %e, "Event handler panicked");
                }
            }
        }

        // Closing the queues lets each guild worker finish its backlog and exit.
        drop(queues);
        while let Some(finished) = in_flight.join_next().await {
            if let Err(e) = finished {
                error!(error = %e, "Event handler panicked");
            }
        }
        info!("Event channel closed, tracker stopped");
    }

    async fn drain_guild(
        self: Arc<Self>,
        guild_id: String,
        first: PlatformEvent,
        mut pending: mpsc::UnboundedReceiver<PlatformEvent>,
    ) {
        self.handle(first).await;
        while let Some(event) = pending.recv().await {
            self.handle(event).await;
        }
        debug!(guild_id = %guild_id, "Guild event queue closed");
    }

    /// Handle one platform event to completion.
    pub async fn handle(&self, event: PlatformEvent) {
        debug!(event = event.kind(), guild_id = ?event.guild_id(), "Handling platform event");
        match event {
            PlatformEvent::Ready => {
                self.on_ready().await;
            }
            PlatformEvent::MemberJoined { member } => {
                self.on_member_join(member).await;
            }
            PlatformEvent::MemberLeft { member } => {
                self.on_member_leave(member).await;
            }
            PlatformEvent::InviteCreated { guild_id, code }
            | PlatformEvent::InviteDeleted { guild_id, code } => {
                debug!(guild_id = %guild_id, code = %code, "Invite changed");
                self.refresh_guild(&guild_id).await;
            }
        }
    }

    /// Cache every guild once. Later ready events are ignored.
    ///
    /// Returns the number of guilds refreshed by this call.
    pub async fn on_ready(&self) -> usize {
        if self.ready.swap(true, Ordering::SeqCst) {
            debug!("Ready received again, invite cache already primed");
            return 0;
        }
        info!("Platform connection ready, caching invites");
        self.refresh_all().await
    }

    /// Refresh every visible guild sequentially. A guild whose retries run
    /// out is skipped; the pass continues with the rest.
    pub async fn refresh_all(&self) -> usize {
        let guilds = self.refresher.list_guilds().await;
        let mut refreshed = 0;
        for guild_id in &guilds {
            if self.refresh_guild(guild_id).await {
                refreshed += 1;
            }
        }
        log_refresh_pass(guilds.len(), refreshed);
        refreshed
    }

    /// Refresh one guild under its lock. Returns false if retries ran out.
    pub async fn refresh_guild(&self, guild_id: &str) -> bool {
        let _guard = self.locks.lock(guild_id).await;
        self.refresher.refresh_guild(guild_id).await.is_some()
    }

    /// Attribute a join, persist it and notify observers.
    pub async fn on_member_join(&self, member: Member) -> AttributionResult {
        let attribution = {
            let _guard = self.locks.lock(&member.guild_id).await;
            self.resolver.attribute_join(&member, Utc::now()).await
        };

        info!(
            guild_id = %attribution.guild_id,
            user_id = %attribution.invitee_id,
            join_type = %attribution.join_type,
            invite_code = ?attribution.invite_code,
            inviter_id = ?attribution.inviter_id,
            fake = attribution.fake,
            "Member joined"
        );

        self.notify(TrackerEvent::InviteJoin {
            member,
            attribution: attribution.clone(),
        });
        attribution
    }

    /// Close the member's open join record and notify observers.
    pub async fn on_member_leave(&self, member: Member) -> Option<JoinRecord> {
        let record = {
            let _guard = self.locks.lock(&member.guild_id).await;
            self.ledger
                .record_leave(&member.guild_id, &member.user_id, Utc::now())
                .await
        };

        info!(
            guild_id = %member.guild_id,
            user_id = %member.user_id,
            record_id = ?record.as_ref().map(|r| r.id),
            "Member left"
        );

        self.notify(TrackerEvent::InviteLeave {
            member,
            record: record.clone(),
        });
        record
    }

    fn notify(&self, event: TrackerEvent) {
        // An error only means nobody is subscribed.
        if self.notifications.send(event).is_err() {
            debug!("No observers subscribed to tracker notifications");
        }
    }
}

impl std::fmt::Debug for InviteTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InviteTracker")
            .field("options", &self.options)
            .field("cached_guilds", &self.cache.len())
            .field("ready", &self.is_ready())
            .finish()
    }
}
