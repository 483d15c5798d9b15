//! Domain services for the invite tracker.
//!
//! Services contain the attribution engine and the collaborator traits it
//! depends on.

pub mod attribution;
pub mod fake_join;
pub mod guild_lock;
pub mod invite_cache;
pub mod ledger;
pub mod platform;
pub mod refresher;
pub mod tracker;

pub use attribution::AttributionResolver;
pub use fake_join::FakeJoinDetector;
pub use guild_lock::GuildLocks;
pub use invite_cache::{InviteCache, InviteSnapshot};
pub use ledger::{InMemoryJoinRecordStore, JoinLedger, JoinRecordStore, LedgerError};
pub use platform::{InvitePlatform, MockInvitePlatform, PlatformError};
pub use refresher::CacheRefresher;
pub use tracker::{InviteTracker, NOTIFICATION_CAPACITY};
