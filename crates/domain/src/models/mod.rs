//! Domain models for the invite tracker.

pub mod attribution;
pub mod event;
pub mod join_record;
pub mod member;
pub mod options;

pub use attribution::AttributionResult;
pub use event::{PlatformEvent, TrackerEvent};
pub use join_record::{JoinRecord, JoinType, NewJoinRecord};
pub use member::{LiveInvite, Member};
pub use options::{TrackerOptions, DEFAULT_MODEL_NAME};
