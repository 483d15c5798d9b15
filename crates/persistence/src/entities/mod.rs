//! Database entity definitions.

pub mod join_record;

pub use join_record::JoinRecordEntity;
