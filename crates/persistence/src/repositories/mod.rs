//! Repository implementations for database operations.

pub mod join_record;

pub use join_record::JoinRecordRepository;
