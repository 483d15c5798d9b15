//! Domain layer for the invite tracker.
//!
//! This crate contains:
//! - Domain models (JoinRecord, AttributionResult, Member, TrackerOptions)
//! - The attribution engine services (invite cache, refresher, resolver,
//!   fake-join heuristic, join/leave ledger, event dispatch)
//! - The collaborator traits implemented by the platform and storage layers

pub mod models;
pub mod services;
