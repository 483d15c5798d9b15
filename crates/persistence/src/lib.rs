//! Persistence layer for the invite tracker.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - The PostgreSQL join record store

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
