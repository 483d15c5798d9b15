//! Shared utilities and common types for the invite tracker.
//!
//! This crate provides common functionality used across all other crates:
//! - Bounded retry of fallible async operations
//! - Snowflake id decoding
//! - Common validation logic

pub mod retry;
pub mod snowflake;
pub mod validation;
