//! Tablesetter - table matching service for social events
//!
//! Partitions the confirmed attendees of an event into compatibility
//! optimized tables and keeps an append-only ledger of every attempt.

pub mod auth;
pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{Matcher, derive_trait_vector};
pub use error::{MatchingError, MatchingResult};
pub use models::{EventRoster, GroupPolicy, MatchingAttempt, MatchingGroup, Partition, RosterEntry};
pub use services::MatchingService;
