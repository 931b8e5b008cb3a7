// Service exports
pub mod appwrite;
pub mod cache;
pub mod ledger;
pub mod matching;
pub mod memory;
pub mod postgres;
pub mod roster;

pub use appwrite::{AppwriteClient, AppwriteCollections};
pub use cache::{CacheError, CacheKey, CacheManager};
pub use ledger::{AttemptLedger, LedgerError};
pub use matching::MatchingService;
pub use memory::InMemoryLedger;
pub use postgres::{EventCommitLock, LockRetryPolicy, PostgresLedger};
pub use roster::{RosterError, RosterProvider, StaticRosterProvider};
