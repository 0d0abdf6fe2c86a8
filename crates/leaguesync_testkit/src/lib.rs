//! # LeagueSync Testkit
//!
//! Test utilities for LeagueSync.
//!
//! This crate provides:
//! - League entity fixtures (teams, schedule entries)
//! - A stepping clock for deterministic timestamps
//! - An event store harness over an in-memory or temporary file store
//! - A listener that records the batches it receives
//! - Property-based generators for entity batches
//!
//! ## Usage
//!
//! ```rust,ignore
//! use leaguesync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn ingest() {
//!     let harness = TestHarness::memory();
//!     harness.events.append_events(team_events("17", &[(1, 80)]), id_field("teamId")).await.unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use leaguesync_core::id_field;
}

pub use fixtures::*;
pub use generators::*;
