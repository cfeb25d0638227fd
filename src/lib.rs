//! Match Pool - allocation engine pairing helpers with helpees
//!
//! Pools select eligible candidates from storage, the engine computes a
//! maximum-weight one-to-one assignment over compatible pairs, and the commit
//! phase persists the resulting pairings. Runs are triggered on demand or by
//! the automatic gate.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod pool;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{Matcher, MatchResult, MatchStats};
pub use error::MatchingError;
pub use models::{Assignment, Helpee, Helper, MatchingWeights, RunResult};
pub use pool::{run_automatic_matching, Orchestrator, PoolDefinition, PoolRegistry};
pub use services::{CandidateRepository, InMemoryRepository, MatchCreator, PgRepository};
