// Service exports
pub mod memory;
pub mod postgres;
pub mod repository;

pub use memory::InMemoryRepository;
pub use postgres::PgRepository;
pub use repository::{CandidateRepository, CommitError, MatchCreator, RepositoryError};
