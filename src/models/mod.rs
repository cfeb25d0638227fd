// Model exports
pub mod domain;
pub mod filters;
pub mod records;
pub mod requests;
pub mod responses;

pub use domain::{Assignment, Candidate, GradeRange, Helpee, Helper, MatchingWeights, Side, Subject};
pub use filters::{HelpeeFilter, HelperFilter};
pub use records::{MatchRecord, RawHelpee, RawHelper, Viable};
pub use requests::RunMatchingRequest;
pub use responses::{
    AutomaticRunReport, CommitFailure, CommitReport, ErrorResponse, HealthResponse, PhaseTiming,
    PoolOutcome, PoolRunReport, PoolSummary, RunResult,
};
