// Allocation engine exports
pub mod assignment;
pub mod compatibility;
pub mod matcher;
pub mod scoring;

pub use assignment::{max_weight_assignment, max_weight_assignment_by};
pub use compatibility::{check_pair, is_compatible, PairCheck};
pub use matcher::{MatchResult, MatchStats, Matcher, UnmatchedBreakdown, edge_weight, max_pair_score};
pub use scoring::{calculate_pair_score, BatchContext, ScoreFactors};
