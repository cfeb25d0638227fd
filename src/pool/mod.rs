// Pool lifecycle exports
pub mod commit;
pub mod mapper;
pub mod orchestrator;
pub mod registry;
pub mod scheduler;

pub use commit::commit_assignments;
pub use mapper::{DataQualityWarning, Mapped, WarningKind};
pub use orchestrator::Orchestrator;
pub use registry::{AutomaticTrigger, Pool, PoolDefinition, PoolRegistry};
pub use scheduler::{run_automatic_matching, spawn_periodic};
