pub mod differ;
pub mod scheduler;
pub mod stats;

pub use differ::TableDiffer;
pub use scheduler::Scheduler;
pub use stats::{DiffStats, DiffStatsSnapshot};
