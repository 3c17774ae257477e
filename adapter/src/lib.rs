pub mod contract;
pub mod pool;

pub use contract::{DatabaseAdapter, QueryResult, ResultShape};
pub use pool::PerThreadConnectionPool;
