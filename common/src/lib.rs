pub mod checksum;
pub mod config;
pub mod constants;
pub mod err;
pub mod log;
pub mod types;

pub use err::{CResult, ReError};
