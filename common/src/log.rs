//! One-shot global tracing setup, in the style of the teacher's
//! `TracingFactory` but guarded with `std::sync::Once` instead of an
//! `unsafe static mut` flag.

use std::sync::Once;

use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

#[derive(Debug, Clone)]
pub struct TracingFactoryOptions {
    pub debug: bool,
    pub level: Level,
}

impl Default for TracingFactoryOptions {
    fn default() -> Self {
        TracingFactoryOptions::new_with_debug(false)
    }
}

impl TracingFactoryOptions {
    pub fn new_with_debug(debug: bool) -> Self {
        TracingFactoryOptions {
            debug,
            level: if debug { Level::DEBUG } else { Level::INFO },
        }
    }
}

pub struct TracingFactory;

impl TracingFactory {
    /// Initializes the global `tracing` subscriber once per process.
    /// Safe to call repeatedly; subsequent calls are no-ops.
    pub fn init_log(debug: bool) {
        Self::init_log_with_options(TracingFactoryOptions::new_with_debug(debug))
    }

    pub fn init_log_with_options(opts: TracingFactoryOptions) {
        INIT.call_once(|| {
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(opts.level.to_string()));

            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_thread_ids(true)
                .compact()
                .try_init();
        });
    }
}
