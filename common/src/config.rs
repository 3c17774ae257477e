//! Configuration loaded by the CLI collaborator, never read by the engine
//! itself — `TableDiffer` and `TableSegment` are always built from
//! explicit values so they stay immutable after construction.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BISECTION_FACTOR, DEFAULT_BISECTION_THRESHOLD, DEFAULT_MAX_THREADPOOL_SIZE,
};
use crate::err::{CResult, ReError};

/// Output rendering chosen by the CLI's `--format` flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Yaml,
    None,
}

/// Which serialization the config file itself was written in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LoadStyle {
    Toml,
    Yaml,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifferConfig {
    #[serde(default = "default_bisection_factor")]
    pub bisection_factor: usize,
    #[serde(default = "default_bisection_threshold")]
    pub bisection_threshold: u64,
    #[serde(default = "default_max_threadpool_size")]
    pub max_threadpool_size: usize,

    pub source_uri: String,
    pub target_uri: String,
}

fn default_bisection_factor() -> usize {
    DEFAULT_BISECTION_FACTOR
}
fn default_bisection_threshold() -> u64 {
    DEFAULT_BISECTION_THRESHOLD
}
fn default_max_threadpool_size() -> usize {
    DEFAULT_MAX_THREADPOOL_SIZE
}

impl Default for DifferConfig {
    fn default() -> Self {
        DifferConfig {
            bisection_factor: DEFAULT_BISECTION_FACTOR,
            bisection_threshold: DEFAULT_BISECTION_THRESHOLD,
            max_threadpool_size: DEFAULT_MAX_THREADPOOL_SIZE,
            source_uri: String::new(),
            target_uri: String::new(),
        }
    }
}

/// Loads a `DifferConfig` from a TOML or YAML file, inferring the style
/// from the file extension and falling back to TOML.
pub fn read_config(path: &Path) -> CResult<DifferConfig> {
    let text = fs::read_to_string(path)?;
    let style = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => LoadStyle::Yaml,
        _ => LoadStyle::Toml,
    };
    parse_config(&text, style)
}

pub fn parse_config(text: &str, style: LoadStyle) -> CResult<DifferConfig> {
    match style {
        LoadStyle::Toml => {
            toml::from_str(text).map_err(|e| ReError::ValueError(format!("config parse error: {e}")))
        }
        LoadStyle::Yaml => serde_yaml::from_str(text)
            .map_err(|e| ReError::ValueError(format!("config parse error: {e}"))),
    }
}

/// Renders a serializable value for the CLI's `--format` flag.
pub fn to_string_pretty<T: Serialize + std::fmt::Debug>(format: Format, val: &T) -> String {
    match format {
        Format::Json => serde_json::to_string_pretty(val)
            .unwrap_or_else(|e| format!("<json render error: {e}>")),
        Format::Yaml => {
            serde_yaml::to_string(val).unwrap_or_else(|e| format!("<yaml render error: {e}>"))
        }
        Format::None => format!("{val:?}"),
    }
}
