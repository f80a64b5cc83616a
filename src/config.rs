//! Analyzer configuration
//!
//! Process-wide read-only settings: which named type is the shared-state
//! query builder, which of its methods return an independent builder, and
//! which execute queries. The defaults target the ORM API surface that
//! motivates the analyzer; embedders can load their own tables from TOML.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::Result;

/// Configuration for the builder-reuse analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Package path of the builder type; matched exactly
    #[serde(default = "default_handle_package")]
    pub handle_package: String,

    /// Name of the builder type within the package
    #[serde(default = "default_handle_type")]
    pub handle_type: String,

    /// Methods whose result is a fresh, independent builder
    #[serde(default = "default_immutable_methods")]
    pub immutable_methods: BTreeSet<String>,

    /// Methods that execute the query; treated as ordinary chain methods
    #[serde(default = "default_finisher_methods")]
    pub finisher_methods: BTreeSet<String>,

    /// Constructor named in the reuse advisory
    #[serde(default = "default_session_constructor")]
    pub session_constructor: String,
}

fn default_handle_package() -> String {
    "gorm.io/gorm".to_string()
}

fn default_handle_type() -> String {
    "DB".to_string()
}

fn default_immutable_methods() -> BTreeSet<String> {
    ["Session", "WithContext", "Debug", "Begin"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_finisher_methods() -> BTreeSet<String> {
    [
        "Find", "First", "Last", "Take", "Count", "Scan", "Pluck", "Row", "Rows", "Create",
        "Save", "Update", "Updates", "UpdateColumn", "UpdateColumns", "Delete", "Exec",
        "FirstOrInit", "FirstOrCreate",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_session_constructor() -> String {
    "Session".to_string()
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            handle_package: default_handle_package(),
            handle_type: default_handle_type(),
            immutable_methods: default_immutable_methods(),
            finisher_methods: default_finisher_methods(),
            session_constructor: default_session_constructor(),
        }
    }
}

impl AnalyzerConfig {
    /// Parse configuration from TOML; absent keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

static DEFAULT_CONFIG: Lazy<AnalyzerConfig> = Lazy::new(AnalyzerConfig::default);

/// The process-wide default configuration
pub fn default_config() -> &'static AnalyzerConfig {
    &DEFAULT_CONFIG
}
