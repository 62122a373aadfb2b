//! Application-level documentation handed to exporters

use crate::models::RouteRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_TITLE: &str = "FastAPI Application";
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Metadata from the `FastAPI(title=..., description=..., version=...)` constructor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub version: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            description: None,
            version: DEFAULT_VERSION.to_string(),
        }
    }
}

impl AppInfo {
    /// Whether this differs from the placeholder defaults
    pub fn is_declared(&self) -> bool {
        self.title != DEFAULT_TITLE || self.description.is_some() || self.version != DEFAULT_VERSION
    }
}

/// A file that could not be analyzed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileWarning {
    pub path: PathBuf,
    pub reason: String,
}

/// A route whose enrichment failed after retries (or immediately, if permanent)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteFailure {
    pub route: String,
    pub source_file: PathBuf,
    pub line: usize,
    pub error: String,
    /// `transient` or `permanent`
    pub class: String,
    pub attempts: u32,
}

/// Counters and warnings for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub routes_found: usize,
    pub enriched_from_cache: usize,
    pub enriched_from_provider: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(default)]
    pub file_warnings: Vec<FileWarning>,
    #[serde(default)]
    pub route_failures: Vec<RouteFailure>,
}

impl RunSummary {
    pub fn enriched(&self) -> usize {
        self.enriched_from_cache + self.enriched_from_provider
    }

    pub fn has_warnings(&self) -> bool {
        !self.file_warnings.is_empty() || !self.route_failures.is_empty()
    }
}

/// Complete documentation for one scanned project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDocumentation {
    #[serde(flatten)]
    pub app: AppInfo,
    pub routes: Vec<RouteRecord>,
    pub summary: RunSummary,
}

impl ApiDocumentation {
    pub fn new(app: AppInfo, routes: Vec<RouteRecord>, summary: RunSummary) -> Self {
        Self {
            app,
            routes,
            summary,
        }
    }
}
