//! Domain types shared by the extractor, orchestrator and exporters

pub mod documentation;
pub mod route;

pub use documentation::{ApiDocumentation, AppInfo, FileWarning, RouteFailure, RunSummary};
pub use route::{HttpMethod, ParameterInfo, ParameterKind, RouteRecord, path_placeholders};
