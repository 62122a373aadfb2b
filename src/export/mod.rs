//! Documentation exporters
//!
//! Renders an [`ApiDocumentation`] as Markdown or JSON and writes it to
//! `<output_dir>/<safe_title>_<YYYYmmdd_HHMMSS>.<ext>`.

pub mod json;
pub mod markdown;

use crate::error::{AppError, AppResult};
use crate::models::ApiDocumentation;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Markdown,
    Json,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 2] = [ExportFormat::Markdown, ExportFormat::Json];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Json => "json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Markdown => "Human-readable Markdown with a table of contents",
            Self::Json => "Machine-readable JSON with the full run summary",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "unknown export format '{}' (expected markdown or json)",
                other
            )),
        }
    }
}

/// Render `doc` in `format`, stamped with `generated_at`
pub fn render(
    doc: &ApiDocumentation,
    format: ExportFormat,
    generated_at: DateTime<Local>,
) -> AppResult<String> {
    match format {
        ExportFormat::Markdown => Ok(markdown::render(doc, generated_at)),
        ExportFormat::Json => json::render(doc, generated_at),
    }
}

/// Lowercased title with every non-alphanumeric character replaced by `_`
pub fn safe_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

pub fn output_file_name(title: &str, format: ExportFormat, at: DateTime<Local>) -> String {
    format!(
        "{}_{}.{}",
        safe_title(title),
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Render and write `doc` into `output_dir`, creating it if needed
pub fn export(doc: &ApiDocumentation, format: ExportFormat, output_dir: &Path) -> AppResult<PathBuf> {
    export_at(doc, format, output_dir, Local::now())
}

/// [`export`] with an explicit timestamp
pub fn export_at(
    doc: &ApiDocumentation,
    format: ExportFormat,
    output_dir: &Path,
    at: DateTime<Local>,
) -> AppResult<PathBuf> {
    let content = render(doc, format, at)?;
    let path = output_dir.join(output_file_name(&doc.app.title, format, at));

    let failed = |source| AppError::ExportFailed {
        path: path.display().to_string(),
        source,
    };
    std::fs::create_dir_all(output_dir).map_err(failed)?;
    std::fs::write(&path, content).map_err(failed)?;

    tracing::info!(
        path = %path.display(),
        format = %format,
        routes = doc.routes.len(),
        "Documentation written"
    );
    Ok(path)
}
