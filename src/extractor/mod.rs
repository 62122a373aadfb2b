//! Static route extraction from FastAPI-style Python sources
//!
//! [`RouteExtractor`] owns an ordered file list and hands out a fresh lazy
//! [`Routes`] iterator per call. Files are read and parsed one at a time as the
//! iterator advances; a file that cannot be read or parsed becomes a
//! [`FileWarning`] and the scan moves on.

pub mod parser;
pub mod source;

use crate::models::{AppInfo, FileWarning, RouteRecord};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use parser::{ParsedModule, clean_docstring, parse_module};
pub use source::{SKIPPED_DIRECTORIES, discover};

/// Reasons a file cannot be analyzed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The tree-sitter grammar produced an `ERROR` or `MISSING` node
    #[error("line {line}, column {column}: {detail}")]
    Syntax {
        line: usize,
        column: usize,
        detail: String,
    },

    #[error("Python grammar could not be loaded: {0}")]
    Grammar(String),

    #[error("parser gave up before producing a syntax tree")]
    Aborted,
}

impl ParseError {
    /// 1-based line of the first syntax error, if the failure has a location
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Syntax { line, .. } => Some(*line),
            Self::Grammar(_) | Self::Aborted => None,
        }
    }
}

/// Extracts routes from an ordered list of source files
#[derive(Debug, Clone, Default)]
pub struct RouteExtractor {
    files: Vec<PathBuf>,
}

impl RouteExtractor {
    /// Extract from exactly these files, in this order
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }

    /// Discover the Python files under `root` (or `root` itself if it is a file)
    pub fn from_root(root: &Path) -> std::io::Result<Self> {
        Ok(Self::new(discover(root)?))
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Start a new pass over the files
    ///
    /// Each call starts from the first file; no state is shared between passes.
    pub fn routes(&self) -> Routes<'_> {
        Routes {
            files: self.files.iter(),
            pending: Vec::new().into_iter(),
            warnings: Vec::new(),
            app: None,
            files_scanned: 0,
            dynamic_skipped: 0,
        }
    }
}

/// Lazy route sequence, in file order then declaration order
#[derive(Debug)]
pub struct Routes<'a> {
    files: std::slice::Iter<'a, PathBuf>,
    pending: std::vec::IntoIter<RouteRecord>,
    warnings: Vec<FileWarning>,
    app: Option<AppInfo>,
    files_scanned: usize,
    dynamic_skipped: usize,
}

impl Routes<'_> {
    /// Warnings for files seen so far
    pub fn warnings(&self) -> &[FileWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<FileWarning> {
        self.warnings
    }

    /// First `FastAPI(...)` metadata seen so far
    pub fn app_info(&self) -> Option<&AppInfo> {
        self.app.as_ref()
    }

    pub fn files_scanned(&self) -> usize {
        self.files_scanned
    }

    /// Route-shaped decorators skipped because their path was computed at runtime
    pub fn dynamic_skipped(&self) -> usize {
        self.dynamic_skipped
    }

    fn warn(&mut self, path: &Path, reason: String) {
        tracing::warn!(file = %path.display(), reason = %reason, "Skipping source file");
        self.warnings.push(FileWarning {
            path: path.to_path_buf(),
            reason,
        });
    }

    fn scan(&mut self, path: &Path) {
        self.files_scanned += 1;

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.warn(path, format!("unreadable: {}", e));
                return;
            }
        };

        let source = match String::from_utf8(bytes) {
            Ok(source) => source,
            Err(e) => {
                let lossy = String::from_utf8_lossy(e.as_bytes()).into_owned();
                let reason = format!(
                    "invalid UTF-8 at byte {}, decoded lossily",
                    e.utf8_error().valid_up_to()
                );
                tracing::warn!(file = %path.display(), reason = %reason, "Decoding source file lossily");
                self.warnings.push(FileWarning {
                    path: path.to_path_buf(),
                    reason,
                });
                lossy
            }
        };

        match parse_module(&source, path) {
            Ok(module) => {
                tracing::debug!(
                    file = %path.display(),
                    routes = module.routes.len(),
                    "Parsed source file"
                );
                if self.app.is_none() {
                    self.app = module.app;
                }
                self.dynamic_skipped += module.skipped_dynamic;
                self.pending = module.routes.into_iter();
            }
            Err(e) => self.warn(path, format!("syntax error: {}", e)),
        }
    }
}

impl Iterator for Routes<'_> {
    type Item = RouteRecord;

    fn next(&mut self) -> Option<RouteRecord> {
        loop {
            if let Some(route) = self.pending.next() {
                return Some(route);
            }
            let path = self.files.next()?;
            self.scan(path);
        }
    }
}
