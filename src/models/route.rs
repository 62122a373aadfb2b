//! Route records produced by the extractor
//!
//! A [`RouteRecord`] describes one endpoint declaration. The extractor fills in the
//! static shape (method, path, parameters, docstring); the enrichment orchestrator is
//! the only component that writes `description` and `tags`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// HTTP methods recognized as route decorators
///
/// Matching is case-sensitive against the lowercase decorator attribute name
/// (`@app.get`, `@router.post`, ...). `@app.GET` is not a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
    Trace,
}

impl HttpMethod {
    /// All recognized methods, in declaration order
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Trace,
    ];

    /// Resolve a decorator attribute name (`get`, `post`, ...) to a method
    ///
    /// Returns `None` for anything outside the fixed set, including other casings.
    pub fn from_decorator(name: &str) -> Option<Self> {
        match name {
            "get" => Some(Self::Get),
            "post" => Some(Self::Post),
            "put" => Some(Self::Put),
            "delete" => Some(Self::Delete),
            "patch" => Some(Self::Patch),
            "options" => Some(Self::Options),
            "head" => Some(Self::Head),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }

    /// Decorator attribute name for this method
    pub fn decorator_name(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Patch => "patch",
            Self::Options => "options",
            Self::Head => "head",
            Self::Trace => "trace",
        }
    }

    /// Uppercase wire name (`GET`, `POST`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Options => "OPTIONS",
            Self::Head => "HEAD",
            Self::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown HTTP method '{}'", s))
    }
}

/// Where a parameter's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Path,
    Query,
    Body,
    Header,
    Cookie,
    /// Injected by the framework (`Depends(...)`, `Request`, ...)
    Dependency,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Body => "body",
            Self::Header => "header",
            Self::Cookie => "cookie",
            Self::Dependency => "dependency",
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared handler parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    pub kind: ParameterKind,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Source type annotation, as written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

impl ParameterInfo {
    pub fn new(name: impl Into<String>, kind: ParameterKind, required: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            required,
            description: None,
            annotation: None,
        }
    }

    /// Stable textual signature used in cache fingerprints
    pub fn signature(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.name,
            self.kind,
            if self.required { "required" } else { "optional" },
            self.annotation.as_deref().unwrap_or("")
        )
    }
}

/// One endpoint declaration
///
/// Identity within a scan is `(method, path)`, but duplicates are legal (the same
/// pair may be registered on two different routers) and are kept as separate
/// records. Source location fields are informational and do not take part in
/// identity or fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub parameters: Vec<ParameterInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_doc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub deprecated: bool,
    /// Receiver the decorator was bound to (`app`, `users_router`, ...)
    pub router: String,
    /// Name of the decorated handler function
    pub handler: String,
    pub source_file: PathBuf,
    /// 1-based line of the decorator
    pub line: usize,
}

impl RouteRecord {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            parameters: Vec::new(),
            existing_doc: None,
            description: None,
            tags: BTreeSet::new(),
            deprecated: false,
            router: String::new(),
            handler: String::new(),
            source_file: PathBuf::new(),
            line: 0,
        }
    }

    /// `(method, path)` identity key
    pub fn key(&self) -> (HttpMethod, &str) {
        (self.method, self.path.as_str())
    }

    /// Human-readable label, e.g. `GET /users/{id}`
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Names of `{placeholders}` in the path template, in order
    pub fn path_placeholders(&self) -> Vec<&str> {
        path_placeholders(&self.path)
    }

    /// Whether enrichment has filled in a description
    pub fn is_enriched(&self) -> bool {
        self.description.is_some()
    }
}

/// Extract `{name}` placeholders from a path template
///
/// Starlette converters (`{id:int}`, `{file_path:path}`) yield the bare name.
pub fn path_placeholders(path: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        let inner = &after[..end];
        let name = inner.split(':').next().unwrap_or(inner).trim();
        if !name.is_empty() {
            names.push(name);
        }
        rest = &after[end + 1..];
    }
    names
}
