//! Write enriched descriptions and tags back into route decorators
//!
//! Each source file holding an enriched route is parsed again and every route
//! decorator that still lines up with a record (same line, method and path) gets
//! `description="..."` and `tags=[...]` keyword arguments. Existing keywords have
//! their value replaced in place; missing ones are appended after the last
//! argument. All other bytes of the file are kept. Files are replaced atomically.

use crate::error::{AppError, AppResult};
use crate::extractor::ParseError;
use crate::extractor::parser::{
    CallArgs, RouteMatch, descendants, match_route_decorator, named, parse_tree, text,
};
use crate::models::RouteRecord;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tree_sitter::Node;

/// What a write-back pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBackReport {
    pub files_updated: usize,
    pub decorators_updated: usize,
    /// Enriched routes whose decorator was not found in the current file contents
    pub unmatched: usize,
}

/// Result of rewriting one source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub source: String,
    /// Decorators matched to a route
    pub matched: usize,
    /// Matched decorators whose text actually changed
    pub changed: usize,
}

struct Edit {
    start: usize,
    end: usize,
    text: String,
}

/// Update the decorators of every route that has a description
///
/// Routes without a description are ignored. A file that cannot be read or no longer
/// parses is left alone with a warning. Only failing to write a modified file is an
/// error.
pub fn write_back(routes: &[RouteRecord]) -> AppResult<WriteBackReport> {
    let mut by_file: BTreeMap<&Path, Vec<&RouteRecord>> = BTreeMap::new();
    for route in routes.iter().filter(|r| r.description.is_some()) {
        by_file
            .entry(route.source_file.as_path())
            .or_default()
            .push(route);
    }

    let mut report = WriteBackReport::default();
    for (file, file_routes) in by_file {
        let source = match std::fs::read_to_string(file) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "Cannot read file for write-back");
                report.unmatched += file_routes.len();
                continue;
            }
        };

        let rewrite = match rewrite_source(&source, &file_routes) {
            Ok(rewrite) => rewrite,
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "File no longer parses, not writing back");
                report.unmatched += file_routes.len();
                continue;
            }
        };
        report.unmatched += file_routes.len().saturating_sub(rewrite.matched);

        if rewrite.changed == 0 {
            tracing::debug!(file = %file.display(), "Decorators already up to date");
            continue;
        }
        replace_file(file, &rewrite.source)?;
        report.files_updated += 1;
        report.decorators_updated += rewrite.changed;
        tracing::info!(
            file = %file.display(),
            decorators = rewrite.changed,
            "Wrote descriptions back into source"
        );
    }

    Ok(report)
}

/// Apply the descriptions and tags of `routes` to the decorators in `source`
pub fn rewrite_source(source: &str, routes: &[&RouteRecord]) -> Result<Rewrite, ParseError> {
    let tree = parse_tree(source)?;
    let mut edits = Vec::new();
    let mut matched = 0;
    let mut changed = 0;

    for decorator in descendants(tree.root_node(), "decorator") {
        let RouteMatch::Route(found) = match_route_decorator(decorator, source) else {
            continue;
        };
        let Some(route) = routes.iter().find(|r| {
            r.line == found.line && r.method == found.method && r.path == found.path
        }) else {
            continue;
        };
        let Some(description) = route.description.as_deref() else {
            continue;
        };

        matched += 1;
        let decorator_edits = keyword_edits(found.arguments, source, description, route);
        if !decorator_edits.is_empty() {
            changed += 1;
            edits.extend(decorator_edits);
        }
    }

    // Back to front so earlier offsets stay valid
    edits.sort_by(|a, b| b.start.cmp(&a.start));
    let mut rewritten = source.to_string();
    for edit in edits {
        rewritten.replace_range(edit.start..edit.end, &edit.text);
    }

    Ok(Rewrite {
        source: rewritten,
        matched,
        changed,
    })
}

fn keyword_edits(
    arguments: Node<'_>,
    source: &str,
    description: &str,
    route: &RouteRecord,
) -> Vec<Edit> {
    let args = CallArgs::of(arguments, source);
    let mut wanted = vec![("description", python_string(description))];
    if !route.tags.is_empty() {
        let tags: Vec<String> = route.tags.iter().map(|t| python_string(t)).collect();
        wanted.push(("tags", format!("[{}]", tags.join(", "))));
    }

    let mut edits = Vec::new();
    let mut appended = Vec::new();
    for (name, value) in wanted {
        match args.keyword(name) {
            Some(existing) if text(existing, source) == value => {}
            Some(existing) => edits.push(Edit {
                start: existing.start_byte(),
                end: existing.end_byte(),
                text: value,
            }),
            None => appended.push(format!("{}={}", name, value)),
        }
    }

    if !appended.is_empty() {
        if let Some(last) = named(arguments).last() {
            let separator = if last.start_position().row == arguments.start_position().row {
                ", ".to_string()
            } else {
                format!(",\n{}", line_indent(source, last.start_byte()))
            };
            edits.push(Edit {
                start: last.end_byte(),
                end: last.end_byte(),
                text: format!("{}{}", separator, appended.join(separator.as_str())),
            });
        }
    }
    edits
}

/// Leading whitespace of the line containing byte `offset`
fn line_indent(source: &str, offset: usize) -> &str {
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line = &source[line_start..];
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}

/// Double-quoted Python string literal for `value`
fn python_string(value: &str) -> String {
    let mut literal = String::with_capacity(value.len() + 2);
    literal.push('"');
    for c in value.chars() {
        match c {
            '\\' => literal.push_str("\\\\"),
            '"' => literal.push_str("\\\""),
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            '\t' => literal.push_str("\\t"),
            c if c.is_control() => literal.push_str(&format!("\\u{:04x}", c as u32)),
            c => literal.push(c),
        }
    }
    literal.push('"');
    literal
}

/// Temp file in the same directory, then rename over the original
fn replace_file(path: &Path, contents: &str) -> AppResult<()> {
    let io_err = |source: std::io::Error| AppError::WriteBackFailed {
        path: path.display().to_string(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
    tmp.write_all(contents.as_bytes()).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    let permissions = std::fs::metadata(path).map_err(io_err)?.permissions();
    tmp.as_file().set_permissions(permissions).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
