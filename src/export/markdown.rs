//! Markdown exporter
//!
//! Layout: header (title, description, version, timestamp), a table of contents
//! grouped by each route's first tag, one section per route, then run warnings.

use crate::models::{ApiDocumentation, ParameterInfo, RouteRecord, RunSummary};
use chrono::{DateTime, Local};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

/// Group heading for routes without tags
const UNTAGGED_GROUP: &str = "Other";

pub fn render(doc: &ApiDocumentation, generated_at: DateTime<Local>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", doc.app.title);
    if let Some(description) = &doc.app.description {
        let _ = writeln!(out, "{}\n", description.trim());
    }
    let _ = writeln!(out, "**Version:** {}  ", doc.app.version);
    let _ = writeln!(
        out,
        "**Generated:** {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    );

    if doc.routes.is_empty() {
        out.push_str("_No routes found._\n");
    } else {
        let groups = group_routes(&doc.routes);
        let mut anchors = Anchors::default();
        let headings: Vec<(&str, Vec<(&RouteRecord, String)>)> = groups
            .into_iter()
            .map(|(group, routes)| {
                let routes = routes
                    .into_iter()
                    .map(|route| (route, anchors.next(&route.label())))
                    .collect();
                (group, routes)
            })
            .collect();

        out.push_str("## Table of Contents\n\n");
        for (group, routes) in &headings {
            let _ = writeln!(out, "- **{}**", group);
            for (route, anchor) in routes {
                let _ = writeln!(out, "  - [{}](#{})", route.label(), anchor);
            }
        }
        out.push('\n');

        for (group, routes) in &headings {
            let _ = writeln!(out, "## {}\n", group);
            for (route, _) in routes {
                format_route(&mut out, route);
            }
        }
    }

    format_warnings(&mut out, &doc.summary);
    out
}

/// Routes keyed by first tag; untagged routes go last
fn group_routes(routes: &[RouteRecord]) -> Vec<(&str, Vec<&RouteRecord>)> {
    let mut tagged: BTreeMap<&str, Vec<&RouteRecord>> = BTreeMap::new();
    let mut untagged = Vec::new();
    for route in routes {
        match route.tags.iter().next() {
            Some(tag) => tagged.entry(tag.as_str()).or_default().push(route),
            None => untagged.push(route),
        }
    }
    let mut groups: Vec<_> = tagged.into_iter().collect();
    if !untagged.is_empty() {
        groups.push((UNTAGGED_GROUP, untagged));
    }
    groups
}

fn format_route(out: &mut String, route: &RouteRecord) {
    let _ = writeln!(out, "### {}\n", route.label());
    if route.deprecated {
        out.push_str("> **Deprecated**\n\n");
    }

    let description = route
        .description
        .as_deref()
        .or(route.existing_doc.as_deref())
        .map(str::trim)
        .filter(|text| !text.is_empty());
    match description {
        Some(text) => {
            let _ = writeln!(out, "{}\n", text);
        }
        None => out.push_str("_No description available._\n\n"),
    }

    if !route.tags.is_empty() {
        let tags: Vec<String> = route.tags.iter().map(|tag| format!("`{}`", tag)).collect();
        let _ = writeln!(out, "**Tags:** {}\n", tags.join(", "));
    }

    if !route.parameters.is_empty() {
        out.push_str("**Parameters**\n\n");
        out.push_str("| Name | In | Required | Type | Description |\n");
        out.push_str("|------|----|----------|------|-------------|\n");
        for param in &route.parameters {
            format_parameter(out, param);
        }
        out.push('\n');
    }

    if !route.source_file.as_os_str().is_empty() {
        let _ = writeln!(
            out,
            "_Defined in `{}` line {} (`{}`)_\n",
            route.source_file.display(),
            route.line,
            route.handler
        );
    }
}

fn format_parameter(out: &mut String, param: &ParameterInfo) {
    let _ = writeln!(
        out,
        "| `{}` | {} | {} | {} | {} |",
        param.name,
        param.kind,
        if param.required { "yes" } else { "no" },
        param
            .annotation
            .as_deref()
            .map(|a| format!("`{}`", cell(a)))
            .unwrap_or_default(),
        param.description.as_deref().map(cell).unwrap_or_default()
    );
}

fn format_warnings(out: &mut String, summary: &RunSummary) {
    if !summary.has_warnings() {
        return;
    }
    out.push_str("## Run warnings\n\n");
    if !summary.route_failures.is_empty() {
        out.push_str("### Enrichment failures\n\n");
        for failure in &summary.route_failures {
            let _ = writeln!(
                out,
                "- `{}` ({}:{}): {} [{}, {} attempt{}]",
                failure.route,
                failure.source_file.display(),
                failure.line,
                failure.error,
                failure.class,
                failure.attempts,
                if failure.attempts == 1 { "" } else { "s" }
            );
        }
        out.push('\n');
    }
    if !summary.file_warnings.is_empty() {
        out.push_str("### Skipped files\n\n");
        for warning in &summary.file_warnings {
            let _ = writeln!(out, "- `{}`: {}", warning.path.display(), warning.reason);
        }
        out.push('\n');
    }
}

/// Table cell text: pipes escaped, newlines flattened
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// GitHub-style heading anchors with `-1`, `-2` suffixes for repeats
#[derive(Default)]
struct Anchors {
    seen: HashMap<String, usize>,
}

impl Anchors {
    fn next(&mut self, heading: &str) -> String {
        let base: String = heading
            .to_lowercase()
            .chars()
            .filter_map(|c| match c {
                ' ' => Some('-'),
                c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
                _ => None,
            })
            .collect();
        let count = self.seen.entry(base.clone()).or_insert(0);
        let anchor = if *count == 0 {
            base
        } else {
            format!("{}-{}", base, count)
        };
        *count += 1;
        anchor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AppInfo, FileWarning, HttpMethod, ParameterKind, RouteFailure, RunSummary,
    };
    use std::path::PathBuf;

    fn render_routes(routes: Vec<RouteRecord>, summary: RunSummary) -> String {
        let doc = ApiDocumentation::new(
            AppInfo {
                title: "Pets".to_string(),
                description: Some("Pet store API".to_string()),
                version: "0.9.0".to_string(),
            },
            routes,
            summary,
        );
        render(&doc, Local::now())
    }

    #[test]
    fn test_header_and_route_section() {
        let mut route = RouteRecord::new(HttpMethod::Get, "/pets/{pet_id}");
        route.description = Some("Fetch one pet.".to_string());
        route.tags.insert("pets".to_string());
        let mut param = ParameterInfo::new("pet_id", ParameterKind::Path, true);
        param.annotation = Some("int".to_string());
        route.parameters.push(param);

        let md = render_routes(vec![route], RunSummary::default());
        assert!(md.starts_with("# Pets\n\nPet store API\n"));
        assert!(md.contains("**Version:** 0.9.0"));
        assert!(md.contains("- **pets**\n  - [GET /pets/{pet_id}](#get-petspet_id)"));
        assert!(md.contains("## pets\n\n### GET /pets/{pet_id}\n\nFetch one pet.\n"));
        assert!(md.contains("| `pet_id` | path | yes | `int` |  |"));
        assert!(!md.contains("Run warnings"));
    }

    #[test]
    fn test_untagged_routes_fall_back_to_docstring_under_other() {
        let mut documented = RouteRecord::new(HttpMethod::Post, "/items/");
        documented.existing_doc = Some("Create item".to_string());
        let bare = RouteRecord::new(HttpMethod::Delete, "/items/{id}");
        let mut tagged = RouteRecord::new(HttpMethod::Get, "/admin");
        tagged.tags.insert("admin".to_string());

        let md = render_routes(vec![documented, bare, tagged], RunSummary::default());
        let admin = md.find("## admin").unwrap();
        let other = md.find("## Other").unwrap();
        assert!(admin < other);
        assert!(md.contains("### POST /items/\n\nCreate item\n"));
        assert!(md.contains("### DELETE /items/{id}\n\n_No description available._"));
    }

    #[test]
    fn test_duplicate_routes_get_distinct_anchors() {
        let routes = vec![
            RouteRecord::new(HttpMethod::Get, "/health"),
            RouteRecord::new(HttpMethod::Get, "/health"),
        ];
        let md = render_routes(routes, RunSummary::default());
        assert!(md.contains("(#get-health)"));
        assert!(md.contains("(#get-health-1)"));
    }

    #[test]
    fn test_deprecated_marker_and_cell_escaping() {
        let mut route = RouteRecord::new(HttpMethod::Get, "/old");
        route.deprecated = true;
        let mut param = ParameterInfo::new("mode", ParameterKind::Query, false);
        param.description = Some("a | b\nc".to_string());
        route.parameters.push(param);

        let md = render_routes(vec![route], RunSummary::default());
        assert!(md.contains("> **Deprecated**"));
        assert!(md.contains("| `mode` | query | no |  | a \\| b c |"));
    }

    #[test]
    fn test_run_warnings_section() {
        let summary = RunSummary {
            routes_found: 1,
            failed: 1,
            route_failures: vec![RouteFailure {
                route: "GET /x".to_string(),
                source_file: PathBuf::from("app/main.py"),
                line: 12,
                error: "provider unavailable (HTTP 503): busy".to_string(),
                class: "transient".to_string(),
                attempts: 4,
            }],
            file_warnings: vec![FileWarning {
                path: PathBuf::from("app/broken.py"),
                reason: "syntax error: unterminated string on line 3".to_string(),
            }],
            ..RunSummary::default()
        };
        let md = render_routes(vec![RouteRecord::new(HttpMethod::Get, "/x")], summary);
        assert!(md.contains("## Run warnings"));
        assert!(md.contains("- `GET /x` (app/main.py:12): provider unavailable (HTTP 503): busy [transient, 4 attempts]"));
        assert!(md.contains("- `app/broken.py`: syntax error"));
    }

    #[test]
    fn test_empty_documentation() {
        let md = render_routes(Vec::new(), RunSummary::default());
        assert!(md.contains("_No routes found._"));
        assert!(!md.contains("Table of Contents"));
    }
}
