//! Structural matcher for route declarations
//!
//! Sources are parsed into a concrete syntax tree with the tree-sitter Python
//! grammar. Every `decorated_definition` whose definition is a function is a
//! candidate; each decorator of the shape `@<receiver>.<verb>(<path literal>, ...)`
//! with `verb` in the fixed method set becomes one [`RouteRecord`]. Anything whose
//! path is not a plain string literal (f-strings, names, calls, concatenation with
//! expressions) is skipped.

use super::ParseError;
use crate::models::{AppInfo, HttpMethod, ParameterInfo, ParameterKind, RouteRecord};
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

/// Routes and app metadata found in one module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedModule {
    pub app: Option<AppInfo>,
    pub routes: Vec<RouteRecord>,
    /// Route-shaped decorators skipped because the path was not static
    pub skipped_dynamic: usize,
}

/// Parse one Python module
pub fn parse_module(source: &str, file: &Path) -> Result<ParsedModule, ParseError> {
    let tree = parse_tree(source)?;
    let root = tree.root_node();

    let mut module = ParsedModule {
        app: find_app_info(root, source),
        ..ParsedModule::default()
    };

    for decorated in descendants(root, "decorated_definition") {
        let Some(definition) = decorated.child_by_field_name("definition") else {
            continue;
        };
        if definition.kind() != "function_definition" {
            continue;
        }

        let function = FunctionHeader::from_node(definition, source);
        let docstring = find_docstring(definition, source);
        for decorator in named(decorated).into_iter().filter(|n| n.kind() == "decorator") {
            match match_route_decorator(decorator, source) {
                RouteMatch::Route(route) => {
                    module.routes.push(build_record(
                        route,
                        &function,
                        docstring.as_deref(),
                        file,
                        source,
                    ));
                }
                RouteMatch::Dynamic { line, receiver, verb } => {
                    module.skipped_dynamic += 1;
                    tracing::debug!(
                        file = %file.display(),
                        line = line,
                        receiver = %receiver,
                        verb = %verb,
                        "Skipping route with non-literal path"
                    );
                }
                RouteMatch::NotRoute => {}
            }
        }
    }

    Ok(module)
}

/// Parse `source` and reject it if the tree contains any error or missing node
pub(crate) fn parse_tree(source: &str) -> Result<Tree, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| ParseError::Grammar(e.to_string()))?;
    let tree = parser.parse(source, None).ok_or(ParseError::Aborted)?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(locate_syntax_error(root));
    }
    Ok(tree)
}

/// First `ERROR` or `MISSING` node in document order
fn locate_syntax_error(root: Node<'_>) -> ParseError {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let position = node.start_position();
            let detail = if node.is_missing() {
                format!("missing '{}'", node.kind())
            } else {
                "invalid syntax".to_string()
            };
            return ParseError::Syntax {
                line: position.row + 1,
                column: position.column + 1,
                detail,
            };
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node
            .children(&mut cursor)
            .filter(|child| child.has_error())
            .collect();
        stack.extend(children.into_iter().rev());
    }

    let position = root.start_position();
    ParseError::Syntax {
        line: position.row + 1,
        column: position.column + 1,
        detail: "invalid syntax".to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tree helpers
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or_default()
}

/// Named children, comments excluded
pub(crate) fn named<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|child| !child.is_extra())
        .collect();
    children
}

fn first_named<'t>(node: Node<'t>) -> Option<Node<'t>> {
    named(node).into_iter().next()
}

/// Every node of `kind` under `root`, in document order
pub(crate) fn descendants<'t>(root: Node<'t>, kind: &str) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == kind {
            found.push(node);
        }
        stack.extend(named(node).into_iter().rev());
    }
    found
}

/// `a.b.c` as `["a", "b", "c"]`; `None` for anything that is not a dotted name
fn dotted_names<'s>(node: Node<'_>, source: &'s str) -> Option<Vec<&'s str>> {
    match node.kind() {
        "identifier" => Some(vec![text(node, source)]),
        "attribute" => {
            let mut names = dotted_names(node.child_by_field_name("object")?, source)?;
            names.push(text(node.child_by_field_name("attribute")?, source));
            Some(names)
        }
        _ => None,
    }
}

/// Last segment of the called name: `Query` for both `Query(...)` and `fastapi.Query(...)`
fn callee_name<'s>(call: Node<'_>, source: &'s str) -> Option<&'s str> {
    let function = call.child_by_field_name("function")?;
    dotted_names(function, source)?.pop()
}

// ─────────────────────────────────────────────────────────────────────────────
// Call arguments
// ─────────────────────────────────────────────────────────────────────────────

/// Arguments of one call, split into positional and keyword
pub(crate) struct CallArgs<'t> {
    positional: Vec<Node<'t>>,
    keywords: Vec<(String, Node<'t>)>,
}

impl<'t> CallArgs<'t> {
    pub(crate) fn of(arguments: Node<'t>, source: &str) -> Self {
        let mut args = Self {
            positional: Vec::new(),
            keywords: Vec::new(),
        };
        // `f(x for x in y)` carries a bare generator instead of an argument list
        if arguments.kind() != "argument_list" {
            args.positional.push(arguments);
            return args;
        }
        for child in named(arguments) {
            match child.kind() {
                "keyword_argument" => {
                    if let (Some(name), Some(value)) = (
                        child.child_by_field_name("name"),
                        child.child_by_field_name("value"),
                    ) {
                        args.keywords.push((text(name, source).to_string(), value));
                    }
                }
                "dictionary_splat" => {}
                _ => args.positional.push(child),
            }
        }
        args
    }

    pub(crate) fn keyword(&self, name: &str) -> Option<Node<'t>> {
        self.keywords
            .iter()
            .find_map(|(key, value)| (key == name).then_some(*value))
    }

    fn first_positional(&self) -> Option<Node<'t>> {
        self.positional.first().copied()
    }
}

fn is_ellipsis(node: Node<'_>) -> bool {
    node.kind() == "ellipsis"
}

/// Value of an expression made only of adjacent plain string literals
fn literal_string(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "string" => string_value(node, source),
        "concatenated_string" => {
            let mut value = String::new();
            for part in named(node) {
                value.push_str(&string_value(part, source)?);
            }
            Some(value)
        }
        "parenthesized_expression" => literal_string(first_named(node)?, source),
        _ => None,
    }
}

fn string_value(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();

    let start = children.iter().find(|c| c.kind() == "string_start")?;
    let end = children.iter().rev().find(|c| c.kind() == "string_end")?;
    if children.iter().any(|c| c.kind() == "interpolation") {
        return None;
    }

    let opener = text(*start, source);
    let prefix = opener.trim_end_matches(['"', '\'']).to_ascii_lowercase();
    if prefix.contains(['f', 'b', 't']) {
        return None;
    }

    let body = source.get(start.end_byte()..end.start_byte())?;
    if prefix.contains('r') {
        Some(body.to_string())
    } else {
        Some(decode_escapes(body))
    }
}

fn take_digits(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    radix: u32,
    max: usize,
) -> String {
    let mut digits = String::new();
    while digits.len() < max {
        match chars.peek() {
            Some(c) if c.is_digit(radix) => {
                digits.push(*c);
                chars.next();
            }
            _ => break,
        }
    }
    digits
}

/// Resolve backslash escapes of a non-raw string literal body
///
/// Sequences Python would reject (short `\x`, unknown `\N{...}` names) and
/// unrecognized escapes are kept verbatim.
fn decode_escapes(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\n' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{0b}'),
            '0'..='7' => {
                let mut digits = next.to_string();
                digits.push_str(&take_digits(&mut chars, 8, 2));
                match u32::from_str_radix(&digits, 8).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push('\\');
                        out.push_str(&digits);
                    }
                }
            }
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits = take_digits(&mut chars, 16, width);
                let decoded = (digits.len() == width)
                    .then(|| u32::from_str_radix(&digits, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push('\\');
                        out.push(next);
                        out.push_str(&digits);
                    }
                }
            }
            'N' if chars.peek() == Some(&'{') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for ch in chars.by_ref() {
                    if ch == '}' {
                        closed = true;
                        break;
                    }
                    name.push(ch);
                }
                match unicode_names2::character(&name).filter(|_| closed) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push_str("\\N{");
                        out.push_str(&name);
                        if closed {
                            out.push('}');
                        }
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Decorators
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) struct RouteDecorator<'t> {
    pub(crate) method: HttpMethod,
    pub(crate) path: String,
    pub(crate) receiver: String,
    /// 1-based line of the `@`
    pub(crate) line: usize,
    pub(crate) deprecated: bool,
    /// The decorator call's argument list
    pub(crate) arguments: Node<'t>,
}

pub(crate) enum RouteMatch<'t> {
    Route(RouteDecorator<'t>),
    Dynamic {
        line: usize,
        receiver: String,
        verb: String,
    },
    NotRoute,
}

pub(crate) fn match_route_decorator<'t>(decorator: Node<'t>, source: &str) -> RouteMatch<'t> {
    let Some(call) = first_named(decorator).filter(|n| n.kind() == "call") else {
        return RouteMatch::NotRoute;
    };
    let Some(function) = call.child_by_field_name("function") else {
        return RouteMatch::NotRoute;
    };
    if function.kind() != "attribute" {
        return RouteMatch::NotRoute;
    }
    let Some(mut names) = dotted_names(function, source) else {
        return RouteMatch::NotRoute;
    };
    let Some(verb) = names.pop() else {
        return RouteMatch::NotRoute;
    };
    let Some(method) = HttpMethod::from_decorator(verb) else {
        return RouteMatch::NotRoute;
    };
    let receiver = names.join(".");
    let line = decorator.start_position().row + 1;

    let Some(arguments) = call.child_by_field_name("arguments") else {
        return RouteMatch::NotRoute;
    };
    let args = CallArgs::of(arguments, source);
    let path_node = args.keyword("path").or_else(|| args.first_positional());
    let Some(path) = path_node.and_then(|node| literal_string(node, source)) else {
        return RouteMatch::Dynamic {
            line,
            receiver,
            verb: verb.to_string(),
        };
    };

    let deprecated = args
        .keyword("deprecated")
        .is_some_and(|value| value.kind() == "true");

    RouteMatch::Route(RouteDecorator {
        method,
        path,
        receiver,
        line,
        deprecated,
        arguments,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Function headers
// ─────────────────────────────────────────────────────────────────────────────

struct FunctionHeader<'t> {
    name: String,
    params: Vec<RawParam<'t>>,
}

struct RawParam<'t> {
    name: String,
    annotation: Option<Node<'t>>,
    default: Option<Node<'t>>,
}

impl<'t> FunctionHeader<'t> {
    fn from_node(definition: Node<'t>, source: &str) -> Self {
        let name = definition
            .child_by_field_name("name")
            .map(|n| text(n, source).to_string())
            .unwrap_or_default();
        let params: Vec<RawParam<'t>> = definition
            .child_by_field_name("parameters")
            .map(|list| {
                named(list)
                    .into_iter()
                    .filter_map(|param| parse_param(param, source))
                    .collect()
            })
            .unwrap_or_default();
        Self { name, params }
    }
}

fn parse_param<'t>(param: Node<'t>, source: &str) -> Option<RawParam<'t>> {
    let (name, annotation, default) = match param.kind() {
        "identifier" => (param, None, None),
        // `*args: int` and `**kw: str` are typed parameters around a splat pattern
        "typed_parameter" => {
            let name = first_named(param).filter(|n| n.kind() == "identifier")?;
            (name, param.child_by_field_name("type"), None)
        }
        "default_parameter" => (
            param.child_by_field_name("name")?,
            None,
            param.child_by_field_name("value"),
        ),
        "typed_default_parameter" => (
            param.child_by_field_name("name")?,
            param.child_by_field_name("type"),
            param.child_by_field_name("value"),
        ),
        _ => return None,
    };

    let name = text(name, source);
    if name == "self" || name == "cls" {
        return None;
    }
    Some(RawParam {
        name: name.to_string(),
        annotation,
        default,
    })
}

/// The docstring is the function body's first statement when it is a string literal
fn find_docstring(definition: Node<'_>, source: &str) -> Option<String> {
    let body = definition.child_by_field_name("body")?;
    let statement = first_named(body).filter(|n| n.kind() == "expression_statement")?;
    let expressions = named(statement);
    let [expression] = expressions.as_slice() else {
        return None;
    };
    let value = literal_string(*expression, source)?;
    let cleaned = clean_docstring(&value);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Normalize docstring indentation the way `inspect.cleandoc` does
pub fn clean_docstring(raw: &str) -> String {
    let expanded = raw.replace('\t', "        ");
    let lines: Vec<&str> = expanded.lines().collect();
    let Some((first, rest)) = lines.split_first() else {
        return String::new();
    };

    let margin = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<String> = Vec::with_capacity(lines.len());
    cleaned.push(first.trim_start().to_string());
    for line in rest {
        let stripped = line.get(margin..).unwrap_or_else(|| line.trim_start());
        cleaned.push(stripped.trim_end().to_string());
    }

    while cleaned.first().is_some_and(|l| l.trim().is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().is_some_and(|l| l.trim().is_empty()) {
        cleaned.pop();
    }
    cleaned.join("\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// Parameter classification
// ─────────────────────────────────────────────────────────────────────────────

const SCALAR_TYPES: [&str; 21] = [
    "int", "float", "str", "bool", "bytes", "complex", "None", "Any", "UUID", "UUID4", "datetime",
    "date", "time", "timedelta", "Decimal", "EmailStr", "HttpUrl", "AnyUrl", "SecretStr",
    "constr", "conint",
];

const INJECTED_TYPES: [&str; 6] = [
    "Request",
    "Response",
    "WebSocket",
    "BackgroundTasks",
    "HTTPConnection",
    "SecurityScopes",
];

const SEQUENCE_TYPES: [&str; 11] = [
    "list", "List", "set", "Set", "frozenset", "FrozenSet", "tuple", "Tuple", "Sequence",
    "Iterable", "Collection",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnnotationClass {
    Scalar,
    Injected,
    Model,
}

fn marker_kind(name: &str) -> Option<ParameterKind> {
    match name {
        "Depends" | "Security" => Some(ParameterKind::Dependency),
        "Path" => Some(ParameterKind::Path),
        "Query" => Some(ParameterKind::Query),
        "Body" | "Form" | "File" => Some(ParameterKind::Body),
        "Header" => Some(ParameterKind::Header),
        "Cookie" => Some(ParameterKind::Cookie),
        _ => None,
    }
}

/// `Marker(...)` call at `node` itself: its kind and argument list
fn marker_call<'t>(node: Node<'t>, source: &str) -> Option<(ParameterKind, Node<'t>)> {
    if node.kind() != "call" {
        return None;
    }
    let kind = marker_kind(callee_name(node, source)?)?;
    Some((kind, node.child_by_field_name("arguments")?))
}

/// First marker call anywhere inside `node`
fn find_marker<'t>(node: Node<'t>, source: &str) -> Option<(ParameterKind, Node<'t>)> {
    descendants(node, "call")
        .into_iter()
        .find_map(|call| marker_call(call, source))
}

/// First non-scalar class among alternatives
fn strongest(classes: impl IntoIterator<Item = AnnotationClass>) -> AnnotationClass {
    classes
        .into_iter()
        .find(|class| *class != AnnotationClass::Scalar)
        .unwrap_or(AnnotationClass::Scalar)
}

fn classify_annotation(node: Node<'_>, source: &str) -> AnnotationClass {
    match node.kind() {
        "type" | "parenthesized_expression" => {
            first_named(node).map_or(AnnotationClass::Scalar, |inner| {
                classify_annotation(inner, source)
            })
        }
        "union_type" => strongest(named(node).into_iter().map(|n| classify_annotation(n, source))),
        "binary_operator" => {
            let is_union = node
                .child_by_field_name("operator")
                .is_some_and(|op| text(op, source) == "|");
            if !is_union {
                return AnnotationClass::Scalar;
            }
            strongest(
                ["left", "right"]
                    .into_iter()
                    .filter_map(|field| node.child_by_field_name(field))
                    .map(|n| classify_annotation(n, source)),
            )
        }
        "generic_type" => {
            let children = named(node);
            let Some((base, rest)) = children.split_first() else {
                return AnnotationClass::Scalar;
            };
            let args: Vec<Node<'_>> = rest
                .iter()
                .filter(|n| n.kind() == "type_parameter")
                .flat_map(|list| named(*list))
                .collect();
            classify_base(text(*base, source), Some(args), source)
        }
        "subscript" => {
            let children = named(node);
            let Some((value, args)) = children.split_first() else {
                return AnnotationClass::Scalar;
            };
            let Some(base) = dotted_names(*value, source).and_then(|mut names| names.pop()) else {
                return AnnotationClass::Scalar;
            };
            classify_base(base, Some(args.to_vec()), source)
        }
        "identifier" | "attribute" | "member_type" => {
            let base = match node.kind() {
                "member_type" => named(node).last().map(|n| text(*n, source)),
                _ => dotted_names(node, source).and_then(|mut names| names.pop()),
            };
            base.map_or(AnnotationClass::Scalar, |base| {
                classify_base(base, None, source)
            })
        }
        "call" => callee_name(node, source).map_or(AnnotationClass::Scalar, |base| {
            classify_base(base, None, source)
        }),
        _ => AnnotationClass::Scalar,
    }
}

fn classify_base(base: &str, args: Option<Vec<Node<'_>>>, source: &str) -> AnnotationClass {
    match (base, args) {
        ("Optional" | "Annotated" | "Required" | "NotRequired", Some(args)) => args
            .first()
            .map_or(AnnotationClass::Scalar, |inner| {
                classify_annotation(*inner, source)
            }),
        ("Union", Some(args)) => {
            strongest(args.into_iter().map(|arg| classify_annotation(arg, source)))
        }
        ("Literal", _) => AnnotationClass::Scalar,
        (name, Some(args)) if SEQUENCE_TYPES.contains(&name) => {
            if args
                .into_iter()
                .all(|arg| classify_annotation(arg, source) == AnnotationClass::Scalar)
            {
                AnnotationClass::Scalar
            } else {
                AnnotationClass::Model
            }
        }
        (name, None) if SEQUENCE_TYPES.contains(&name) => AnnotationClass::Scalar,
        (name, _) if SCALAR_TYPES.contains(&name) => AnnotationClass::Scalar,
        (name, _) if INJECTED_TYPES.contains(&name) => AnnotationClass::Injected,
        _ => AnnotationClass::Model,
    }
}

/// Whether a marker call supplies a default value
///
/// `Query(...)` and `Query()` do not; `Query(None)` and `Query(default=1)` do.
fn marker_has_default(arguments: Node<'_>, source: &str) -> bool {
    let args = CallArgs::of(arguments, source);
    if let Some(first) = args.first_positional() {
        return !is_ellipsis(first);
    }
    args.keyword("default").is_some_and(|v| !is_ellipsis(v))
        || args.keyword("default_factory").is_some()
}

fn marker_description(arguments: Node<'_>, source: &str) -> Option<String> {
    CallArgs::of(arguments, source)
        .keyword("description")
        .and_then(|value| literal_string(value, source))
}

/// Annotation source text with runs of whitespace collapsed
fn render_annotation(node: Node<'_>, source: &str) -> String {
    text(node, source).split_whitespace().collect::<Vec<_>>().join(" ")
}

fn classify_param(raw: &RawParam<'_>, placeholders: &[&str], source: &str) -> ParameterInfo {
    let default_marker = raw.default.and_then(|d| marker_call(d, source));
    let annotation_marker = raw.annotation.and_then(|a| find_marker(a, source));
    let marker = default_marker.or(annotation_marker);

    let kind = if let Some((kind, _)) = marker {
        kind
    } else if placeholders.contains(&raw.name.as_str()) {
        ParameterKind::Path
    } else {
        match raw.annotation.map(|a| classify_annotation(a, source)) {
            Some(AnnotationClass::Injected) => ParameterKind::Dependency,
            Some(AnnotationClass::Model) => ParameterKind::Body,
            Some(AnnotationClass::Scalar) | None => ParameterKind::Query,
        }
    };

    let required = if kind == ParameterKind::Path || kind == ParameterKind::Dependency {
        true
    } else {
        match (raw.default, default_marker) {
            (None, _) => true,
            (Some(_), Some((_, args))) => !marker_has_default(args, source),
            (Some(_), None) => false,
        }
    };

    ParameterInfo {
        name: raw.name.clone(),
        kind,
        required,
        description: marker.and_then(|(_, args)| marker_description(args, source)),
        annotation: raw
            .annotation
            .map(|a| render_annotation(a, source))
            .filter(|a| !a.is_empty()),
    }
}

fn build_record(
    route: RouteDecorator<'_>,
    function: &FunctionHeader<'_>,
    docstring: Option<&str>,
    file: &Path,
    source: &str,
) -> RouteRecord {
    let mut record = RouteRecord::new(route.method, route.path);
    let parameters: Vec<ParameterInfo> = {
        let placeholders = record.path_placeholders();
        function
            .params
            .iter()
            .map(|raw| classify_param(raw, &placeholders, source))
            .collect()
    };
    record.parameters = parameters;
    record.existing_doc = docstring.map(str::to_string);
    record.deprecated = route.deprecated;
    record.router = route.receiver;
    record.handler = function.name.clone();
    record.source_file = file.to_path_buf();
    record.line = route.line;
    record
}

// ─────────────────────────────────────────────────────────────────────────────
// Application metadata
// ─────────────────────────────────────────────────────────────────────────────

/// Literal `title` / `description` / `version` of the first `FastAPI(...)` call
fn find_app_info(root: Node<'_>, source: &str) -> Option<AppInfo> {
    descendants(root, "call").into_iter().find_map(|call| {
        if callee_name(call, source)? != "FastAPI" {
            return None;
        }
        let args = CallArgs::of(call.child_by_field_name("arguments")?, source);
        let literal = |name: &str| {
            args.keyword(name)
                .and_then(|value| literal_string(value, source))
        };
        let defaults = AppInfo::default();
        Some(AppInfo {
            title: literal("title").unwrap_or(defaults.title),
            description: literal("description"),
            version: literal("version").unwrap_or(defaults.version),
        })
    })
}
