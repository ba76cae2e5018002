//! Import statement parsing and classification
//!
//! Each language family has one combined pattern. Statements are matched in a
//! single pass and the form is read off the alternative that matched, so a
//! statement is never counted twice.

use super::extractor::ExtractContext;
use super::Resolution;
use crate::extract::language::{ImportSyntax, Language, LanguageSpec};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// Syntactic form of an import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportForm {
    Named,
    Default,
    Namespace,
    SideEffect,
    Require,
    ReExport,
    /// Whole-module import (`import os`, Go packages, `extern crate`)
    Module,
}

/// One imported source as written in a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedImport {
    pub source: String,
    pub symbols: Vec<String>,
    pub is_default: bool,
    pub is_namespace: bool,
    /// 1-based line of the statement
    pub line: usize,
    pub form: ImportForm,
}

impl ParsedImport {
    fn new(source: &str, form: ImportForm, line: usize) -> Self {
        Self {
            source: source.to_string(),
            symbols: Vec::new(),
            is_default: false,
            is_namespace: false,
            line,
            form,
        }
    }
}

/// Where an import points
#[derive(Debug, Clone, PartialEq)]
pub enum ImportTarget {
    /// A project file; `path` is the file path the module id is built from
    Module { path: String, resolution: Resolution },
    /// An external package name
    Package(String),
}

static ECMA_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)
        (?P<reexport>\bexport\s+(?:type\s+)?(?P<reclause>\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from\s*['"](?P<resrc>[^'"\n]+)['"])
        | (?P<from>\bimport\s+(?:type\s+)?(?P<clause>[\w$*{][^'";]*?)\s*from\s*['"](?P<src>[^'"\n]+)['"])
        | (?P<side>\bimport\s*['"](?P<sidesrc>[^'"\n]+)['"])
        | (?P<req>\b(?:require|import)\s*\(\s*['"](?P<reqsrc>[^'"\n]+)['"]\s*\))
        "#,
    )
    .unwrap()
});

static PYTHON_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:from[ \t]+(?P<from>\.+[\w.]*|[\w.]+)[ \t]+import[ \t]+(?P<names>\([^)]*\)|[^\n#;]+)|import[ \t]+(?P<mods>[^\n#;]+))",
    )
    .unwrap()
});

static GO_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*import[ \t]*(?:\((?P<block>[^)]*)\)|(?:(?P<alias>[\w.]+)[ \t]+)?"(?P<path>[^"]+)")"#,
    )
    .unwrap()
});

static GO_SPEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*(?:(?P<alias>[\w.]+)[ \t]+)?"(?P<path>[^"]+)""#)
        .unwrap()
});

static RUST_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:pub(?:\([^)]*\))?[ \t]+)?(?:use[ \t]+(?P<tree>[^;]+);|extern[ \t]+crate[ \t]+(?P<krate>\w+)(?:[ \t]+as[ \t]+\w+)?[ \t]*;)",
    )
    .unwrap()
});

static JAVA_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*import[ \t]+(?P<static>static[ \t]+)?(?P<path>[\w.]+?)(?P<wild>\.\*)?[ \t]*;")
        .unwrap()
});

/// Parse every import statement in `text`; `base_line` is the line of its first byte
pub fn parse_imports(syntax: ImportSyntax, text: &str, base_line: usize) -> Vec<ParsedImport> {
    match syntax {
        ImportSyntax::EcmaScript => parse_ecma(text, base_line),
        ImportSyntax::Python => parse_python(text, base_line),
        ImportSyntax::Go => parse_go(text, base_line),
        ImportSyntax::Rust => parse_rust(text, base_line),
        ImportSyntax::Java => parse_java(text, base_line),
    }
}

fn line_at(text: &str, offset: usize, base_line: usize) -> usize {
    base_line + text[..offset].matches('\n').count()
}

fn group<'t>(caps: &Captures<'t>, name: &str) -> Option<&'t str> {
    caps.name(name).map(|m| m.as_str())
}

fn parse_ecma(text: &str, base_line: usize) -> Vec<ParsedImport> {
    let mut imports = Vec::new();

    for caps in ECMA_IMPORT.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let line = line_at(text, whole.start(), base_line);

        if let Some(src) = group(&caps, "resrc") {
            let clause = group(&caps, "reclause").unwrap_or_default();
            let mut import = ParsedImport::new(src, ImportForm::ReExport, line);
            if clause.starts_with('*') {
                import.is_namespace = true;
                import.symbols = alias_after_as(clause).into_iter().collect();
            } else {
                import.symbols = named_symbols(clause);
            }
            imports.push(import);
        } else if let Some(src) = group(&caps, "src") {
            let clause = group(&caps, "clause").unwrap_or_default();
            imports.push(classify_clause(src, clause, line));
        } else if let Some(src) = group(&caps, "sidesrc") {
            imports.push(ParsedImport::new(src, ImportForm::SideEffect, line));
        } else if let Some(src) = group(&caps, "reqsrc") {
            imports.push(ParsedImport::new(src, ImportForm::Require, line));
        }
    }

    imports
}

/// Read `Default, { a, b as c }` / `* as ns` clauses
fn classify_clause(src: &str, clause: &str, line: usize) -> ParsedImport {
    let clause = clause.trim();
    let mut import = ParsedImport::new(src, ImportForm::Named, line);

    let (head, named) = match clause.find('{') {
        Some(open) => (&clause[..open], named_symbols(&clause[open..])),
        None => (clause, Vec::new()),
    };

    for part in head.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if part.starts_with('*') {
            import.is_namespace = true;
            import.symbols.extend(alias_after_as(part));
        } else {
            import.is_default = true;
            import.symbols.push(part.to_string());
        }
    }

    let has_named = !named.is_empty();
    import.symbols.extend(named);

    import.form = if has_named {
        ImportForm::Named
    } else if import.is_namespace {
        ImportForm::Namespace
    } else {
        ImportForm::Default
    };
    import
}

/// Names inside `{ ... }`, dropping `type` markers and `as` aliases
fn named_symbols(clause: &str) -> Vec<String> {
    clause
        .trim_matches(|c: char| c == '{' || c == '}' || c.is_whitespace())
        .split(',')
        .map(|part| {
            let part = part.trim();
            let part = part.strip_prefix("type ").unwrap_or(part);
            part.split(" as ").next().unwrap_or(part).trim().to_string()
        })
        .filter(|name| !name.is_empty())
        .collect()
}

fn alias_after_as(part: &str) -> Option<String> {
    part.split(" as ")
        .nth(1)
        .map(|alias| alias.trim().to_string())
        .filter(|alias| !alias.is_empty())
}

fn parse_python(text: &str, base_line: usize) -> Vec<ParsedImport> {
    let mut imports = Vec::new();

    for caps in PYTHON_IMPORT.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let line = line_at(text, whole.start(), base_line);

        if let Some(src) = group(&caps, "from") {
            if src == "__future__" {
                continue;
            }
            let names = group(&caps, "names")
                .unwrap_or_default()
                .trim()
                .trim_start_matches('(')
                .trim_end_matches(')');

            let mut import = ParsedImport::new(src, ImportForm::Named, line);
            for name in names.split(',').map(|n| n.trim().trim_end_matches('\\').trim()) {
                if name == "*" {
                    import.is_namespace = true;
                    import.form = ImportForm::Namespace;
                } else if !name.is_empty() {
                    let original = name.split(" as ").next().unwrap_or(name).trim();
                    import.symbols.push(original.to_string());
                }
            }
            imports.push(import);
        } else if let Some(mods) = group(&caps, "mods") {
            for module in mods.split(',').map(str::trim).filter(|m| !m.is_empty()) {
                let mut parts = module.split(" as ");
                let source = parts.next().unwrap_or(module).trim();
                let bound = parts.next().map(str::trim).unwrap_or(source);

                let mut import = ParsedImport::new(source, ImportForm::Module, line);
                import.is_namespace = true;
                import.symbols.push(bound.to_string());
                imports.push(import);
            }
        }
    }

    imports
}

fn go_spec(alias: Option<&str>, path: &str, line: usize) -> ParsedImport {
    let mut import = ParsedImport::new(path, ImportForm::Module, line);
    match alias {
        Some("_") => import.form = ImportForm::SideEffect,
        Some(".") => {
            import.form = ImportForm::Namespace;
            import.is_namespace = true;
        }
        Some(alias) => import.symbols.push(alias.to_string()),
        None => {
            if let Some(last) = path.rsplit('/').next() {
                import.symbols.push(last.to_string());
            }
        }
    }
    import
}

fn parse_go(text: &str, base_line: usize) -> Vec<ParsedImport> {
    let mut imports = Vec::new();

    for caps in GO_IMPORT.captures_iter(text) {
        if let Some(block) = caps.name("block") {
            let block_line = line_at(text, block.start(), base_line);
            for spec in GO_SPEC.captures_iter(block.as_str()) {
                let (Some(whole), Some(path)) = (spec.get(0), group(&spec, "path")) else {
                    continue;
                };
                let line = line_at(block.as_str(), whole.start(), block_line);
                imports.push(go_spec(group(&spec, "alias"), path, line));
            }
        } else if let (Some(whole), Some(path)) = (caps.get(0), group(&caps, "path")) {
            let line = line_at(text, whole.start(), base_line);
            imports.push(go_spec(group(&caps, "alias"), path, line));
        }
    }

    imports
}

fn parse_rust(text: &str, base_line: usize) -> Vec<ParsedImport> {
    let mut imports = Vec::new();

    for caps in RUST_IMPORT.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let offset = whole.as_str().len() - whole.as_str().trim_start().len();
        let line = line_at(text, whole.start() + offset, base_line);

        if let Some(krate) = group(&caps, "krate") {
            let mut import = ParsedImport::new(krate, ImportForm::Module, line);
            import.symbols.push(krate.to_string());
            imports.push(import);
            continue;
        }

        let tree: String = group(&caps, "tree")
            .unwrap_or_default()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let mut leaves = Vec::new();
        expand_use_tree(&[], tree.trim().trim_start_matches("::"), &mut leaves);

        let mut grouped: Vec<ParsedImport> = Vec::new();
        for segments in leaves {
            let Some((last, prefix)) = segments.split_last() else {
                continue;
            };

            let (source, symbol, form) = match last.as_str() {
                "self" if !prefix.is_empty() => (
                    prefix.join("::"),
                    prefix.last().cloned(),
                    ImportForm::Module,
                ),
                "*" => (prefix.join("::"), None, ImportForm::Namespace),
                _ if prefix.is_empty() => (last.clone(), Some(last.clone()), ImportForm::Module),
                _ => (prefix.join("::"), Some(last.clone()), ImportForm::Named),
            };
            if source.is_empty() {
                continue;
            }

            let index = match grouped.iter().position(|i| i.source == source) {
                Some(index) => index,
                None => {
                    grouped.push(ParsedImport::new(&source, form, line));
                    grouped.len() - 1
                }
            };
            let import = &mut grouped[index];
            if form == ImportForm::Namespace {
                import.is_namespace = true;
                import.form = ImportForm::Namespace;
            }
            if let Some(symbol) = symbol {
                if !import.symbols.contains(&symbol) {
                    import.symbols.push(symbol);
                }
            }
        }
        imports.extend(grouped);
    }

    imports
}

/// Flatten `a::{b, c::{d, e as f}}` into full paths (aliases dropped)
fn expand_use_tree(prefix: &[String], tree: &str, out: &mut Vec<Vec<String>>) {
    let tree = tree.trim();
    if tree.is_empty() {
        return;
    }

    if let Some(open) = tree.find('{') {
        let close = tree.rfind('}').unwrap_or(tree.len());
        let head = tree[..open].trim().trim_end_matches("::");
        let mut base = prefix.to_vec();
        base.extend(
            head.split("::")
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );

        let inner = tree.get(open + 1..close).unwrap_or_default();
        for item in split_top_level(inner) {
            expand_use_tree(&base, item, out);
        }
        return;
    }

    let path = tree.split(" as ").next().unwrap_or(tree);
    let mut segments = prefix.to_vec();
    segments.extend(
        path.split("::")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    );
    out.push(segments);
}

fn split_top_level(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in inner.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&inner[start..]);
    parts
}

fn parse_java(text: &str, base_line: usize) -> Vec<ParsedImport> {
    let mut imports = Vec::new();

    for caps in JAVA_IMPORT.captures_iter(text) {
        let (Some(whole), Some(path)) = (caps.get(0), group(&caps, "path")) else {
            continue;
        };
        let offset = whole.as_str().len() - whole.as_str().trim_start().len();
        let line = line_at(text, whole.start() + offset, base_line);

        if caps.name("wild").is_some() {
            let mut import = ParsedImport::new(path, ImportForm::Namespace, line);
            import.is_namespace = true;
            imports.push(import);
            continue;
        }

        let (source, symbol) = path.rsplit_once('.').unwrap_or((path, path));
        let mut import = ParsedImport::new(source, ImportForm::Named, line);
        import.symbols.push(symbol.to_string());
        imports.push(import);
    }

    imports
}

// ==================== Classification ====================

/// Decide whether an import names a project module or an external package
pub fn resolve_import(
    ctx: &ExtractContext<'_>,
    language: Language,
    import: &ParsedImport,
) -> ImportTarget {
    let spec = language.spec();
    let source = import.source.as_str();

    match spec.import_syntax {
        ImportSyntax::EcmaScript => {
            if let Some(base) = alias_base(ctx, source) {
                return pick_candidate(ctx, file_candidates(&base, spec));
            }
            if is_relative_path(source) {
                let base = if source.starts_with('/') {
                    PathBuf::from(source)
                } else {
                    file_dir(ctx.file_path).join(source)
                };
                return pick_candidate(ctx, file_candidates(&normalize(&base), spec));
            }
            ImportTarget::Package(ecma_package(source))
        }
        ImportSyntax::Python => {
            if source.starts_with('.') {
                return pick_candidate(
                    ctx,
                    python_relative_candidates(ctx.file_path, source, &import.symbols),
                );
            }
            if let Some(root) = ctx.project_root {
                let base = root.join(source.replace('.', "/"));
                let candidates = file_candidates(&base, spec);
                if candidates.iter().any(|c| ctx.known_files.contains(c)) {
                    return pick_candidate(ctx, candidates);
                }
            }
            ImportTarget::Package(source.split('.').next().unwrap_or(source).to_string())
        }
        ImportSyntax::Go => {
            if is_relative_path(source) {
                let dir = normalize(&file_dir(ctx.file_path).join(source));
                return go_package_target(ctx, &dir);
            }
            ImportTarget::Package(go_package(source))
        }
        ImportSyntax::Rust => {
            let mut segments = source.split("::");
            match segments.next() {
                Some(first @ ("crate" | "self" | "super")) => {
                    let rest: Vec<&str> = segments.collect();
                    pick_candidate(ctx, rust_candidates(ctx, first, &rest, &import.symbols))
                }
                Some(first) => ImportTarget::Package(first.to_string()),
                None => ImportTarget::Package(source.to_string()),
            }
        }
        ImportSyntax::Java => {
            if import.form != ImportForm::Namespace {
                let suffix = format!("/{}.java", source_class_path(import));
                let mut matches: Vec<&String> = ctx
                    .known_files
                    .iter()
                    .filter(|f| f.ends_with(&suffix))
                    .collect();
                matches.sort();
                if let Some(path) = matches.first() {
                    return ImportTarget::Module {
                        path: (*path).clone(),
                        resolution: Resolution::Resolved,
                    };
                }
            }
            ImportTarget::Package(java_package(source))
        }
    }
}

fn is_relative_path(source: &str) -> bool {
    source.starts_with("./")
        || source.starts_with("../")
        || source == "."
        || source == ".."
        || source.starts_with('/')
}

fn alias_base(ctx: &ExtractContext<'_>, source: &str) -> Option<PathBuf> {
    let mut aliases: Vec<(&String, &String)> = ctx.path_aliases.iter().collect();
    aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    aliases.into_iter().find_map(|(prefix, target)| {
        let rest = source.strip_prefix(prefix.as_str())?;
        let joined = format!("{}{}", target, rest);
        Some(match ctx.project_root {
            Some(root) => normalize(&root.join(joined)),
            None => normalize(Path::new(&joined)),
        })
    })
}

/// Candidate files for an import base, extension first then index files
fn file_candidates(base: &Path, spec: &LanguageSpec) -> Vec<String> {
    let mut candidates = Vec::new();
    let base_str = path_string(base);

    let has_source_ext = base
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| Language::from_extension(ext).is_some() || ext == "json");

    if has_source_ext {
        candidates.push(base_str.clone());
        for ext in spec.resolve_extensions {
            let swapped = path_string(&base.with_extension(ext));
            if !candidates.contains(&swapped) {
                candidates.push(swapped);
            }
        }
        return candidates;
    }

    for ext in spec.resolve_extensions {
        candidates.push(format!("{}.{}", base_str, ext));
    }
    if !spec.index_file.is_empty() {
        for ext in spec.resolve_extensions {
            candidates.push(path_string(&base.join(format!("{}.{}", spec.index_file, ext))));
        }
    }
    candidates
}

fn python_relative_candidates(file_path: &str, source: &str, symbols: &[String]) -> Vec<String> {
    let dots = source.chars().take_while(|c| *c == '.').count();
    let mut dir = file_dir(file_path);
    for _ in 1..dots {
        dir = dir.parent().map(Path::to_path_buf).unwrap_or(dir);
    }

    let rest = source[dots..].replace('.', "/");
    if rest.is_empty() {
        // `from . import x` names submodules before package members
        let mut candidates = Vec::new();
        for symbol in symbols {
            let base = dir.join(symbol);
            candidates.push(format!("{}.py", path_string(&base)));
            candidates.push(path_string(&base.join("__init__.py")));
        }
        candidates.push(path_string(&dir.join("__init__.py")));
        return candidates;
    }
    let base = dir.join(rest);
    vec![
        format!("{}.py", path_string(&base)),
        path_string(&base.join("__init__.py")),
    ]
}

fn rust_candidates(
    ctx: &ExtractContext<'_>,
    first: &str,
    rest: &[&str],
    symbols: &[String],
) -> Vec<String> {
    let file = Path::new(ctx.file_path);
    let dir = file_dir(ctx.file_path);
    let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let self_dir = if matches!(stem, "mod" | "lib" | "main") {
        dir.clone()
    } else {
        dir.join(stem)
    };

    let mut base = match first {
        "crate" => crate_root(ctx, &dir),
        "super" => self_dir.parent().map(Path::to_path_buf).unwrap_or(self_dir),
        _ => self_dir,
    };

    let mut rest = rest;
    while let Some((&"super", tail)) = rest.split_first() {
        base = base.parent().map(Path::to_path_buf).unwrap_or(base);
        rest = tail;
    }

    if !rest.is_empty() {
        let module = rest.iter().fold(base, |acc, seg| acc.join(seg));
        return module_files(ctx, &module);
    }

    // `use crate::m;` may name a child module or an item of `base` itself
    let mut candidates = Vec::new();
    for symbol in symbols.iter().filter(|s| s.as_str() != "self") {
        let child = base.join(symbol);
        candidates.push(format!("{}.rs", path_string(&child)));
        candidates.push(path_string(&child.join("mod.rs")));
    }
    candidates.extend(module_files(ctx, &base));
    candidates
}

/// Directory holding the crate root file of the crate that contains `dir`
fn crate_root(ctx: &ExtractContext<'_>, dir: &Path) -> PathBuf {
    dir.ancestors()
        .find(|a| a.file_name().is_some_and(|n| n == "src"))
        .map(Path::to_path_buf)
        .or_else(|| ctx.project_root.map(|r| r.join("src")))
        .unwrap_or_else(|| dir.to_path_buf())
}

/// Files that may define the module whose directory is `dir`
fn module_files(ctx: &ExtractContext<'_>, dir: &Path) -> Vec<String> {
    let root_files = [
        path_string(&dir.join("lib.rs")),
        path_string(&dir.join("main.rs")),
    ];
    let is_crate_root = dir.file_name().is_some_and(|n| n == "src")
        || root_files.iter().any(|f| ctx.known_files.contains(f));

    if is_crate_root {
        return root_files.to_vec();
    }
    vec![
        format!("{}.rs", path_string(dir)),
        path_string(&dir.join("mod.rs")),
    ]
}

fn go_package_target(ctx: &ExtractContext<'_>, dir: &Path) -> ImportTarget {
    let mut files: Vec<&String> = ctx
        .known_files
        .iter()
        .filter(|f| Path::new(f.as_str()).parent() == Some(dir) && f.ends_with(".go"))
        .collect();
    files.sort();

    match files.first() {
        Some(path) => ImportTarget::Module {
            path: (*path).clone(),
            resolution: Resolution::Resolved,
        },
        None => ImportTarget::Module {
            path: path_string(dir),
            resolution: Resolution::Speculative,
        },
    }
}

/// Known candidate wins; otherwise the first candidate is a guess
fn pick_candidate(ctx: &ExtractContext<'_>, candidates: Vec<String>) -> ImportTarget {
    if let Some(known) = candidates.iter().find(|c| ctx.known_files.contains(*c)) {
        return ImportTarget::Module {
            path: known.clone(),
            resolution: Resolution::Resolved,
        };
    }

    ImportTarget::Module {
        path: candidates.into_iter().next().unwrap_or_default(),
        resolution: Resolution::Speculative,
    }
}

fn source_class_path(import: &ParsedImport) -> String {
    let mut path = import.source.replace('.', "/");
    if let Some(symbol) = import.symbols.first() {
        // static imports name a member; the class is the source itself
        if symbol.chars().next().is_some_and(char::is_uppercase) {
            path = format!("{}/{}", path, symbol);
        }
    }
    path
}

/// `@scope/name` keeps two segments, everything else one
pub fn ecma_package(source: &str) -> String {
    let mut segments = source.split('/');
    let first = segments.next().unwrap_or(source);
    match (first.starts_with('@'), segments.next()) {
        (true, Some(second)) => format!("{}/{}", first, second),
        _ => first.to_string(),
    }
}

/// Module paths rooted at a domain keep three segments
pub fn go_package(source: &str) -> String {
    let segments: Vec<&str> = source.split('/').collect();
    if segments.first().is_some_and(|s| s.contains('.')) {
        segments[..segments.len().min(3)].join("/")
    } else {
        segments.first().copied().unwrap_or(source).to_string()
    }
}

/// Leading lowercase segments of a qualified name
pub fn java_package(source: &str) -> String {
    let package: Vec<&str> = source
        .split('.')
        .take_while(|s| s.chars().next().is_some_and(char::is_lowercase))
        .collect();
    if package.is_empty() {
        source.to_string()
    } else {
        package.join(".")
    }
}

fn file_dir(file_path: &str) -> PathBuf {
    Path::new(file_path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Resolve `.` and `..` components lexically
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
