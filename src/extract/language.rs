//! Grammar registry
//!
//! Static per-language configuration: which syntax-tree node kinds are
//! top-level declarations and how each of them is classified. Traversal code
//! asks a [`LanguageSpec`] for the [`SyntaxRole`] of a kind instead of
//! comparing kind strings inline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Languages with a tree-sitter grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    Tsx,
    JavaScript,
    Python,
    Rust,
    Go,
    Java,
}

impl Language {
    /// Every supported grammar
    pub const ALL: [Language; 7] = [
        Language::TypeScript,
        Language::Tsx,
        Language::JavaScript,
        Language::Python,
        Language::Rust,
        Language::Go,
        Language::Java,
    ];

    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.spec().extensions.contains(&ext.as_str()))
    }

    /// Look a language up by its display name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "typescript" | "ts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "javascript" | "js" => Some(Language::JavaScript),
            "python" | "py" => Some(Language::Python),
            "rust" | "rs" => Some(Language::Rust),
            "go" | "golang" => Some(Language::Go),
            "java" => Some(Language::Java),
            _ => None,
        }
    }

    /// Get the tree-sitter language for this language
    pub fn tree_sitter_language(&self) -> tree_sitter::Language {
        match self {
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
            Language::Go => tree_sitter_go::LANGUAGE.into(),
            Language::Java => tree_sitter_java::LANGUAGE.into(),
        }
    }

    /// Static chunking configuration for this language
    pub fn spec(&self) -> &'static LanguageSpec {
        match self {
            Language::TypeScript => &TYPESCRIPT,
            Language::Tsx => &TSX,
            Language::JavaScript => &JAVASCRIPT,
            Language::Python => &PYTHON,
            Language::Rust => &RUST,
            Language::Go => &GO,
            Language::Java => &JAVA,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::TypeScript => write!(f, "typescript"),
            Language::Tsx => write!(f, "tsx"),
            Language::JavaScript => write!(f, "javascript"),
            Language::Python => write!(f, "python"),
            Language::Rust => write!(f, "rust"),
            Language::Go => write!(f, "go"),
            Language::Java => write!(f, "java"),
        }
    }
}

/// Language a file resolves to after extension overrides are applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLanguage {
    /// A language with a grammar configuration
    Grammar(Language),
    /// A language name without a grammar; chunked by line windows only
    Text(String),
}

impl SourceLanguage {
    /// Resolve the language of `path`.
    ///
    /// `overrides` maps a lowercase extension (without the dot) to a language
    /// name and wins over the built-in extension table.
    pub fn for_path(path: &str, overrides: &HashMap<String, String>) -> Option<Self> {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())?
            .to_lowercase();

        if let Some(name) = overrides.get(&ext) {
            return Some(match Language::from_name(name) {
                Some(lang) => SourceLanguage::Grammar(lang),
                None => SourceLanguage::Text(name.to_lowercase()),
            });
        }

        Language::from_extension(&ext).map(SourceLanguage::Grammar)
    }

    /// The grammar, if any
    pub fn grammar(&self) -> Option<Language> {
        match self {
            SourceLanguage::Grammar(lang) => Some(*lang),
            SourceLanguage::Text(_) => None,
        }
    }

    /// Name recorded on chunks and nodes
    pub fn name(&self) -> String {
        match self {
            SourceLanguage::Grammar(lang) => lang.to_string(),
            SourceLanguage::Text(name) => name.clone(),
        }
    }
}

/// Classification of a top-level syntax node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxRole {
    Import,
    Function,
    Class,
    Interface,
    /// Function nested in a class-like body
    Method,
    /// Any other top-level declaration (type alias, constant, module, ...)
    Declaration,
}

impl SyntaxRole {
    pub fn is_class_like(self) -> bool {
        matches!(self, SyntaxRole::Class | SyntaxRole::Interface)
    }

    pub fn is_function_like(self) -> bool {
        matches!(self, SyntaxRole::Function | SyntaxRole::Method)
    }
}

/// Import statement grammar family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportSyntax {
    EcmaScript,
    Python,
    Go,
    Rust,
    Java,
}

/// How a declaration signals that it is exported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMarker {
    /// A keyword on the declaration's first line (`export`, `pub`, `public`)
    Keyword(&'static str),
    /// Names without a leading underscore are public
    NoUnderscore,
    /// Capitalized names are exported
    Capitalized,
}

/// A wrapper kind that forwards to an inner declaration via a field
#[derive(Debug, Clone, Copy)]
pub struct Wrapper {
    pub kind: &'static str,
    pub field: &'static str,
    /// Whether the wrapper itself marks the declaration as exported
    pub exports: bool,
}

/// Static chunking configuration for one language
#[derive(Debug)]
pub struct LanguageSpec {
    pub extensions: &'static [&'static str],
    pub top_level: &'static [&'static str],
    pub imports: &'static [&'static str],
    pub functions: &'static [&'static str],
    pub classes: &'static [&'static str],
    /// Subset of `classes` that become interface nodes
    pub interfaces: &'static [&'static str],
    /// Method kinds looked up when an oversize class is split
    pub methods: &'static [&'static str],
    pub wrappers: &'static [Wrapper],
    /// Declarator values that make a variable declaration function-like
    pub function_values: &'static [&'static str],
    pub name_fields: &'static [&'static str],
    pub import_syntax: ImportSyntax,
    pub export_marker: ExportMarker,
    pub async_keyword: Option<&'static str>,
    /// Default extensions appended when resolving extension-less relative imports
    pub resolve_extensions: &'static [&'static str],
    /// File stem used for directory imports
    pub index_file: &'static str,
}

impl LanguageSpec {
    /// Role of a node kind, or `None` when the kind is not top-level
    pub fn role(&self, kind: &str) -> Option<SyntaxRole> {
        if self.imports.contains(&kind) {
            Some(SyntaxRole::Import)
        } else if self.functions.contains(&kind) {
            Some(SyntaxRole::Function)
        } else if self.interfaces.contains(&kind) {
            Some(SyntaxRole::Interface)
        } else if self.classes.contains(&kind) {
            Some(SyntaxRole::Class)
        } else if self.top_level.contains(&kind) {
            Some(SyntaxRole::Declaration)
        } else {
            None
        }
    }

    pub fn is_method(&self, kind: &str) -> bool {
        self.methods.contains(&kind)
    }

    pub fn wrapper(&self, kind: &str) -> Option<&Wrapper> {
        self.wrappers.iter().find(|w| w.kind == kind)
    }

    /// Whether a declaration is exported, judged from its first line and name
    pub fn is_exported(&self, first_line: &str, name: Option<&str>) -> bool {
        match self.export_marker {
            ExportMarker::Keyword(keyword) => first_line
                .split(|c: char| !(c.is_alphanumeric() || c == '_'))
                .any(|word| word == keyword),
            ExportMarker::NoUnderscore => name.is_some_and(|n| !n.starts_with('_')),
            ExportMarker::Capitalized => {
                name.is_some_and(|n| n.chars().next().is_some_and(char::is_uppercase))
            }
        }
    }

    pub fn is_async(&self, first_line: &str) -> bool {
        self.async_keyword.is_some_and(|keyword| {
            first_line
                .split(|c: char| !(c.is_alphanumeric() || c == '_'))
                .any(|word| word == keyword)
        })
    }
}

const ECMA_WRAPPERS: &[Wrapper] = &[Wrapper {
    kind: "export_statement",
    field: "declaration",
    exports: true,
}];

const ECMA_FUNCTION_VALUES: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

static TYPESCRIPT: LanguageSpec = LanguageSpec {
    extensions: &["ts", "mts", "cts"],
    top_level: &[
        "import_statement",
        "export_statement",
        "function_declaration",
        "generator_function_declaration",
        "class_declaration",
        "abstract_class_declaration",
        "interface_declaration",
        "type_alias_declaration",
        "enum_declaration",
        "lexical_declaration",
        "variable_declaration",
        "internal_module",
        "ambient_declaration",
    ],
    imports: &["import_statement"],
    functions: &[
        "function_declaration",
        "generator_function_declaration",
        "method_definition",
    ],
    classes: &[
        "class_declaration",
        "abstract_class_declaration",
        "interface_declaration",
    ],
    interfaces: &["interface_declaration"],
    methods: &["method_definition"],
    wrappers: ECMA_WRAPPERS,
    function_values: ECMA_FUNCTION_VALUES,
    name_fields: &["name"],
    import_syntax: ImportSyntax::EcmaScript,
    export_marker: ExportMarker::Keyword("export"),
    async_keyword: Some("async"),
    resolve_extensions: &["ts", "tsx", "js", "jsx"],
    index_file: "index",
};

static TSX: LanguageSpec = LanguageSpec {
    extensions: &["tsx"],
    ..TYPESCRIPT
};

static JAVASCRIPT: LanguageSpec = LanguageSpec {
    extensions: &["js", "jsx", "mjs", "cjs"],
    top_level: &[
        "import_statement",
        "export_statement",
        "function_declaration",
        "generator_function_declaration",
        "class_declaration",
        "lexical_declaration",
        "variable_declaration",
    ],
    imports: &["import_statement"],
    functions: &[
        "function_declaration",
        "generator_function_declaration",
        "method_definition",
    ],
    classes: &["class_declaration"],
    interfaces: &[],
    methods: &["method_definition"],
    wrappers: ECMA_WRAPPERS,
    function_values: ECMA_FUNCTION_VALUES,
    name_fields: &["name"],
    import_syntax: ImportSyntax::EcmaScript,
    export_marker: ExportMarker::Keyword("export"),
    async_keyword: Some("async"),
    resolve_extensions: &["js", "jsx", "mjs", "cjs", "ts", "tsx"],
    index_file: "index",
};

static PYTHON: LanguageSpec = LanguageSpec {
    extensions: &["py", "pyi"],
    top_level: &[
        "import_statement",
        "import_from_statement",
        "future_import_statement",
        "function_definition",
        "class_definition",
        "decorated_definition",
    ],
    imports: &[
        "import_statement",
        "import_from_statement",
        "future_import_statement",
    ],
    functions: &["function_definition"],
    classes: &["class_definition"],
    interfaces: &[],
    methods: &["function_definition"],
    wrappers: &[Wrapper {
        kind: "decorated_definition",
        field: "definition",
        exports: false,
    }],
    function_values: &[],
    name_fields: &["name"],
    import_syntax: ImportSyntax::Python,
    export_marker: ExportMarker::NoUnderscore,
    async_keyword: Some("async"),
    resolve_extensions: &["py"],
    index_file: "__init__",
};

static RUST: LanguageSpec = LanguageSpec {
    extensions: &["rs"],
    top_level: &[
        "use_declaration",
        "extern_crate_declaration",
        "function_item",
        "function_signature_item",
        "struct_item",
        "enum_item",
        "union_item",
        "trait_item",
        "impl_item",
        "type_item",
        "const_item",
        "static_item",
        "mod_item",
        "macro_definition",
    ],
    imports: &["use_declaration", "extern_crate_declaration"],
    functions: &["function_item"],
    classes: &["struct_item", "enum_item", "union_item", "trait_item", "impl_item"],
    interfaces: &["trait_item"],
    methods: &["function_item", "function_signature_item"],
    wrappers: &[],
    function_values: &[],
    name_fields: &["name", "type"],
    import_syntax: ImportSyntax::Rust,
    export_marker: ExportMarker::Keyword("pub"),
    async_keyword: Some("async"),
    resolve_extensions: &["rs"],
    index_file: "mod",
};

static GO: LanguageSpec = LanguageSpec {
    extensions: &["go"],
    top_level: &[
        "import_declaration",
        "function_declaration",
        "method_declaration",
        "type_declaration",
        "const_declaration",
        "var_declaration",
    ],
    imports: &["import_declaration"],
    functions: &["function_declaration", "method_declaration"],
    classes: &["type_declaration"],
    interfaces: &[],
    methods: &[],
    wrappers: &[],
    function_values: &[],
    name_fields: &["name"],
    import_syntax: ImportSyntax::Go,
    export_marker: ExportMarker::Capitalized,
    async_keyword: None,
    resolve_extensions: &["go"],
    index_file: "",
};

static JAVA: LanguageSpec = LanguageSpec {
    extensions: &["java"],
    top_level: &[
        "import_declaration",
        "class_declaration",
        "interface_declaration",
        "enum_declaration",
        "record_declaration",
        "annotation_type_declaration",
    ],
    imports: &["import_declaration"],
    functions: &["method_declaration", "constructor_declaration"],
    classes: &[
        "class_declaration",
        "interface_declaration",
        "enum_declaration",
        "record_declaration",
    ],
    interfaces: &["interface_declaration"],
    methods: &["method_declaration", "constructor_declaration"],
    wrappers: &[],
    function_values: &[],
    name_fields: &["name"],
    import_syntax: ImportSyntax::Java,
    export_marker: ExportMarker::Keyword("public"),
    async_keyword: None,
    resolve_extensions: &["java"],
    index_file: "",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_languages_by_extension() {
        assert_eq!(Language::from_extension("ts"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension("TSX"), Some(Language::Tsx));
        assert_eq!(Language::from_extension("py"), Some(Language::Python));
        assert_eq!(Language::from_extension("rs"), Some(Language::Rust));
        assert_eq!(Language::from_extension("go"), Some(Language::Go));
        assert_eq!(Language::from_extension("java"), Some(Language::Java));
        assert_eq!(Language::from_extension("mjs"), Some(Language::JavaScript));
        assert_eq!(Language::from_extension("xyz"), None);
    }

    #[test]
    fn overrides_win_over_builtin_table() {
        let mut overrides = HashMap::new();
        overrides.insert("js".to_string(), "typescript".to_string());
        overrides.insert("md".to_string(), "markdown".to_string());

        assert_eq!(
            SourceLanguage::for_path("src/a.js", &overrides),
            Some(SourceLanguage::Grammar(Language::TypeScript))
        );
        assert_eq!(
            SourceLanguage::for_path("README.md", &overrides),
            Some(SourceLanguage::Text("markdown".to_string()))
        );
        assert_eq!(SourceLanguage::for_path("Makefile", &overrides), None);
    }

    #[test]
    fn roles_follow_kind_sets() {
        let ts = Language::TypeScript.spec();
        assert_eq!(ts.role("import_statement"), Some(SyntaxRole::Import));
        assert_eq!(ts.role("function_declaration"), Some(SyntaxRole::Function));
        assert_eq!(ts.role("interface_declaration"), Some(SyntaxRole::Interface));
        assert_eq!(ts.role("class_declaration"), Some(SyntaxRole::Class));
        assert_eq!(ts.role("type_alias_declaration"), Some(SyntaxRole::Declaration));
        assert_eq!(ts.role("expression_statement"), None);

        let rust = Language::Rust.spec();
        assert_eq!(rust.role("trait_item"), Some(SyntaxRole::Interface));
        assert_eq!(rust.role("impl_item"), Some(SyntaxRole::Class));

        assert!(SyntaxRole::Method.is_function_like());
        assert!(!SyntaxRole::Method.is_class_like());
        assert!(!SyntaxRole::Declaration.is_function_like());
    }

    #[test]
    fn export_markers_per_language() {
        let ts = Language::TypeScript.spec();
        assert!(ts.is_exported("export function run() {", Some("run")));
        assert!(!ts.is_exported("function exporter() {", Some("exporter")));

        let py = Language::Python.spec();
        assert!(py.is_exported("def run():", Some("run")));
        assert!(!py.is_exported("def _hidden():", Some("_hidden")));

        let go = Language::Go.spec();
        assert!(go.is_exported("func Run() {", Some("Run")));
        assert!(!go.is_exported("func run() {", Some("run")));

        assert!(Language::Rust.spec().is_async("pub async fn fetch() {"));
        assert!(!Language::Go.spec().is_async("func async() {"));
    }
}
