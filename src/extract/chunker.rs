//! Structural chunking
//!
//! Splits a source file into token-bounded chunks along declaration
//! boundaries:
//! - import-like declarations are grouped into one `imports` chunk, or
//!   prepended to every chunk when inlined
//! - declarations within budget become one chunk each
//! - oversize classes are split into their methods
//! - anything else oversize is split into line windows (`<kind>_partial`)

use super::language::{Language, LanguageSpec, SourceLanguage, SyntaxRole};
use super::pool::ParserPool;
use super::tokens::TokenCounter;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;
use tree_sitter::Node as SyntaxNode;

/// Node type of the synthetic imports chunk
pub const IMPORTS_NODE_TYPE: &str = "imports";

/// Node type of whole-file line windows for languages without a grammar
pub const LINES_NODE_TYPE: &str = "lines";

/// A bounded unit of source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text, prefixed by `context_len` bytes of inlined imports
    pub content: String,
    /// Tokens in the chunk's own text
    pub token_count: usize,
    /// 1-based, inclusive
    pub start_line: usize,
    pub end_line: usize,
    pub start_byte: usize,
    pub end_byte: usize,
    pub language: String,
    pub node_type: String,
    pub name: Option<String>,
    pub parent_name: Option<String>,
    pub is_import: bool,
    pub is_function: bool,
    pub is_class: bool,
    pub is_exported: Option<bool>,
    pub context_len: usize,
}

impl Chunk {
    /// The chunk's own source text, without inlined imports
    pub fn source(&self) -> &str {
        self.content.get(self.context_len..).unwrap_or(&self.content)
    }

    /// Declaration kind with any `_partial` suffix removed
    pub fn base_kind(&self) -> &str {
        self.node_type
            .strip_suffix("_partial")
            .unwrap_or(&self.node_type)
    }

    pub fn is_partial(&self) -> bool {
        self.node_type.ends_with("_partial")
    }
}

/// Chunking parameters
#[derive(Debug, Clone, Copy)]
pub struct ChunkOptions {
    pub max_tokens: usize,
    pub inline_imports: bool,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            inline_imports: false,
        }
    }
}

/// Splits files into [`Chunk`]s
pub struct Chunker {
    pool: Arc<ParserPool>,
    counter: Arc<dyn TokenCounter>,
}

/// Classified top-level declaration
struct Declaration<'t> {
    /// The node as it appears at top level (wrapper included)
    outer: SyntaxNode<'t>,
    /// The unwrapped declaration
    inner: SyntaxNode<'t>,
    role: SyntaxRole,
    exported_by_wrapper: bool,
}

/// Attributes shared by every chunk cut from one declaration
struct ChunkTemplate {
    kind: String,
    name: Option<String>,
    parent_name: Option<String>,
    role: SyntaxRole,
    is_exported: Option<bool>,
}

struct Emitter<'a> {
    source: &'a str,
    language: String,
    prefix: String,
    chunks: Vec<Chunk>,
}

impl<'a> Emitter<'a> {
    fn push(
        &mut self,
        text: &str,
        tokens: usize,
        start_byte: usize,
        start_line: usize,
        template: &ChunkTemplate,
        node_type: String,
    ) {
        let line_count = text.trim_end_matches('\n').matches('\n').count();
        let content = format!("{}{}", self.prefix, text);

        self.chunks.push(Chunk {
            content,
            token_count: tokens,
            start_line,
            end_line: start_line + line_count,
            start_byte,
            end_byte: start_byte + text.len(),
            language: self.language.clone(),
            node_type,
            name: template.name.clone(),
            parent_name: template.parent_name.clone(),
            is_import: template.role == SyntaxRole::Import,
            is_function: template.role.is_function_like(),
            is_class: template.role.is_class_like(),
            is_exported: template.is_exported,
            context_len: self.prefix.len(),
        });
    }

    fn text_of(&self, node: SyntaxNode<'_>) -> &'a str {
        self.source.get(node.byte_range()).unwrap_or_default()
    }
}

impl Chunker {
    pub fn new(pool: Arc<ParserPool>, counter: Arc<dyn TokenCounter>) -> Self {
        Self { pool, counter }
    }

    pub fn token_counter(&self) -> &dyn TokenCounter {
        self.counter.as_ref()
    }

    /// Chunk one file
    pub fn chunk_file(
        &self,
        content: &str,
        language: &SourceLanguage,
        options: &ChunkOptions,
    ) -> Result<Vec<Chunk>> {
        match language {
            SourceLanguage::Grammar(lang) => self.chunk_syntax(content, *lang, options),
            SourceLanguage::Text(name) => Ok(self.chunk_lines(content, name, options)),
        }
    }

    fn chunk_lines(&self, content: &str, language: &str, options: &ChunkOptions) -> Vec<Chunk> {
        let mut emitter = Emitter {
            source: content,
            language: language.to_string(),
            prefix: String::new(),
            chunks: Vec::new(),
        };
        let template = ChunkTemplate {
            kind: LINES_NODE_TYPE.to_string(),
            name: None,
            parent_name: None,
            role: SyntaxRole::Declaration,
            is_exported: None,
        };

        self.split_lines(&mut emitter, content, 0, 1, &template, LINES_NODE_TYPE, options);
        emitter.chunks
    }

    fn chunk_syntax(
        &self,
        content: &str,
        language: Language,
        options: &ChunkOptions,
    ) -> Result<Vec<Chunk>> {
        let tree = self.pool.parse(language, content)?;
        let spec = language.spec();
        let root = tree.root_node();

        let mut declarations = Vec::new();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            if let Some(decl) = classify(spec, child) {
                declarations.push(decl);
            }
        }

        let mut emitter = Emitter {
            source: content,
            language: language.to_string(),
            prefix: String::new(),
            chunks: Vec::new(),
        };

        let imports: Vec<&Declaration> = declarations
            .iter()
            .filter(|d| d.role == SyntaxRole::Import)
            .collect();

        if let (Some(first), Some(last)) = (imports.first(), imports.last()) {
            let text = imports
                .iter()
                .map(|d| emitter.text_of(d.outer))
                .collect::<Vec<_>>()
                .join("\n");

            if options.inline_imports {
                emitter.prefix = format!("{}\n", text);
            } else {
                let tokens = self.counter.count(&text);
                emitter.chunks.push(Chunk {
                    token_count: tokens,
                    start_line: first.outer.start_position().row + 1,
                    end_line: last.outer.end_position().row + 1,
                    start_byte: first.outer.start_byte(),
                    end_byte: last.outer.end_byte(),
                    language: language.to_string(),
                    node_type: IMPORTS_NODE_TYPE.to_string(),
                    name: None,
                    parent_name: None,
                    is_import: true,
                    is_function: false,
                    is_class: false,
                    is_exported: None,
                    context_len: 0,
                    content: text,
                });
            }
        }

        for decl in declarations.iter().filter(|d| d.role != SyntaxRole::Import) {
            self.chunk_declaration(&mut emitter, spec, decl, options);
        }

        Ok(emitter.chunks)
    }

    fn chunk_declaration(
        &self,
        emitter: &mut Emitter<'_>,
        spec: &LanguageSpec,
        decl: &Declaration<'_>,
        options: &ChunkOptions,
    ) {
        let source = emitter.source;
        let text = emitter.text_of(decl.outer);
        let tokens = self.counter.count(text);
        let name = declaration_name(spec, decl.inner, source);
        let is_exported = decl.exported_by_wrapper
            || spec.is_exported(first_code_line(text), name.as_deref());

        let template = ChunkTemplate {
            kind: decl.inner.kind().to_string(),
            name,
            parent_name: None,
            role: decl.role,
            is_exported: Some(is_exported),
        };

        if tokens <= options.max_tokens {
            emitter.push(
                text,
                tokens,
                decl.outer.start_byte(),
                decl.outer.start_position().row + 1,
                &template,
                template.kind.clone(),
            );
            return;
        }

        if decl.role.is_class_like() {
            let mut methods = Vec::new();
            collect_methods(spec, decl.inner, &mut methods);

            if !methods.is_empty() {
                tracing::debug!(
                    "Splitting {} {:?} into {} methods",
                    template.kind,
                    template.name,
                    methods.len()
                );
                for method in methods {
                    self.chunk_method(emitter, spec, method, template.name.clone(), options);
                }
                return;
            }
        }

        self.split_lines(
            emitter,
            text,
            decl.outer.start_byte(),
            decl.outer.start_position().row + 1,
            &template,
            &format!("{}_partial", template.kind),
            options,
        );
    }

    fn chunk_method(
        &self,
        emitter: &mut Emitter<'_>,
        spec: &LanguageSpec,
        method: SyntaxNode<'_>,
        parent_name: Option<String>,
        options: &ChunkOptions,
    ) {
        let text = emitter.text_of(method);
        let tokens = self.counter.count(text);
        let name = declaration_name(spec, method, emitter.source);
        let is_exported = spec.is_exported(first_code_line(text), name.as_deref());

        let template = ChunkTemplate {
            kind: method.kind().to_string(),
            name,
            parent_name,
            role: SyntaxRole::Method,
            is_exported: Some(is_exported),
        };

        if tokens <= options.max_tokens {
            emitter.push(
                text,
                tokens,
                method.start_byte(),
                method.start_position().row + 1,
                &template,
                template.kind.clone(),
            );
        } else {
            self.split_lines(
                emitter,
                text,
                method.start_byte(),
                method.start_position().row + 1,
                &template,
                &format!("{}_partial", template.kind),
                options,
            );
        }
    }

    /// Accumulate lines until the next one would exceed the budget.
    ///
    /// A single line above budget becomes a chunk on its own. The emitted
    /// windows tile `text` exactly.
    #[allow(clippy::too_many_arguments)]
    fn split_lines(
        &self,
        emitter: &mut Emitter<'_>,
        text: &str,
        start_byte: usize,
        start_line: usize,
        template: &ChunkTemplate,
        node_type: &str,
        options: &ChunkOptions,
    ) {
        let mut window_start = 0;
        let mut window_len = 0;
        let mut window_tokens = 0;
        let mut window_line = start_line;
        let mut line_no = start_line;

        for line in text.split_inclusive('\n') {
            let line_tokens = self.counter.count(line);

            if window_len > 0 && window_tokens + line_tokens > options.max_tokens {
                emitter.push(
                    &text[window_start..window_start + window_len],
                    window_tokens,
                    start_byte + window_start,
                    window_line,
                    template,
                    node_type.to_string(),
                );
                window_start += window_len;
                window_len = 0;
                window_tokens = 0;
                window_line = line_no;
            }

            window_len += line.len();
            window_tokens += line_tokens;
            line_no += 1;
        }

        if window_len > 0 {
            emitter.push(
                &text[window_start..window_start + window_len],
                window_tokens,
                start_byte + window_start,
                window_line,
                template,
                node_type.to_string(),
            );
        }
    }
}

/// Byte range and 1-based start line of every top-level import statement
pub fn import_spans(language: Language, root: SyntaxNode<'_>) -> Vec<(Range<usize>, usize)> {
    let spec = language.spec();
    let mut cursor = root.walk();
    let spans = root
        .named_children(&mut cursor)
        .filter_map(|child| classify(spec, child))
        .filter(|decl| decl.role == SyntaxRole::Import)
        .map(|decl| (decl.outer.byte_range(), decl.outer.start_position().row + 1))
        .collect();
    spans
}

/// Classify a direct child of the root, unwrapping wrapper kinds
fn classify<'t>(spec: &LanguageSpec, node: SyntaxNode<'t>) -> Option<Declaration<'t>> {
    let kind = node.kind();

    if let Some(wrapper) = spec.wrapper(kind) {
        // `export ... from '...'` re-exports behave like imports
        if node.child_by_field_name("source").is_some() {
            return Some(Declaration {
                outer: node,
                inner: node,
                role: SyntaxRole::Import,
                exported_by_wrapper: false,
            });
        }

        let inner = node
            .child_by_field_name(wrapper.field)
            .or_else(|| node.child_by_field_name("value"))
            .unwrap_or(node);
        let role = if inner.id() == node.id() {
            SyntaxRole::Declaration
        } else {
            role_of(spec, inner).unwrap_or(SyntaxRole::Declaration)
        };

        return Some(Declaration {
            outer: node,
            inner,
            role,
            exported_by_wrapper: wrapper.exports,
        });
    }

    let role = role_of(spec, node)?;
    Some(Declaration {
        outer: node,
        inner: node,
        role,
        exported_by_wrapper: false,
    })
}

fn role_of(spec: &LanguageSpec, node: SyntaxNode<'_>) -> Option<SyntaxRole> {
    let role = spec.role(node.kind())?;
    if role == SyntaxRole::Declaration && has_function_value(spec, node) {
        return Some(SyntaxRole::Function);
    }
    Some(role)
}

/// `const f = () => ...` and friends
fn has_function_value(spec: &LanguageSpec, node: SyntaxNode<'_>) -> bool {
    if spec.function_values.is_empty() {
        return false;
    }

    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).any(|declarator| {
        declarator
            .child_by_field_name("value")
            .is_some_and(|value| spec.function_values.contains(&value.kind()))
    });
    found
}

/// Best-effort identifier of a declaration
pub(crate) fn declaration_name(
    spec: &LanguageSpec,
    node: SyntaxNode<'_>,
    source: &str,
) -> Option<String> {
    direct_name(spec, node, source).or_else(|| {
        let mut cursor = node.walk();
        let children: Vec<_> = node.named_children(&mut cursor).collect();
        children
            .into_iter()
            .find_map(|child| direct_name(spec, child, source))
    })
}

fn direct_name(spec: &LanguageSpec, node: SyntaxNode<'_>, source: &str) -> Option<String> {
    for field in spec.name_fields {
        if let Some(named) = node.child_by_field_name(field) {
            if let Some(text) = source.get(named.byte_range()) {
                return Some(text.to_string());
            }
        }
    }

    let mut cursor = node.walk();
    let identifier = node.named_children(&mut cursor).find(|child| {
        matches!(
            child.kind(),
            "identifier" | "type_identifier" | "property_identifier" | "field_identifier"
        )
    });
    identifier.and_then(|n| source.get(n.byte_range()).map(str::to_string))
}

/// Method-like descendants, not descending into methods themselves
fn collect_methods<'t>(spec: &LanguageSpec, node: SyntaxNode<'t>, out: &mut Vec<SyntaxNode<'t>>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if spec.is_method(child.kind()) {
            out.push(child);
        } else {
            collect_methods(spec, child, out);
        }
    }
}

/// First non-blank line that is neither a comment nor an attribute/decorator
pub fn first_code_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|line| {
            !line.is_empty()
                && !line.starts_with("//")
                && !line.starts_with("/*")
                && !line.starts_with('*')
                && !line.starts_with('#')
                && !line.starts_with('@')
        })
        .unwrap_or_default()
}
