//! Shared tree-sitter parser pool
//!
//! One parser per language, created on first use. Each slot is guarded by a
//! `OnceLock`, so concurrent first calls load a grammar exactly once.

use super::language::Language;
use anyhow::{anyhow, Context, Result};
use std::sync::{Mutex, OnceLock};
use tree_sitter::{Parser, Tree};

type Slot = OnceLock<Result<Mutex<Parser>, String>>;

/// Lazily initialized parsers, one per [`Language`]
pub struct ParserPool {
    slots: [Slot; Language::ALL.len()],
}

impl ParserPool {
    /// Create an empty pool; grammars load on first parse
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| OnceLock::new()),
        }
    }

    /// Parse `text` with the grammar for `language`
    pub fn parse(&self, language: Language, text: &str) -> Result<Tree> {
        let parser = self
            .slot(language)
            .get_or_init(|| Self::create_parser(language))
            .as_ref()
            .map_err(|e| anyhow!("{}", e))?;

        let mut parser = parser
            .lock()
            .map_err(|_| anyhow!("Parser lock poisoned for {}", language))?;

        parser
            .parse(text, None)
            .with_context(|| format!("Failed to parse {} source", language))
    }

    /// Whether the grammar for `language` has been loaded
    pub fn is_loaded(&self, language: Language) -> bool {
        matches!(self.slot(language).get(), Some(Ok(_)))
    }

    fn slot(&self, language: Language) -> &Slot {
        let index = Language::ALL
            .iter()
            .position(|l| *l == language)
            .unwrap_or_default();
        &self.slots[index]
    }

    fn create_parser(language: Language) -> Result<Mutex<Parser>, String> {
        tracing::debug!("Loading {} grammar", language);

        let mut parser = Parser::new();
        parser
            .set_language(&language.tree_sitter_language())
            .map_err(|e| format!("Failed to set {} language: {}", language, e))?;

        Ok(Mutex::new(parser))
    }
}

impl Default for ParserPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_parse_each_language() {
        let pool = ParserPool::new();
        let samples = [
            (Language::TypeScript, "export function a(x: number) { return x; }"),
            (Language::Tsx, "const A = () => <div />;"),
            (Language::JavaScript, "function a() {}"),
            (Language::Python, "def a():\n    pass\n"),
            (Language::Rust, "fn a() {}"),
            (Language::Go, "package main\nfunc a() {}\n"),
            (Language::Java, "class A { void a() {} }"),
        ];

        for (language, source) in samples {
            let tree = pool.parse(language, source).unwrap();
            assert!(tree.root_node().child_count() > 0, "{} produced no nodes", language);
            assert!(pool.is_loaded(language));
        }
    }

    #[test]
    fn test_grammar_loads_lazily() {
        let pool = ParserPool::new();
        assert!(!pool.is_loaded(Language::Go));
        pool.parse(Language::Rust, "fn main() {}").unwrap();
        assert!(pool.is_loaded(Language::Rust));
        assert!(!pool.is_loaded(Language::Go));
    }

    #[test]
    fn test_concurrent_first_use() {
        let pool = Arc::new(ParserPool::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    let source = format!("def f{}():\n    return {}\n", i, i);
                    pool.parse(Language::Python, &source).unwrap().root_node().kind().to_string()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "module");
        }
    }

    #[test]
    fn test_malformed_source_still_parses() {
        let pool = ParserPool::new();
        let tree = pool.parse(Language::TypeScript, "function (((( {").unwrap();
        assert!(tree.root_node().has_error());
    }
}
