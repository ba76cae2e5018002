//! Per-language relationship detectors
//!
//! Call and heritage detection is looked up through a static table keyed by
//! [`Language`]; each entry names the call node kinds and the functions that
//! read callee names and heritage clauses.

use crate::extract::language::Language;
use tree_sitter::Node as SyntaxNode;

/// Inheritance found on a class-like declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Heritage {
    pub extends: Option<String>,
    pub implements: Vec<String>,
    /// Whether the declaration itself is interface-like (its `extends` target
    /// is then an interface)
    pub is_interface: bool,
}

/// A call site inside a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub callee: String,
    /// 0-based row within the parsed text
    pub row: usize,
}

pub struct RelationDetectors {
    pub language: Language,
    pub call_kinds: &'static [&'static str],
    pub callee: fn(SyntaxNode<'_>, &str) -> Option<String>,
    pub heritage: fn(SyntaxNode<'_>, &str) -> Option<Heritage>,
}

static DETECTORS: [RelationDetectors; 7] = [
    RelationDetectors {
        language: Language::TypeScript,
        call_kinds: &["call_expression", "new_expression"],
        callee: ecma_callee,
        heritage: typescript_heritage,
    },
    RelationDetectors {
        language: Language::Tsx,
        call_kinds: &["call_expression", "new_expression"],
        callee: ecma_callee,
        heritage: typescript_heritage,
    },
    RelationDetectors {
        language: Language::JavaScript,
        call_kinds: &["call_expression", "new_expression"],
        callee: ecma_callee,
        heritage: javascript_heritage,
    },
    RelationDetectors {
        language: Language::Python,
        call_kinds: &["call"],
        callee: field_callee,
        heritage: python_heritage,
    },
    RelationDetectors {
        language: Language::Rust,
        call_kinds: &["call_expression"],
        callee: field_callee,
        heritage: rust_heritage,
    },
    RelationDetectors {
        language: Language::Go,
        call_kinds: &["call_expression"],
        callee: field_callee,
        heritage: no_heritage,
    },
    RelationDetectors {
        language: Language::Java,
        call_kinds: &["method_invocation", "object_creation_expression"],
        callee: java_callee,
        heritage: java_heritage,
    },
];

/// Detector entry for `language`
pub fn detectors(language: Language) -> &'static RelationDetectors {
    DETECTORS
        .iter()
        .find(|d| d.language == language)
        .unwrap_or(&DETECTORS[0])
}

impl RelationDetectors {
    /// Every call site under `root`, in source order
    pub fn calls(&self, root: SyntaxNode<'_>, source: &str) -> Vec<CallSite> {
        let mut sites = Vec::new();
        let mut stack = vec![root];

        while let Some(node) = stack.pop() {
            if self.call_kinds.contains(&node.kind()) {
                if let Some(callee) = (self.callee)(node, source) {
                    sites.push(CallSite {
                        callee,
                        row: node.start_position().row,
                    });
                }
            }

            let mut cursor = node.walk();
            let children: Vec<_> = node.named_children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }

        sites
    }

    /// Heritage of the first class-like declaration under `root`
    pub fn heritage(&self, root: SyntaxNode<'_>, source: &str) -> Option<Heritage> {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if let Some(heritage) = (self.heritage)(node, source) {
                return Some(heritage);
            }
            let mut cursor = node.walk();
            let children: Vec<_> = node.named_children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
        None
    }
}

fn text<'s>(node: SyntaxNode<'_>, source: &'s str) -> Option<&'s str> {
    source.get(node.byte_range())
}

/// Trailing name of a callee expression.
///
/// Member-style access yields the accessed property; anything else descends
/// into the first named child until an identifier turns up.
fn trailing_name(node: SyntaxNode<'_>, source: &str) -> Option<String> {
    let field = match node.kind() {
        "identifier" | "property_identifier" | "field_identifier" | "type_identifier"
        | "private_property_identifier" => {
            return text(node, source).map(str::to_string);
        }
        "member_expression" => "property",
        "attribute" => "attribute",
        "selector_expression" => "field",
        "field_expression" => "field",
        "scoped_identifier" => "name",
        "generic_function" => "function",
        "generic_type" | "scoped_type_identifier" => "name",
        _ => "",
    };

    if !field.is_empty() {
        if let Some(child) = node.child_by_field_name(field) {
            return trailing_name(child, source);
        }
    }

    node.named_child(0)
        .and_then(|child| trailing_name(child, source))
}

fn field_callee(node: SyntaxNode<'_>, source: &str) -> Option<String> {
    let function = node.child_by_field_name("function")?;
    trailing_name(function, source)
}

fn ecma_callee(node: SyntaxNode<'_>, source: &str) -> Option<String> {
    let target = node
        .child_by_field_name("function")
        .or_else(|| node.child_by_field_name("constructor"))?;
    trailing_name(target, source)
}

fn java_callee(node: SyntaxNode<'_>, source: &str) -> Option<String> {
    let target = node
        .child_by_field_name("name")
        .or_else(|| node.child_by_field_name("type"))?;
    trailing_name(target, source)
}

fn named_children(node: SyntaxNode<'_>) -> Vec<SyntaxNode<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn type_names(node: SyntaxNode<'_>, source: &str) -> Vec<String> {
    named_children(node)
        .into_iter()
        .filter_map(|child| trailing_name(child, source))
        .collect()
}

fn typescript_heritage(node: SyntaxNode<'_>, source: &str) -> Option<Heritage> {
    match node.kind() {
        "class_declaration" | "abstract_class_declaration" | "class" => {
            let mut heritage = Heritage::default();
            let clauses = named_children(node)
                .into_iter()
                .find(|c| c.kind() == "class_heritage");

            for clause in clauses.map(named_children).unwrap_or_default() {
                match clause.kind() {
                    "extends_clause" => {
                        heritage.extends = clause
                            .child_by_field_name("value")
                            .or_else(|| clause.named_child(0))
                            .and_then(|value| trailing_name(value, source));
                    }
                    "implements_clause" => {
                        heritage.implements.extend(type_names(clause, source));
                    }
                    _ => {}
                }
            }
            Some(heritage)
        }
        "interface_declaration" => {
            let extends = named_children(node)
                .into_iter()
                .find(|c| c.kind() == "extends_type_clause")
                .and_then(|clause| type_names(clause, source).into_iter().next());
            Some(Heritage {
                extends,
                implements: Vec::new(),
                is_interface: true,
            })
        }
        _ => None,
    }
}

fn javascript_heritage(node: SyntaxNode<'_>, source: &str) -> Option<Heritage> {
    if !matches!(node.kind(), "class_declaration" | "class") {
        return None;
    }

    let extends = named_children(node)
        .into_iter()
        .find(|c| c.kind() == "class_heritage")
        .and_then(|clause| clause.named_child(0))
        .and_then(|value| trailing_name(value, source));

    Some(Heritage {
        extends,
        ..Heritage::default()
    })
}

fn python_heritage(node: SyntaxNode<'_>, source: &str) -> Option<Heritage> {
    if node.kind() != "class_definition" {
        return None;
    }

    let bases: Vec<String> = node
        .child_by_field_name("superclasses")
        .map(named_children)
        .unwrap_or_default()
        .into_iter()
        .filter(|arg| matches!(arg.kind(), "identifier" | "attribute"))
        .filter_map(|arg| trailing_name(arg, source))
        .collect();

    let mut bases = bases.into_iter();
    Some(Heritage {
        extends: bases.next(),
        implements: bases.collect(),
        is_interface: false,
    })
}

fn rust_heritage(node: SyntaxNode<'_>, source: &str) -> Option<Heritage> {
    match node.kind() {
        "impl_item" => Some(Heritage {
            extends: None,
            implements: node
                .child_by_field_name("trait")
                .and_then(|t| trailing_name(t, source))
                .into_iter()
                .collect(),
            is_interface: false,
        }),
        "trait_item" => Some(Heritage {
            extends: node
                .child_by_field_name("bounds")
                .and_then(|bounds| type_names(bounds, source).into_iter().next()),
            implements: Vec::new(),
            is_interface: true,
        }),
        "struct_item" | "enum_item" | "union_item" => Some(Heritage::default()),
        _ => None,
    }
}

fn java_heritage(node: SyntaxNode<'_>, source: &str) -> Option<Heritage> {
    match node.kind() {
        "class_declaration" | "enum_declaration" | "record_declaration" => {
            let extends = node
                .child_by_field_name("superclass")
                .and_then(|s| s.named_child(0))
                .and_then(|t| trailing_name(t, source));

            let implements = node
                .child_by_field_name("interfaces")
                .map(|interfaces| {
                    named_children(interfaces)
                        .into_iter()
                        .flat_map(|list| type_names(list, source))
                        .collect()
                })
                .unwrap_or_default();

            Some(Heritage {
                extends,
                implements,
                is_interface: false,
            })
        }
        "interface_declaration" => {
            let extends = named_children(node)
                .into_iter()
                .find(|c| c.kind() == "extends_interfaces")
                .and_then(|clause| named_children(clause).into_iter().next())
                .and_then(|list| type_names(list, source).into_iter().next());

            Some(Heritage {
                extends,
                implements: Vec::new(),
                is_interface: true,
            })
        }
        _ => None,
    }
}

fn no_heritage(_node: SyntaxNode<'_>, _source: &str) -> Option<Heritage> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ParserPool;

    fn calls(language: Language, source: &str) -> Vec<String> {
        let pool = ParserPool::new();
        let tree = pool.parse(language, source).unwrap();
        detectors(language)
            .calls(tree.root_node(), source)
            .into_iter()
            .map(|c| c.callee)
            .collect()
    }

    fn heritage(language: Language, source: &str) -> Option<Heritage> {
        let pool = ParserPool::new();
        let tree = pool.parse(language, source).unwrap();
        detectors(language).heritage(tree.root_node(), source)
    }

    #[test]
    fn test_call_names_per_language() {
        assert_eq!(
            calls(Language::TypeScript, "function f() { helper(); this.db.save(x); new Client(); }"),
            vec!["helper", "save", "Client"]
        );
        assert_eq!(
            calls(Language::Python, "def f():\n    run()\n    self.repo.fetch(1)\n"),
            vec!["run", "fetch"]
        );
        assert_eq!(
            calls(Language::Rust, "fn f() { parse(); self.store.flush(); Vec::<u8>::new(); }"),
            vec!["parse", "flush", "new"]
        );
        assert_eq!(
            calls(Language::Go, "package p\nfunc f() { fmt.Println(x); run() }\n"),
            vec!["Println", "run"]
        );
        assert_eq!(
            calls(Language::Java, "class A { void f() { repo.save(x); new Thing(); } }"),
            vec!["save", "Thing"]
        );
    }

    #[test]
    fn test_typescript_heritage() {
        let h = heritage(
            Language::TypeScript,
            "class Admin extends User implements Auditable, Serializable {}",
        )
        .unwrap();
        assert_eq!(h.extends.as_deref(), Some("User"));
        assert_eq!(h.implements, vec!["Auditable", "Serializable"]);

        let h = heritage(Language::TypeScript, "interface A extends B, C {}").unwrap();
        assert!(h.is_interface);
        assert_eq!(h.extends.as_deref(), Some("B"));
    }

    #[test]
    fn test_python_and_java_heritage() {
        let h = heritage(Language::Python, "class View(Base, Mixin, metaclass=Meta):\n    pass\n").unwrap();
        assert_eq!(h.extends.as_deref(), Some("Base"));
        assert_eq!(h.implements, vec!["Mixin"]);

        let h = heritage(
            Language::Java,
            "class Repo extends Base implements Store, Closeable {}",
        )
        .unwrap();
        assert_eq!(h.extends.as_deref(), Some("Base"));
        assert_eq!(h.implements, vec!["Store", "Closeable"]);
    }

    #[test]
    fn test_rust_heritage() {
        let h = heritage(Language::Rust, "impl Display for Report { }").unwrap();
        assert_eq!(h.implements, vec!["Display"]);
        assert!(h.extends.is_none());

        let h = heritage(Language::Rust, "trait Store: Send + Sync {}").unwrap();
        assert!(h.is_interface);
        assert_eq!(h.extends.as_deref(), Some("Send"));
    }

    #[test]
    fn test_javascript_heritage_and_go_none() {
        let h = heritage(Language::JavaScript, "class A extends mixins.Base {}").unwrap();
        assert_eq!(h.extends.as_deref(), Some("Base"));
        assert!(heritage(Language::Go, "package p\ntype T struct{}\n").is_none());
    }
}
