//! Structural graph model
//!
//! Typed nodes (modules, functions, classes, interfaces, packages) and the
//! relationships between them. Ids are pure functions of path, type and name,
//! so re-extracting unchanged code yields identical records.

pub mod extractor;
pub mod imports;
pub mod relations;

pub use extractor::{ExtractContext, FileGraph, GraphExtractor};
pub use imports::{ImportForm, ParsedImport};

use serde::{Deserialize, Serialize};

/// Kind of structural node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Module,
    Function,
    Class,
    Interface,
    Package,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Module => "module",
            NodeType::Function => "function",
            NodeType::Class => "class",
            NodeType::Interface => "interface",
            NodeType::Package => "package",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "module" => Some(NodeType::Module),
            "function" => Some(NodeType::Function),
            "class" => Some(NodeType::Class),
            "interface" => Some(NodeType::Interface),
            "package" => Some(NodeType::Package),
            _ => None,
        }
    }

    /// Whether nodes of this type carry a vector in the semantic index
    pub fn is_indexable(&self) -> bool {
        matches!(
            self,
            NodeType::Function | NodeType::Class | NodeType::Interface
        )
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Imports,
    DependsOn,
    Calls,
    Extends,
    Implements,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Imports => "imports",
            EdgeType::DependsOn => "depends_on",
            EdgeType::Calls => "calls",
            EdgeType::Extends => "extends",
            EdgeType::Implements => "implements",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "imports" => Some(EdgeType::Imports),
            "depends_on" => Some(EdgeType::DependsOn),
            "calls" => Some(EdgeType::Calls),
            "extends" => Some(EdgeType::Extends),
            "implements" => Some(EdgeType::Implements),
            _ => None,
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How confidently an edge target names a real node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Target is a node of the same pass or a known project file's module
    Resolved,
    /// Target id was synthesized from a name
    Speculative,
    /// Target is an external package
    External,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Resolved => "resolved",
            Resolution::Speculative => "speculative",
            Resolution::External => "external",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "resolved" => Some(Resolution::Resolved),
            "speculative" => Some(Resolution::Speculative),
            "external" => Some(Resolution::External),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub language: String,
    #[serde(default)]
    pub is_exported: bool,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exported_symbols: Vec<String>,
    /// Enclosing class for methods split out of an oversize class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_generated_by: Option<String>,
}

/// A persisted structural entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub node_type: NodeType,
    pub name: String,
    /// Empty for package nodes
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub signature: Option<String>,
    pub summary: Option<String>,
    pub metadata: NodeMetadata,
}

impl Node {
    pub fn is_indexable(&self) -> bool {
        self.node_type.is_indexable()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imported_symbols: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Import specifier as written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_namespace: bool,
}

/// A typed relationship between two node ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub from_node: String,
    pub to_node: String,
    pub edge_type: EdgeType,
    pub resolution: Resolution,
    pub metadata: EdgeMetadata,
}

impl Edge {
    pub fn new(from_node: &str, edge_type: EdgeType, to_node: &str, resolution: Resolution) -> Self {
        Self {
            id: edge_id(from_node, edge_type, to_node),
            from_node: from_node.to_string(),
            to_node: to_node.to_string(),
            edge_type,
            resolution,
            metadata: EdgeMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: EdgeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.from_node == node_id || self.to_node == node_id
    }
}

/// `file_path:type:name`
pub fn node_id(file_path: &str, node_type: NodeType, name: &str) -> String {
    format!("{}:{}:{}", file_path, node_type, name)
}

/// `file_path:module`
pub fn module_id(file_path: &str) -> String {
    format!("{}:module", file_path)
}

/// `pkg:name`
pub fn package_id(name: &str) -> String {
    format!("pkg:{}", name)
}

/// `from:edge_type:to`
pub fn edge_id(from_node: &str, edge_type: EdgeType, to_node: &str) -> String {
    format!("{}:{}:{}", from_node, edge_type, to_node)
}
