//! Graph types — node kinds, node payloads and statistics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a graph node, following the protocol's symbol kind codes.
///
/// Codes outside the known table map to [`SymbolKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    File,
    Module,
    Namespace,
    Package,
    Class,
    Method,
    Property,
    Field,
    Constructor,
    Enum,
    Interface,
    Function,
    Variable,
    Constant,
    String,
    Number,
    Boolean,
    Array,
    Unknown,
}

/// Known kinds in code order (code = index + 1).
const KNOWN_KINDS: [SymbolKind; 18] = [
    SymbolKind::File,
    SymbolKind::Module,
    SymbolKind::Namespace,
    SymbolKind::Package,
    SymbolKind::Class,
    SymbolKind::Method,
    SymbolKind::Property,
    SymbolKind::Field,
    SymbolKind::Constructor,
    SymbolKind::Enum,
    SymbolKind::Interface,
    SymbolKind::Function,
    SymbolKind::Variable,
    SymbolKind::Constant,
    SymbolKind::String,
    SymbolKind::Number,
    SymbolKind::Boolean,
    SymbolKind::Array,
];

impl SymbolKind {
    /// Map a protocol kind code to a kind.
    pub fn from_code(code: u64) -> Self {
        usize::try_from(code)
            .ok()
            .and_then(|c| c.checked_sub(1))
            .and_then(|i| KNOWN_KINDS.get(i).copied())
            .unwrap_or(SymbolKind::Unknown)
    }

    /// Human-readable label used in the exported graph.
    pub fn label(self) -> &'static str {
        match self {
            SymbolKind::File => "File",
            SymbolKind::Module => "Module",
            SymbolKind::Namespace => "Namespace",
            SymbolKind::Package => "Package",
            SymbolKind::Class => "Class",
            SymbolKind::Method => "Method",
            SymbolKind::Property => "Property",
            SymbolKind::Field => "Field",
            SymbolKind::Constructor => "Constructor",
            SymbolKind::Enum => "Enum",
            SymbolKind::Interface => "Interface",
            SymbolKind::Function => "Function",
            SymbolKind::Variable => "Variable",
            SymbolKind::Constant => "Constant",
            SymbolKind::String => "String",
            SymbolKind::Number => "Number",
            SymbolKind::Boolean => "Boolean",
            SymbolKind::Array => "Array",
            SymbolKind::Unknown => "Unknown",
        }
    }

    /// Inverse of [`SymbolKind::label`]; unrecognized labels are `Unknown`.
    pub fn from_label(label: &str) -> Self {
        KNOWN_KINDS
            .iter()
            .copied()
            .find(|k| k.label() == label)
            .unwrap_or(SymbolKind::Unknown)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Relationship between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// File → symbol it declares.
    Defines,
}

impl EdgeKind {
    pub fn label(self) -> &'static str {
        match self {
            EdgeKind::Defines => "defines",
        }
    }
}

/// Data stored on each graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// File path for file nodes, `<file>::<name>` for symbols.
    pub id: String,
    /// Symbol name, or the file's base name.
    pub label: String,
    pub kind: SymbolKind,
    /// Owning file; `None` on file nodes.
    pub file_path: Option<String>,
}

impl NodeData {
    pub fn is_file(&self) -> bool {
        self.file_path.is_none()
    }
}

/// Graph statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub file_count: usize,
    pub symbol_count: usize,
    pub edge_count: usize,
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files, {} symbols, {} edges",
            self.file_count, self.symbol_count, self.edge_count
        )
    }
}
