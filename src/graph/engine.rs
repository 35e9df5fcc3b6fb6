//! Knowledge graph engine backed by petgraph.
//!
//! File and symbol nodes are keyed by their string id; an index map keeps
//! upserts O(1) and guarantees each id exists once.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;
use std::path::Path;

use super::types::{EdgeKind, GraphStats, NodeData, SymbolKind};

/// Separator between file path and symbol name in node ids.
pub const ID_SEPARATOR: &str = "::";

/// Id of the symbol node for `name` declared in `file_path`.
pub fn symbol_id(file_path: &str, name: &str) -> String {
    format!("{}{}{}", file_path, ID_SEPARATOR, name)
}

/// Directed graph of files and the symbols they define.
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    graph: DiGraph<NodeData, EdgeKind>,
    index: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `file_path` defines a symbol `name` of `kind`.
    ///
    /// Idempotent per `(name, file_path)`: a repeat updates the symbol's
    /// attributes and never duplicates nodes or the "defines" edge.
    pub fn add_node(&mut self, name: &str, file_path: &str, kind: SymbolKind) -> NodeIndex {
        let file_idx = self.upsert_file(file_path);

        let data = NodeData {
            id: symbol_id(file_path, name),
            label: name.to_string(),
            kind,
            file_path: Some(file_path.to_string()),
        };
        let symbol_idx = self.upsert(data);

        self.graph.update_edge(file_idx, symbol_idx, EdgeKind::Defines);
        symbol_idx
    }

    fn upsert_file(&mut self, file_path: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(file_path) {
            return idx;
        }
        let label = Path::new(file_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.to_string());
        self.upsert(NodeData {
            id: file_path.to_string(),
            label,
            kind: SymbolKind::File,
            file_path: None,
        })
    }

    fn upsert(&mut self, data: NodeData) -> NodeIndex {
        match self.index.get(&data.id) {
            Some(&idx) => {
                self.graph[idx] = data;
                idx
            }
            None => {
                let id = data.id.clone();
                let idx = self.graph.add_node(data);
                self.index.insert(id, idx);
                idx
            }
        }
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&NodeData> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// All nodes, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeData> {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    /// All edges as `(source, target, kind)`, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&NodeData, &NodeData, EdgeKind)> {
        self.graph
            .edge_references()
            .map(move |e| (&self.graph[e.source()], &self.graph[e.target()], *e.weight()))
    }

    /// Symbols defined by `file_path`.
    pub fn symbols_in(&self, file_path: &str) -> Vec<&NodeData> {
        let Some(&file_idx) = self.index.get(file_path) else {
            return Vec::new();
        };
        let mut symbols: Vec<(NodeIndex, &NodeData)> = self
            .graph
            .edges_directed(file_idx, Direction::Outgoing)
            .filter(|e| *e.weight() == EdgeKind::Defines)
            .map(|e| (e.target(), &self.graph[e.target()]))
            .collect();
        symbols.sort_by_key(|(idx, _)| *idx);
        symbols.into_iter().map(|(_, data)| data).collect()
    }

    /// Number of incoming "defines" edges of a node.
    pub fn defined_by_count(&self, id: &str) -> usize {
        self.index.get(id).map_or(0, |&idx| {
            self.graph
                .edges_directed(idx, Direction::Incoming)
                .filter(|e| *e.weight() == EdgeKind::Defines)
                .count()
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn stats(&self) -> GraphStats {
        let file_count = self.nodes().filter(|n| n.is_file()).count();
        GraphStats {
            file_count,
            symbol_count: self.node_count() - file_count,
            edge_count: self.edge_count(),
        }
    }
}
