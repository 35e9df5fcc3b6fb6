//! Graph persistence — node-link JSON export and import.
//!
//! The document is built by iterating nodes and edges directly, so its
//! shape is fixed by the types below rather than by any graph library:
//!
//! ```json
//! {
//!   "directed": true,
//!   "multigraph": false,
//!   "graph": {},
//!   "nodes": [{"id": "a.ts", "label": "a.ts", "type": "File"},
//!             {"id": "a.ts::Foo", "label": "Foo", "type": "Class", "filepath": "a.ts"}],
//!   "links": [{"source": "a.ts", "target": "a.ts::Foo", "relation": "defines"}]
//! }
//! ```
//!
//! Writes are atomic (write to .tmp, then rename).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use super::engine::KnowledgeGraph;
use super::types::SymbolKind;
use crate::error::{LspMapError, Result};

/// Portable node-link representation of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLinkDocument {
    pub directed: bool,
    pub multigraph: bool,
    #[serde(default)]
    pub graph: Map<String, Value>,
    pub nodes: Vec<NodeEntry>,
    pub links: Vec<LinkEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub source: String,
    pub target: String,
    pub relation: String,
}

impl KnowledgeGraph {
    /// Build the node-link document from the current nodes and edges.
    pub fn to_node_link(&self) -> NodeLinkDocument {
        let nodes = self
            .nodes()
            .map(|n| NodeEntry {
                id: n.id.clone(),
                label: n.label.clone(),
                kind: n.kind.label().to_string(),
                filepath: n.file_path.clone(),
            })
            .collect();

        let links = self
            .edges()
            .map(|(source, target, kind)| LinkEntry {
                source: source.id.clone(),
                target: target.id.clone(),
                relation: kind.label().to_string(),
            })
            .collect();

        NodeLinkDocument {
            directed: true,
            multigraph: false,
            graph: Map::new(),
            nodes,
            links,
        }
    }

    /// Rebuild a graph from a node-link document.
    ///
    /// Symbol entries are replayed through `add_node`, which recreates their
    /// file nodes and "defines" edges.
    pub fn from_node_link(doc: &NodeLinkDocument) -> Self {
        let mut graph = Self::new();
        for entry in &doc.nodes {
            if let Some(file_path) = &entry.filepath {
                graph.add_node(&entry.label, file_path, SymbolKind::from_label(&entry.kind));
            }
        }
        graph
    }

    /// Save the graph as pretty-printed node-link JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "saving graph");

        let doc = self.to_node_link();
        let bytes = serde_json::to_vec_pretty(&doc)
            .map_err(|e| LspMapError::SerializeError(e.to_string()))?;

        let tmp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;

        let stats = self.stats();
        debug!(
            bytes = bytes.len(),
            files = stats.file_count,
            symbols = stats.symbol_count,
            edges = stats.edge_count,
            "graph saved"
        );
        Ok(())
    }

    /// Load a graph from a node-link JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "loading graph");

        let bytes = fs::read(path)?;
        let doc: NodeLinkDocument = serde_json::from_slice(&bytes)
            .map_err(|e| LspMapError::ParseError(format!("{}: {}", path.display(), e)))?;

        Ok(Self::from_node_link(&doc))
    }
}
