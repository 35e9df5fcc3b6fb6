//! Graph module — the knowledge graph of files and their symbols.
//!
//! Nodes are files and symbols; every symbol hangs off exactly one file
//! through a "defines" edge. The graph only grows during a run and is
//! written once, as a node-link JSON document.

pub mod engine;
pub mod persistence;
pub mod types;

pub use engine::{symbol_id, KnowledgeGraph, ID_SEPARATOR};
pub use persistence::{LinkEntry, NodeEntry, NodeLinkDocument};
pub use types::{EdgeKind, GraphStats, NodeData, SymbolKind};
