//! # lspmap
//!
//! Symbol knowledge graphs from language servers.
//!
//! lspmap walks a source tree, asks one language server per language for
//! each file's symbol outline, and records every symbol as a node linked
//! from its file by a "defines" edge. The result is written as a node-link
//! JSON document.
//!
//! ## Key Features
//!
//! - **Engine-driven**: symbols come from real language servers over stdio
//! - **Degrades gracefully**: a broken engine never stops the run
//! - **Fallback extraction**: pattern-based symbols for JavaScript/TypeScript
//! - **Configurable**: language table and timeouts from `lspmap.toml`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lspmap::{map_directory, Config};
//! use std::path::Path;
//!
//! let root = Path::new(".");
//! let config = Config::discover(root)?;
//! let (graph, summary) = map_directory(root, config)?;
//! graph.save(Path::new("knowledge_map.json"))?;
//! println!("{}", summary);
//! # Ok::<(), lspmap::LspMapError>(())
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod protocol;
pub mod session;
pub mod uri;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use config::{Config, FallbackKind, LanguageConfig, Tunables, CONFIG_FILE_NAME, DEFAULT_OUTPUT};
pub use error::{LspMapError, Result};

pub use graph::{EdgeKind, GraphStats, KnowledgeGraph, NodeData, NodeLinkDocument, SymbolKind};
pub use ingest::{map_directory, FileOutcome, RunSummary, SymbolIngestor};
pub use protocol::ProtocolClient;
pub use session::{SessionManager, SessionStats};
