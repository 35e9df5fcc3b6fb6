//! Ingest module — turns a source tree into graph records.
//!
//! `walker` lists the files, `ingestor` drives the engines over them,
//! `symbols` flattens the outlines they return and `fallback` stands in
//! when no outline is available.

pub mod fallback;
pub mod ingestor;
pub mod symbols;
pub mod walker;

pub use ingestor::{map_directory, FileOutcome, RunSummary, SymbolIngestor};
pub use symbols::{flatten, parse_outline, DocumentSymbol, SymbolRecord};
pub use walker::discover_files;
