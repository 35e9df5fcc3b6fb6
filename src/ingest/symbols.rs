//! Symbol outlines — parsing documentSymbol results and flattening them.
//!
//! Engines answer either with hierarchical `DocumentSymbol[]` or with flat
//! `SymbolInformation[]`. Both carry `name` and `kind`; only the first nests
//! `children`. Parsing is lenient: a malformed record loses its name or kind
//! (and is later dropped) instead of failing the whole outline.

use serde_json::Value;

use crate::graph::SymbolKind;

/// One record of an engine's symbol outline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSymbol {
    pub name: Option<String>,
    /// Raw protocol kind code.
    pub kind: Option<u64>,
    pub children: Vec<DocumentSymbol>,
}

impl DocumentSymbol {
    pub fn from_value(value: &Value) -> Self {
        Self {
            name: value.get("name").and_then(Value::as_str).map(str::to_string),
            kind: value.get("kind").and_then(Value::as_u64),
            children: value
                .get("children")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(Self::from_value).collect())
                .unwrap_or_default(),
        }
    }

    /// Usable as a graph record: non-empty name and non-zero kind.
    fn as_record(&self) -> Option<SymbolRecord> {
        let name = self.name.as_deref().filter(|n| !n.is_empty())?;
        let kind = self.kind.filter(|k| *k != 0)?;
        Some(SymbolRecord {
            name: name.to_string(),
            kind: SymbolKind::from_code(kind),
        })
    }
}

/// A symbol ready to be added to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRecord {
    pub name: String,
    pub kind: SymbolKind,
}

impl SymbolRecord {
    pub fn new(name: &str, kind: SymbolKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

/// Parse a documentSymbol result. Anything but an array is an empty outline.
pub fn parse_outline(result: &Value) -> Vec<DocumentSymbol> {
    result
        .as_array()
        .map(|items| items.iter().map(DocumentSymbol::from_value).collect())
        .unwrap_or_default()
}

/// Flatten an outline depth-first, parents before children.
///
/// Records without a name or kind are dropped, but their children are
/// still visited.
pub fn flatten(outline: &[DocumentSymbol]) -> Vec<SymbolRecord> {
    let mut records = Vec::new();
    for symbol in outline {
        collect(symbol, &mut records);
    }
    records
}

fn collect(symbol: &DocumentSymbol, records: &mut Vec<SymbolRecord>) {
    if let Some(record) = symbol.as_record() {
        records.push(record);
    }
    for child in &symbol.children {
        collect(child, records);
    }
}
