//! Pattern-based symbol extraction, used when no engine outline is available.
//!
//! Deliberately shallow: it finds top-level-looking declarations anywhere in
//! the text, without nesting, and reports them as flat records.

use regex::Regex;
use std::sync::LazyLock;

use super::symbols::SymbolRecord;
use crate::config::FallbackKind;
use crate::graph::SymbolKind;

static CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bclass\s+([A-Za-z_$][\w$]*)").unwrap());
static FUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfunction\s+([A-Za-z_$][\w$]*)\s*\(").unwrap());
static ARROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s*)?\(?[^\n)]*\)?\s*=>")
        .unwrap()
});
static FUNCTION_EXPR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?function\b").unwrap()
});

/// Extract flat symbol records from raw source text.
pub fn extract(kind: FallbackKind, text: &str) -> Vec<SymbolRecord> {
    match kind {
        FallbackKind::EcmaScript => extract_ecmascript(text),
    }
}

/// Classes, then named functions, then arrow functions, then function
/// expressions, each in source order.
fn extract_ecmascript(text: &str) -> Vec<SymbolRecord> {
    let patterns: [(&Regex, SymbolKind); 4] = [
        (&CLASS_RE, SymbolKind::Class),
        (&FUNCTION_RE, SymbolKind::Function),
        (&ARROW_RE, SymbolKind::Function),
        (&FUNCTION_EXPR_RE, SymbolKind::Function),
    ];

    let mut records = Vec::new();
    for (re, kind) in patterns {
        for caps in re.captures_iter(text) {
            if let Some(name) = caps.get(1) {
                records.push(SymbolRecord::new(name.as_str(), kind));
            }
        }
    }
    records
}
