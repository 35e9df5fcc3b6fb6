//! Symbol ingestor — drives engines over every file and fills the graph.
//!
//! Per file: resolve the language from the extension, get (or start) its
//! session, open the document, ask for its outline with a short retry
//! policy, close it, and add each flattened record to the graph. Files the
//! engine cannot outline go through the language's fallback extractor when
//! one is configured.

use serde_json::json;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, info};

use super::fallback;
use super::symbols::{flatten, parse_outline, SymbolRecord};
use super::walker::discover_files;
use crate::config::{Config, Tunables};
use crate::error::{LspMapError, Result};
use crate::graph::KnowledgeGraph;
use crate::protocol::ProtocolClient;
use crate::session::SessionManager;
use crate::uri::to_uri;

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Symbols came from the engine.
    Engine(usize),
    /// Symbols came from the fallback extractor.
    Fallback(usize),
    /// Supported file, but no symbols from any source.
    Empty,
    /// Unsupported extension or unreadable file.
    Skipped,
}

/// Totals for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files_seen: usize,
    pub files_by_engine: usize,
    pub files_by_fallback: usize,
    pub files_empty: usize,
    pub files_skipped: usize,
    pub nodes: usize,
    pub edges: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: FileOutcome) {
        self.files_seen += 1;
        match outcome {
            FileOutcome::Engine(_) => self.files_by_engine += 1,
            FileOutcome::Fallback(_) => self.files_by_fallback += 1,
            FileOutcome::Empty => self.files_empty += 1,
            FileOutcome::Skipped => self.files_skipped += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files ({} via engine, {} via fallback, {} without symbols, {} skipped) -> {} nodes, {} edges",
            self.files_seen,
            self.files_by_engine,
            self.files_by_fallback,
            self.files_empty,
            self.files_skipped,
            self.nodes,
            self.edges
        )
    }
}

/// Orchestrates one mapping run over a root directory.
pub struct SymbolIngestor {
    root: PathBuf,
    config: Config,
    sessions: SessionManager,
    graph: KnowledgeGraph,
}

impl SymbolIngestor {
    /// The root is canonicalized, so graph ids and the engines' workspace
    /// paths are absolute whatever form the caller passed.
    pub fn new(root: &Path, config: Config) -> Result<Self> {
        let invalid = || LspMapError::InvalidRoot(root.to_path_buf());
        let canonical = fs::canonicalize(root).map_err(|_| invalid())?;
        if !canonical.is_dir() {
            return Err(invalid());
        }
        let sessions = SessionManager::new(&canonical, config.tunables.clone());
        Ok(Self {
            root: canonical,
            config,
            sessions,
            graph: KnowledgeGraph::new(),
        })
    }

    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    /// Session registry, e.g. to attach an already-connected engine.
    pub fn sessions_mut(&mut self) -> &mut SessionManager {
        &mut self.sessions
    }

    /// Map one file into the graph.
    pub fn process_file(&mut self, path: &Path) -> FileOutcome {
        let Some((language, lang_config)) = self.config.resolve(path) else {
            return FileOutcome::Skipped;
        };

        let session = self.sessions.get_session(language, lang_config);

        let text = match fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "unreadable file skipped");
                return FileOutcome::Skipped;
            }
        };

        let mut via_fallback = false;
        let mut records = match session {
            Some(client) => {
                let language_id = lang_config.language_id(language, path);
                outline_from_engine(client, path, &language_id, &text, &self.config.tunables)
            }
            None => Vec::new(),
        };

        if records.is_empty() {
            if let Some(kind) = lang_config.fallback {
                records = fallback::extract(kind, &text);
                via_fallback = true;
            }
        }

        if records.is_empty() {
            debug!(path = %path.display(), language, "no symbols");
            return FileOutcome::Empty;
        }

        let file_path = path.to_string_lossy();
        for record in &records {
            self.graph.add_node(&record.name, &file_path, record.kind);
        }

        let outcome = if via_fallback {
            FileOutcome::Fallback(records.len())
        } else {
            FileOutcome::Engine(records.len())
        };
        debug!(path = %path.display(), language, ?outcome, "file mapped");
        outcome
    }

    /// Walk the root, map every file, and stop all engines.
    pub fn run(mut self) -> (KnowledgeGraph, RunSummary) {
        let files = discover_files(
            &self.root,
            &self.config.ignore_dirs,
            self.config.respect_gitignore,
        );
        let total = files.len();
        let every = self.config.tunables.progress_every;
        info!(root = %self.root.display(), files = total, "mapping started");

        let mut summary = RunSummary::default();
        for (i, path) in files.iter().enumerate() {
            summary.record(self.process_file(path));

            if every > 0 && (i + 1) % every == 0 {
                info!(
                    processed = i + 1,
                    total,
                    nodes = self.graph.node_count(),
                    "progress"
                );
            }
        }

        self.sessions.shutdown_all();

        summary.nodes = self.graph.node_count();
        summary.edges = self.graph.edge_count();
        let sessions = self.sessions.stats();
        info!(
            files = summary.files_seen,
            engine = summary.files_by_engine,
            fallback = summary.files_by_fallback,
            skipped = summary.files_skipped,
            nodes = summary.nodes,
            edges = summary.edges,
            sessions_ready = sessions.ready,
            sessions_failed = sessions.failed,
            "mapping finished"
        );

        (self.graph, summary)
    }
}

/// Map every file under `root` into a new graph.
pub fn map_directory(root: &Path, config: Config) -> Result<(KnowledgeGraph, RunSummary)> {
    Ok(SymbolIngestor::new(root, config)?.run())
}

/// Open the document, fetch its outline, close it.
fn outline_from_engine(
    client: &ProtocolClient,
    path: &Path,
    language_id: &str,
    text: &str,
    tunables: &Tunables,
) -> Vec<SymbolRecord> {
    let uri = to_uri(path);

    client.send_notification(
        "textDocument/didOpen",
        json!({
            "textDocument": {
                "uri": uri,
                "languageId": language_id,
                "version": 1,
                "text": text
            }
        }),
    );

    let outline = request_outline(client, &uri, tunables);

    client.send_notification("textDocument/didClose", json!({"textDocument": {"uri": uri}}));

    outline
        .map(|result| flatten(&parse_outline(&result)))
        .unwrap_or_default()
}

/// Ask for the outline, sleeping before each attempt to let the engine
/// index the document. The first non-null result wins.
fn request_outline(client: &ProtocolClient, uri: &str, tunables: &Tunables) -> Option<serde_json::Value> {
    for (attempt, delay) in tunables.retry_delays().enumerate() {
        if !client.is_running() {
            debug!(language = client.language(), uri, "engine gone, giving up on outline");
            return None;
        }
        thread::sleep(delay);

        let params = json!({"textDocument": {"uri": uri}});
        if let Some(result) =
            client.send_request("textDocument/documentSymbol", params, tunables.request_timeout())
        {
            return Some(result);
        }
        debug!(language = client.language(), uri, attempt = attempt + 1, "no outline yet");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FallbackKind, LanguageConfig};
    use crate::graph::SymbolKind;
    use crate::test_support::{FakeEngine, Reply};
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    const NO_ENGINE: &str = "lspmap-test-no-such-engine-binary";

    fn language(command: &[&str], extensions: &[&str], fallback: Option<FallbackKind>) -> LanguageConfig {
        LanguageConfig {
            command: command.iter().map(|s| s.to_string()).collect(),
            extensions: extensions.iter().map(|s| s.to_string()).collect(),
            language_ids: BTreeMap::new(),
            fallback,
        }
    }

    fn quick_config(languages: Vec<(&str, LanguageConfig)>) -> Config {
        let mut config = Config::default();
        config.tunables = Tunables {
            request_timeout_ms: 100,
            handshake_timeout_ms: 200,
            shutdown_timeout_ms: 50,
            retry_delays_ms: vec![0, 0, 0],
            progress_every: 1,
        };
        config.languages = languages
            .into_iter()
            .map(|(name, language)| (name.to_string(), language))
            .collect();
        config
    }

    fn outline_engine(outline: Value) -> (ProtocolClient, FakeEngine) {
        FakeEngine::connect("javascript", move |method, _| match method {
            "initialize" => Reply::Result(json!({"capabilities": {}})),
            "textDocument/documentSymbol" => Reply::Result(outline.clone()),
            _ => Reply::Result(Value::Null),
        })
    }

    #[test]
    fn test_outline_becomes_nodes_and_edges() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.ts");
        fs::write(&file, "class Foo { bar() {} }\n").unwrap();

        let mut config =
            quick_config(vec![("javascript", language(&[NO_ENGINE], &[".ts"], None))]);
        config
            .languages
            .get_mut("javascript")
            .unwrap()
            .language_ids
            .insert(".ts".to_string(), "typescript".to_string());

        let mut ingestor = SymbolIngestor::new(dir.path(), config).unwrap();
        let (client, engine) = outline_engine(json!([
            {"name": "Foo", "kind": 5, "children": [{"name": "bar", "kind": 6}]}
        ]));
        assert!(ingestor.sessions_mut().attach("javascript", client));

        assert_eq!(ingestor.process_file(&file), FileOutcome::Engine(2));

        let key = file.to_string_lossy().into_owned();
        let graph = ingestor.graph();
        assert!(graph.node(&key).unwrap().is_file());
        assert_eq!(graph.node(&format!("{}::Foo", key)).unwrap().kind, SymbolKind::Class);
        assert_eq!(graph.node(&format!("{}::bar", key)).unwrap().kind, SymbolKind::Method);
        let edges: Vec<(String, String)> = graph
            .edges()
            .map(|(s, t, _)| (s.id.clone(), t.id.clone()))
            .collect();
        assert_eq!(
            edges,
            vec![
                (key.clone(), format!("{}::Foo", key)),
                (key.clone(), format!("{}::bar", key)),
            ]
        );

        // Notifications are only guaranteed to be seen once the engine exits
        ingestor.sessions_mut().shutdown_all();
        engine.wait_closed();
        assert_eq!(
            engine.methods()[3..6],
            [
                "textDocument/didOpen",
                "textDocument/documentSymbol",
                "textDocument/didClose"
            ]
        );
        let opened = engine.params_of("textDocument/didOpen").remove(0)["textDocument"].take();
        assert_eq!(opened["uri"], to_uri(&file));
        assert_eq!(opened["languageId"], "typescript");
        assert_eq!(opened["version"], 1);
        assert_eq!(opened["text"], "class Foo { bar() {} }\n");
        assert_eq!(
            engine.params_of("textDocument/didClose")[0]["textDocument"]["uri"],
            to_uri(&file)
        );
    }

    #[test]
    fn test_null_outline_is_retried() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("svc.go");
        fs::write(&file, "package svc\n").unwrap();

        let config = quick_config(vec![("go", language(&[NO_ENGINE], &[".go"], None))]);
        let mut ingestor = SymbolIngestor::new(dir.path(), config).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let (client, engine) = FakeEngine::connect("go", move |method, _| match method {
            "initialize" => Reply::Result(json!({})),
            "textDocument/documentSymbol" => {
                if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                    Reply::Result(Value::Null)
                } else {
                    Reply::Result(json!([{"name": "Serve", "kind": 12}]))
                }
            }
            _ => Reply::Result(Value::Null),
        });
        assert!(ingestor.sessions_mut().attach("go", client));

        assert_eq!(ingestor.process_file(&file), FileOutcome::Engine(1));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(engine.params_of("textDocument/documentSymbol").len(), 3);
    }

    #[test]
    fn test_silent_outline_exhausts_retries_then_falls_back() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("app.jsx");
        fs::write(&file, "export const App = () => null;\nclass Store {}\n").unwrap();

        let config = quick_config(vec![(
            "javascript",
            language(&[NO_ENGINE], &[".jsx"], Some(FallbackKind::EcmaScript)),
        )]);
        let mut ingestor = SymbolIngestor::new(dir.path(), config).unwrap();
        let (client, engine) = FakeEngine::connect("javascript", |method, _| match method {
            "initialize" => Reply::Result(json!({})),
            "textDocument/documentSymbol" => Reply::Silent,
            _ => Reply::Result(Value::Null),
        });
        assert!(ingestor.sessions_mut().attach("javascript", client));

        assert_eq!(ingestor.process_file(&file), FileOutcome::Fallback(2));
        ingestor.sessions_mut().shutdown_all();
        engine.wait_closed();
        assert_eq!(engine.params_of("textDocument/documentSymbol").len(), 3);
        assert!(engine.methods().contains(&"textDocument/didClose".to_string()));

        let key = file.to_string_lossy().into_owned();
        let names: Vec<&str> = ingestor
            .graph()
            .symbols_in(&key)
            .iter()
            .map(|n| n.label.as_str())
            .collect();
        assert_eq!(names, vec!["Store", "App"]);
    }

    #[test]
    fn test_empty_outline_without_fallback_adds_nothing() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("empty.ts");
        fs::write(&file, "class Ignored {}\n").unwrap();

        let mut ingestor = SymbolIngestor::new(
            dir.path(),
            quick_config(vec![("javascript", language(&[NO_ENGINE], &[".ts"], None))]),
        )
        .unwrap();
        let (client, _engine) = outline_engine(json!([]));
        assert!(ingestor.sessions_mut().attach("javascript", client));

        assert_eq!(ingestor.process_file(&file), FileOutcome::Empty);
        assert!(ingestor.graph().is_empty());
    }

    #[test]
    fn test_dead_engine_uses_fallback() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("lib.js");
        fs::write(&file, "function start() {}\n").unwrap();

        let config = quick_config(vec![(
            "javascript",
            language(&[NO_ENGINE], &[".js"], Some(FallbackKind::EcmaScript)),
        )]);
        let mut ingestor = SymbolIngestor::new(dir.path(), config).unwrap();
        let (client, engine) = outline_engine(json!([{"name": "never", "kind": 12}]));
        assert!(ingestor.sessions_mut().attach("javascript", client));

        engine.crash();
        engine.wait_closed();

        let mut outcome = ingestor.process_file(&file);
        // The reader thread notices the closed socket asynchronously
        for _ in 0..100 {
            if outcome == FileOutcome::Fallback(1) {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(10));
            outcome = ingestor.process_file(&file);
        }
        assert_eq!(outcome, FileOutcome::Fallback(1));
        let key = file.to_string_lossy().into_owned();
        assert!(ingestor.graph().contains(&format!("{}::start", key)));
        assert!(!ingestor.graph().contains(&format!("{}::never", key)));
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("legacy.js");
        let mut bytes = b"// caf\xe9\n".to_vec();
        bytes.extend_from_slice(b"class Legacy {}\n");
        fs::write(&file, bytes).unwrap();

        let config = quick_config(vec![(
            "javascript",
            language(&[NO_ENGINE], &[".js"], Some(FallbackKind::EcmaScript)),
        )]);
        let mut ingestor = SymbolIngestor::new(dir.path(), config).unwrap();

        assert_eq!(ingestor.process_file(&file), FileOutcome::Fallback(1));
    }

    #[test]
    fn test_unsupported_and_unreadable_files_are_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "# hi\n").unwrap();

        let mut ingestor = SymbolIngestor::new(
            dir.path(),
            quick_config(vec![("python", language(&[NO_ENGINE], &[".py"], None))]),
        )
        .unwrap();

        assert_eq!(
            ingestor.process_file(&dir.path().join("README.md")),
            FileOutcome::Skipped
        );
        assert_eq!(ingestor.sessions_mut().stats().failed, 0, "no engine started");

        assert_eq!(
            ingestor.process_file(&dir.path().join("missing.py")),
            FileOutcome::Skipped
        );
        assert!(ingestor.graph().is_empty());
    }

    #[test]
    fn test_failed_handshake_does_not_block_other_languages() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "class Skipped: pass\n").unwrap();
        fs::write(dir.path().join("b.py"), "def skipped(): pass\n").unwrap();
        fs::write(dir.path().join("c.ts"), "export class Kept {}\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "plain text\n").unwrap();

        let config = quick_config(vec![
            ("javascript", language(&[NO_ENGINE], &[".ts"], None)),
            ("python", language(&["sleep", "30"], &[".py"], None)),
        ]);
        let mut ingestor = SymbolIngestor::new(dir.path(), config).unwrap();
        let (client, _engine) = outline_engine(json!([{"name": "Kept", "kind": 5}]));
        assert!(ingestor.sessions_mut().attach("javascript", client));

        let (graph, summary) = ingestor.run();

        assert_eq!(
            summary,
            RunSummary {
                files_seen: 4,
                files_by_engine: 1,
                files_by_fallback: 0,
                files_empty: 2,
                files_skipped: 1,
                nodes: 2,
                edges: 1,
            }
        );
        assert!(graph.nodes().all(|n| !n.id.contains("a.py") && !n.id.contains("b.py")));
        let root = fs::canonicalize(dir.path()).unwrap();
        let key = root.join("c.ts").to_string_lossy().into_owned();
        assert!(graph.contains(&format!("{}::Kept", key)));
    }

    #[test]
    fn test_non_canonical_root_yields_absolute_ids() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/app.ts"), "export class App {}
").unwrap();
        let canonical = fs::canonicalize(dir.path()).unwrap();

        let config = quick_config(vec![("javascript", language(&[NO_ENGINE], &[".ts"], None))]);
        let mut ingestor = SymbolIngestor::new(&dir.path().join("src").join(".."), config).unwrap();
        let (client, engine) = outline_engine(json!([{"name": "App", "kind": 5}]));
        assert!(ingestor.sessions_mut().attach("javascript", client));

        let (graph, summary) = ingestor.run();

        assert_eq!(summary.files_by_engine, 1);
        let key = canonical.join("src").join("app.ts").to_string_lossy().into_owned();
        assert!(graph.contains(&key));
        assert!(graph.contains(&format!("{}::App", key)));
        assert!(graph.nodes().all(|n| !n.id.contains("..")));

        let init = engine.params_of("initialize").remove(0);
        assert_eq!(init["rootPath"], canonical.display().to_string());
        assert_eq!(init["rootUri"], to_uri(&canonical));
        let name = canonical.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(init["workspaceFolders"][0]["name"], name);
    }

    #[test]
    fn test_file_root_is_rejected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("main.ts");
        fs::write(&file, "export class Main {}
").unwrap();

        let result = SymbolIngestor::new(&file, Config::default());
        assert!(matches!(result, Err(LspMapError::InvalidRoot(p)) if p == file));
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let result = map_directory(Path::new("/nonexistent/lspmap/root"), Config::default());
        assert!(matches!(result, Err(LspMapError::InvalidRoot(_))));
    }
}
