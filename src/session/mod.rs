//! Session registry — one engine per language, started on first use.
//!
//! A session is created the first time a file of its language shows up,
//! goes through the `initialize` handshake, and lives until the end of the
//! run. A language whose engine fails to spawn or to answer `initialize` is
//! recorded as failed and never retried during the run.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{LanguageConfig, Tunables};
use crate::protocol::ProtocolClient;
use crate::uri::to_uri;

/// State of one language's session.
pub enum Session {
    Ready(ProtocolClient),
    Failed,
}

/// Counts of sessions by state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub ready: usize,
    pub failed: usize,
}

/// Owns every engine session of a run.
pub struct SessionManager {
    root: PathBuf,
    tunables: Tunables,
    sessions: BTreeMap<String, Session>,
}

impl SessionManager {
    pub fn new(root: &Path, tunables: Tunables) -> Self {
        Self {
            root: root.to_path_buf(),
            tunables,
            sessions: BTreeMap::new(),
        }
    }

    /// Session for `language`, starting its engine on first use.
    ///
    /// Returns `None` if the engine could not be started, did not complete
    /// the handshake, or has died since.
    pub fn get_session(&mut self, language: &str, config: &LanguageConfig) -> Option<&ProtocolClient> {
        if !self.sessions.contains_key(language) {
            info!(language, command = ?config.command, "starting engine");
            let client = ProtocolClient::spawn(language, &config.command)
                .with_shutdown_timeout(self.tunables.shutdown_timeout());
            self.attach(language, client);
        }

        match self.sessions.get(language) {
            Some(Session::Ready(client)) if client.is_running() => Some(client),
            Some(Session::Ready(_)) => {
                debug!(language, "engine no longer running");
                None
            }
            _ => None,
        }
    }

    /// Handshake with an already-connected client and register it.
    ///
    /// Returns whether the session is usable. Replaces any previous session
    /// for the language.
    pub fn attach(&mut self, language: &str, client: ProtocolClient) -> bool {
        let session = if self.handshake(language, &client) {
            Session::Ready(client)
        } else {
            client.shutdown();
            Session::Failed
        };
        let ready = matches!(session, Session::Ready(_));

        if let Some(Session::Ready(previous)) = self.sessions.insert(language.to_string(), session) {
            previous.shutdown();
        }
        ready
    }

    fn handshake(&self, language: &str, client: &ProtocolClient) -> bool {
        let root_uri = to_uri(&self.root);
        let root_name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string());

        let params = json!({
            "processId": std::process::id(),
            "rootPath": self.root.display().to_string(),
            "rootUri": root_uri,
            "workspaceFolders": [{"uri": root_uri, "name": root_name}],
            "capabilities": {
                "textDocument": {
                    "documentSymbol": {"hierarchicalDocumentSymbolSupport": true},
                    "references": {}
                }
            }
        });

        let Some(result) =
            client.send_request("initialize", params, self.tunables.handshake_timeout())
        else {
            warn!(language, "initialize failed or timed out; skipping this language");
            return false;
        };

        let server = result
            .pointer("/serverInfo/name")
            .and_then(Value::as_str)
            .unwrap_or("unnamed");
        info!(language, server, "engine initialized");

        client.send_notification("initialized", json!({}));
        client.send_notification("workspace/didChangeConfiguration", json!({"settings": {}}));
        true
    }

    /// Whether `language` has been tried and marked unusable.
    pub fn is_failed(&self, language: &str) -> bool {
        matches!(self.sessions.get(language), Some(Session::Failed))
    }

    pub fn stats(&self) -> SessionStats {
        let mut stats = SessionStats::default();
        for session in self.sessions.values() {
            match session {
                Session::Ready(_) => stats.ready += 1,
                Session::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Shut every engine down. Safe to call more than once.
    pub fn shutdown_all(&mut self) {
        for (language, session) in &self.sessions {
            if let Session::Ready(client) = session {
                debug!(language = %language, "shutting down engine");
                client.shutdown();
            }
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}
