//! Configuration — language table, traversal policy and protocol tunables.
//!
//! Built-in defaults cover Python, JavaScript/TypeScript, Go and Rust. A
//! project can override any of it with an `lspmap.toml` at its root:
//!
//! ```toml
//! output = "map.json"
//! ignore_dirs = [".git", "target"]
//!
//! [tunables]
//! request_timeout_ms = 5000
//! retry_delays_ms = [50, 150]
//!
//! [languages.python]
//! command = ["pylsp"]
//! extensions = [".py", ".pyi"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{LspMapError, Result};

/// File name looked up by [`Config::discover`].
pub const CONFIG_FILE_NAME: &str = "lspmap.toml";

/// Default output document name.
pub const DEFAULT_OUTPUT: &str = "knowledge_map.json";

/// Directories never descended into.
const DEFAULT_IGNORE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "dist",
    "build",
    ".next",
    ".venv",
    "venv",
];

/// Pattern-based extractors usable when no engine result is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackKind {
    /// JavaScript / TypeScript class and function declarations.
    #[serde(rename = "ecmascript")]
    EcmaScript,
}

/// How to launch and talk to the engine for one language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Program followed by its arguments.
    pub command: Vec<String>,
    /// Extensions handled by this language, with the leading dot.
    pub extensions: Vec<String>,
    /// Per-extension `languageId` sent on didOpen. Defaults to the language key.
    #[serde(default)]
    pub language_ids: BTreeMap<String, String>,
    #[serde(default)]
    pub fallback: Option<FallbackKind>,
}

impl LanguageConfig {
    fn new(command: &[&str], extensions: &[&str]) -> Self {
        Self {
            command: command.iter().map(|s| s.to_string()).collect(),
            extensions: extensions.iter().map(|s| s.to_string()).collect(),
            language_ids: BTreeMap::new(),
            fallback: None,
        }
    }

    /// Whether `path` carries one of this language's extensions.
    pub fn matches(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self
                .extensions
                .iter()
                .any(|candidate| candidate.trim_start_matches('.') == ext),
            None => false,
        }
    }

    /// Protocol `languageId` for a document of this language.
    pub fn language_id(&self, language: &str, path: &Path) -> String {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| self.language_ids.get(&format!(".{}", ext)))
            .cloned()
            .unwrap_or_else(|| language.to_string())
    }
}

/// Timing knobs for the protocol client and the outline retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tunables {
    /// Ceiling for each documentSymbol attempt.
    pub request_timeout_ms: u64,
    /// Ceiling for the initialize handshake.
    pub handshake_timeout_ms: u64,
    /// Ceiling for the best-effort shutdown request.
    pub shutdown_timeout_ms: u64,
    /// Sleep before each outline attempt; the length is the attempt count.
    pub retry_delays_ms: Vec<u64>,
    /// Log progress every N files (0 disables).
    pub progress_every: usize,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            request_timeout_ms: 20_000,
            handshake_timeout_ms: 30_000,
            shutdown_timeout_ms: 2_000,
            retry_delays_ms: vec![100, 300, 600],
            progress_every: 50,
        }
    }
}

impl Tunables {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn retry_delays(&self) -> impl Iterator<Item = Duration> + '_ {
        self.retry_delays_ms.iter().map(|ms| Duration::from_millis(*ms))
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub output: PathBuf,
    pub ignore_dirs: Vec<String>,
    pub respect_gitignore: bool,
    pub tunables: Tunables,
    pub languages: BTreeMap<String, LanguageConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let mut languages = BTreeMap::new();

        languages.insert(
            "python".to_string(),
            LanguageConfig::new(&["pyright-langserver", "--stdio"], &[".py"]),
        );

        let mut javascript = LanguageConfig::new(
            &["typescript-language-server", "--stdio"],
            &[".js", ".jsx", ".ts", ".tsx"],
        );
        for (ext, id) in [
            (".js", "javascript"),
            (".jsx", "javascriptreact"),
            (".ts", "typescript"),
            (".tsx", "typescriptreact"),
        ] {
            javascript.language_ids.insert(ext.to_string(), id.to_string());
        }
        javascript.fallback = Some(FallbackKind::EcmaScript);
        languages.insert("javascript".to_string(), javascript);

        languages.insert("go".to_string(), LanguageConfig::new(&["gopls"], &[".go"]));
        languages.insert(
            "rust".to_string(),
            LanguageConfig::new(&["rust-analyzer"], &[".rs"]),
        );

        Self {
            output: PathBuf::from(DEFAULT_OUTPUT),
            ignore_dirs: DEFAULT_IGNORE_DIRS.iter().map(|s| s.to_string()).collect(),
            respect_gitignore: false,
            tunables: Tunables::default(),
            languages,
        }
    }
}

/// On-disk shape: every field optional, merged over the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    output: Option<PathBuf>,
    ignore_dirs: Option<Vec<String>>,
    respect_gitignore: Option<bool>,
    tunables: Option<Tunables>,
    languages: BTreeMap<String, LanguageConfig>,
}

impl Config {
    /// Load a TOML config file and merge it over the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml(&text)
            .map_err(|e| LspMapError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), languages = config.languages.len(), "loaded config");
        Ok(config)
    }

    /// Load `<root>/lspmap.toml` if it exists, otherwise the defaults.
    pub fn discover(root: &Path) -> Result<Self> {
        let candidate = root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            debug!(root = %root.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse TOML text and merge it over the defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| LspMapError::Config(e.to_string()))?;

        let mut config = Self::default();
        if let Some(output) = file.output {
            config.output = output;
        }
        if let Some(dirs) = file.ignore_dirs {
            config.ignore_dirs = dirs;
        }
        if let Some(flag) = file.respect_gitignore {
            config.respect_gitignore = flag;
        }
        if let Some(tunables) = file.tunables {
            config.tunables = tunables;
        }
        for (name, language) in file.languages {
            if language.command.is_empty() {
                return Err(LspMapError::Config(format!(
                    "language '{}' has an empty command",
                    name
                )));
            }
            config.languages.insert(name, language);
        }
        Ok(config)
    }

    /// Resolve the language responsible for `path` from its extension.
    ///
    /// Languages are checked in name order; the first match wins.
    pub fn resolve(&self, path: &Path) -> Option<(&str, &LanguageConfig)> {
        self.languages
            .iter()
            .find(|(_, language)| language.matches(path))
            .map(|(name, language)| (name.as_str(), language))
    }
}
