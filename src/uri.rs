//! `file://` URI helpers for protocol payloads.

use std::path::Path;
use url::Url;

/// Convert a filesystem path into a `file://` URI.
///
/// Relative paths are resolved against the current directory first, since
/// file URIs must be absolute.
pub fn to_uri(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    match Url::from_file_path(&absolute) {
        Ok(url) => url.to_string(),
        // Only reachable for paths the platform cannot express as a URI
        Err(()) => format!("file://{}", absolute.display()),
    }
}
