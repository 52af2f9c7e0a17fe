//! Uploaded source file identity

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Bytes received from a client, stored under the upload directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    /// Stored filename with its extension stripped
    pub id: String,
    /// Stored filename (`<millis>-<sanitized original name>`); clients send this back in `start`
    pub filename: String,
    /// Full path on disk
    #[serde(skip)]
    pub storage_path: PathBuf,
    /// Name as submitted by the client
    pub original_name: String,
}

impl UploadedFile {
    /// Describe a file stored as `filename` inside `upload_dir`
    pub fn new(upload_dir: &Path, filename: String, original_name: String) -> Self {
        Self {
            id: strip_extension(&filename),
            storage_path: upload_dir.join(&filename),
            filename,
            original_name,
        }
    }
}

/// Stored name for an upload arriving at `millis`
///
/// Only the final path component of `original_name` is kept and every run of
/// whitespace becomes a single `_`.
pub fn stored_filename(millis: i64, original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);

    let mut sanitized = String::with_capacity(base.len());
    let mut in_whitespace = false;
    for c in base.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                sanitized.push('_');
            }
            in_whitespace = true;
        } else {
            sanitized.push(c);
            in_whitespace = false;
        }
    }

    format!("{}-{}", millis, sanitized)
}

/// `name` without its last extension (`1-a_b.js` → `1-a_b`, `.env` → `.env`)
pub fn strip_extension(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

/// Whether a client-supplied name is a plain filename (no directories, no traversal)
pub fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
