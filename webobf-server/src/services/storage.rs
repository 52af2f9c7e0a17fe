//! Upload and artifact storage
//!
//! An explicit handle on the two directories the service writes to. Every
//! stored name embeds a millisecond timestamp; files are created with
//! create-new semantics and the timestamp is bumped on collision, so no two
//! jobs ever write the same file.

use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::models::uploaded_file::{is_plain_filename, stored_filename};
use crate::models::{ArtifactRef, UploadedFile};

/// Attempts at finding a free timestamped name before giving up
const MAX_NAME_ATTEMPTS: i64 = 1000;

/// Upload/output directory handle
#[derive(Debug, Clone)]
pub struct Storage {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl Storage {
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create both directories if missing
    pub async fn ensure_directories(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        info!(
            upload_dir = %self.upload_dir.display(),
            output_dir = %self.output_dir.display(),
            "Storage directories ready"
        );
        Ok(())
    }

    /// Persist an upload under `<millis>-<sanitized name>`
    pub async fn store_upload(&self, original_name: &str, bytes: &[u8]) -> io::Result<UploadedFile> {
        let millis = Utc::now().timestamp_millis();
        let filename = write_new_file(&self.upload_dir, bytes, |offset| {
            stored_filename(millis + offset, original_name)
        })
        .await?;

        debug!(filename = %filename, size = bytes.len(), "Stored upload");
        Ok(UploadedFile::new(
            &self.upload_dir,
            filename,
            original_name.to_string(),
        ))
    }

    /// Path of a stored upload, if `filename` names one
    pub async fn locate_upload(&self, filename: &str) -> Option<PathBuf> {
        existing_file(&self.upload_dir, filename).await
    }

    /// Full text of an upload; invalid UTF-8 is replaced, not rejected
    pub async fn read_upload(&self, path: &Path) -> io::Result<String> {
        let bytes = tokio::fs::read(path).await?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }

    /// Persist transformed text as `obf_<millis>_<source filename>`
    pub async fn write_artifact(&self, source_filename: &str, text: &str) -> io::Result<ArtifactRef> {
        let millis = Utc::now().timestamp_millis();
        let filename = write_new_file(&self.output_dir, text.as_bytes(), |offset| {
            format!("obf_{}_{}", millis + offset, source_filename)
        })
        .await?;

        Ok(ArtifactRef::new(filename))
    }

    /// Path of a finished artifact, if `name` names one
    pub async fn locate_artifact(&self, name: &str) -> Option<PathBuf> {
        existing_file(&self.output_dir, name).await
    }
}

/// `dir/name` if `name` is a plain filename of an existing regular file
async fn existing_file(dir: &Path, name: &str) -> Option<PathBuf> {
    if !is_plain_filename(name) {
        return None;
    }
    let path = dir.join(name);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Some(path),
        _ => None,
    }
}

/// Write `bytes` to the first name from `name_for(0)`, `name_for(1)`, ... that does not exist yet
async fn write_new_file<F>(dir: &Path, bytes: &[u8], name_for: F) -> io::Result<String>
where
    F: Fn(i64) -> String,
{
    for offset in 0..MAX_NAME_ATTEMPTS {
        let filename = name_for(offset);
        let path = dir.join(&filename);
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => {
                fill_or_discard(file, &path, bytes).await?;
                return Ok(filename);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free file name in {}", dir.display()),
    ))
}

/// Write `bytes` through `writer`; on failure remove the partial file at `path`
async fn fill_or_discard<W>(mut writer: W, path: &Path, bytes: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        writer.write_all(bytes).await?;
        writer.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(writer);
        match tokio::fs::remove_file(path).await {
            Ok(()) => warn!(path = %path.display(), error = %e, "Removed partially written file"),
            Err(rm) => warn!(
                path = %path.display(),
                error = %e,
                remove_error = %rm,
                "Partially written file could not be removed"
            ),
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tempfile::TempDir;

    /// Writer that fails every write, like a full disk
    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "No space left on device")))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    async fn storage() -> (TempDir, Storage) {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path().join("uploads"), temp.path().join("output"));
        storage.ensure_directories().await.unwrap();
        (temp, storage)
    }

    #[tokio::test]
    async fn upload_name_has_timestamp_and_no_whitespace() {
        let (_temp, storage) = storage().await;

        let file = storage.store_upload("a b.js", b"console.log(1)").await.unwrap();

        let (digits, rest) = file.id.split_once('-').unwrap();
        assert!(!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(rest, "a_b");
        assert_eq!(file.original_name, "a b.js");
        assert_eq!(
            tokio::fs::read_to_string(&file.storage_path).await.unwrap(),
            "console.log(1)"
        );
    }

    #[tokio::test]
    async fn same_name_uploads_never_collide() {
        let (_temp, storage) = storage().await;

        let a = storage.store_upload("x.js", b"a").await.unwrap();
        let b = storage.store_upload("x.js", b"b").await.unwrap();
        let c = storage.store_upload("x.js", b"c").await.unwrap();

        assert_ne!(a.filename, b.filename);
        assert_ne!(b.filename, c.filename);
        assert_eq!(tokio::fs::read(&a.storage_path).await.unwrap(), b"a");
    }

    #[tokio::test]
    async fn locate_rejects_traversal_and_missing_files() {
        let (temp, storage) = storage().await;
        std::fs::write(temp.path().join("secret.txt"), "x").unwrap();

        assert!(storage.locate_upload("../secret.txt").await.is_none());
        assert!(storage.locate_upload("missing.js").await.is_none());
        assert!(storage.locate_artifact("..").await.is_none());
    }

    #[tokio::test]
    async fn artifact_is_written_under_obf_name() {
        let (_temp, storage) = storage().await;

        let artifact = storage.write_artifact("17-hello.js", "out").await.unwrap();

        assert!(artifact.filename.starts_with("obf_"));
        assert!(artifact.filename.ends_with("_17-hello.js"));
        assert_eq!(artifact.download, format!("/download/{}", artifact.filename));
        let path = storage.locate_artifact(&artifact.filename).await.unwrap();
        assert_eq!(tokio::fs::read_to_string(path).await.unwrap(), "out");
    }

    #[tokio::test]
    async fn invalid_utf8_is_read_lossily() {
        let (_temp, storage) = storage().await;
        let file = storage.store_upload("bin.js", &[b'a', 0xff, b'b']).await.unwrap();

        let text = storage.read_upload(&file.storage_path).await.unwrap();
        assert_eq!(text, "a\u{FFFD}b");
    }

    #[tokio::test]
    async fn artifact_write_fails_when_output_dir_is_missing() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path().join("u"), temp.path().join("missing"));

        assert!(storage.write_artifact("a.js", "x").await.is_err());
    }

    #[tokio::test]
    async fn failed_write_leaves_no_downloadable_artifact() {
        let (_temp, storage) = storage().await;
        let name = "obf_1_1-a.js";
        let path = storage.output_dir().join(name);
        tokio::fs::write(&path, "").await.unwrap();

        let err = fill_or_discard(FullDisk, &path, b"var x=1;").await.unwrap_err();

        assert_eq!(err.to_string(), "No space left on device");
        assert!(!path.exists());
        assert!(storage.locate_artifact(name).await.is_none());
    }
}
