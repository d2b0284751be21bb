//! Local file store for uploaded recordings.
//!
//! An upload is a two-phase operation:
//! 1. [`FileStore::create`] + [`FileWriter::write_chunk`] + [`FileWriter::finish`]
//!    streams the bytes to disk and yields a [`StoredFile`].
//! 2. [`StoredFile::commit`] inserts the metadata row.
//!
//! A writer dropped before `finish` deletes its partial file, so a rejected or
//! aborted request body leaves nothing behind.
//!
//! The two phases are not atomic. If the insert fails (or the process dies in
//! between) the file stays on disk with no row pointing at it. Nothing here
//! sweeps such orphans.

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, warn};
use sqlx::SqlitePool;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::db;
use crate::models::Recording;

const MAX_NAME_ATTEMPTS: usize = 1000;

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Use `root` as the upload directory, creating it if missing
    pub async fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start writing a new file named after `now` and the client's file name
    ///
    /// Never overwrites: if the name is taken, the timestamp is bumped by one
    /// millisecond until a free name is found.
    pub async fn create(
        &self,
        now: DateTime<Utc>,
        original_name: Option<&str>,
    ) -> io::Result<FileWriter> {
        let mut millis = now.timestamp_millis();
        for _ in 0..MAX_NAME_ATTEMPTS {
            let filename = stored_name(millis, original_name);
            let path = self.root.join(&filename);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    debug!("Writing upload to {}", path.display());
                    return Ok(FileWriter {
                        file,
                        filename,
                        path,
                        written: 0,
                        finished: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => millis += 1,
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("No free file name near {}", now.timestamp_millis()),
        ))
    }
}

/// Server-side file name: `<epoch-millis><original-extension>`
///
/// The extension keeps its leading dot and is empty when the client name has
/// none (`recording` or `.hidden`).
pub fn stored_name(epoch_millis: i64, original_name: Option<&str>) -> String {
    let ext = original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    format!("{}{}", epoch_millis, ext)
}

/// An open destination file receiving streamed upload bytes
///
/// Dropping the writer before [`FileWriter::finish`] deletes the partial file,
/// so an aborted or rejected upload leaves nothing behind.
pub struct FileWriter {
    file: File,
    filename: String,
    path: PathBuf,
    written: u64,
    finished: bool,
}

impl FileWriter {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush to disk and hand over the completed file
    pub async fn finish(mut self) -> io::Result<StoredFile> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        self.finished = true;
        Ok(StoredFile {
            filename: std::mem::take(&mut self.filename),
            filepath: self.path.to_string_lossy().into_owned(),
            filesize: self.written,
        })
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial upload {}", self.path.display()),
            Err(e) => warn!(
                "Failed to remove partial upload {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// A file that is on disk but not yet recorded in the metadata store
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub filename: String,
    pub filepath: String,
    pub filesize: u64,
}

impl StoredFile {
    /// Delete a file that will not be committed
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_file(&self.filepath).await {
            warn!("Failed to remove rejected upload {}: {}", self.filepath, e);
        }
    }

    /// Insert the metadata row for this file, stamped with the current time
    ///
    /// On failure the file is left where it is.
    pub async fn commit(self, pool: &SqlitePool) -> Result<Recording, sqlx::Error> {
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let filesize = self.filesize as i64;

        match db::insert_recording(pool, &self.filename, &self.filepath, filesize, &created_at)
            .await
        {
            Ok(id) => Ok(Recording {
                id,
                filename: self.filename,
                filepath: self.filepath,
                filesize,
                created_at,
            }),
            Err(e) => {
                warn!(
                    "Insert failed after write, leaving orphaned file {}: {}",
                    self.filepath, e
                );
                Err(e)
            }
        }
    }
}

/// Resolve a stored `filepath` to an absolute path against the working directory
pub fn resolve(filepath: &str) -> io::Result<PathBuf> {
    std::path::absolute(filepath)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_name_keeps_original_extension() {
        assert_eq!(
            stored_name(1700000000123, Some("recording.webm")),
            "1700000000123.webm"
        );
        assert_eq!(stored_name(42, Some("clip.final.mp4")), "42.mp4");
    }

    #[test]
    fn stored_name_without_extension() {
        assert_eq!(stored_name(42, None), "42");
        assert_eq!(stored_name(42, Some("recording")), "42");
        assert_eq!(stored_name(42, Some(".hidden")), "42");
    }

    #[test]
    fn stored_name_ignores_client_directories() {
        assert_eq!(stored_name(7, Some("../../etc/evil.webm")), "7.webm");
    }

    #[tokio::test]
    async fn writer_counts_streamed_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("uploads")).await.unwrap();

        let mut writer = store
            .create(Utc::now(), Some("recording.webm"))
            .await
            .unwrap();
        writer.write_chunk(b"hello ").await.unwrap();
        writer.write_chunk(b"world").await.unwrap();
        let stored = writer.finish().await.unwrap();

        assert_eq!(stored.filesize, 11);
        assert!(stored.filename.ends_with(".webm"));
        let on_disk = tokio::fs::read(&stored.filepath).await.unwrap();
        assert_eq!(on_disk, b"hello world");
    }

    #[tokio::test]
    async fn same_millisecond_uploads_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let now = Utc::now();

        let mut first = store.create(now, Some("recording.webm")).await.unwrap();
        let mut second = store.create(now, Some("recording.webm")).await.unwrap();
        first.write_chunk(b"first").await.unwrap();
        second.write_chunk(b"second").await.unwrap();
        let first = first.finish().await.unwrap();
        let second = second.finish().await.unwrap();

        assert_ne!(first.filename, second.filename);
        assert_eq!(second.filename, stored_name(now.timestamp_millis() + 1, Some("x.webm")));
        assert_eq!(tokio::fs::read(&first.filepath).await.unwrap(), b"first");
        assert_eq!(tokio::fs::read(&second.filepath).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn unfinished_writer_removes_its_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        let mut writer = store.create(Utc::now(), Some("recording.webm")).await.unwrap();
        writer.write_chunk(b"partial").await.unwrap();
        drop(writer);

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
