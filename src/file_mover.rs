//! Compressed relocation of completed scouting files
//!
//! Runs independently of the synchronizer. Completed files in the source
//! directory are compressed with an external codec into the destination
//! directory, and the source file is removed only when the codec succeeds.
//!
//! The codec is invoked as `<codec> <source> -c` with its standard output
//! redirected into `<dest_dir>/<file name><compressed_extension>`, which is
//! how `lbzip2`, `bzip2`, `gzip` and friends stream to stdout.

use crate::config::FileMoverConfig;
use crate::error::AppResult;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Result of one pass over the source directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveReport {
    /// Source files compressed and removed
    pub moved: Vec<PathBuf>,
    /// Source files left in place because compression failed
    pub failed: Vec<PathBuf>,
}

impl MoveReport {
    /// True if no candidate file was found
    pub fn is_empty(&self) -> bool {
        self.moved.is_empty() && self.failed.is_empty()
    }
}

/// Scheduled compress-and-move task.
#[derive(Debug, Clone)]
pub struct FileMover {
    config: FileMoverConfig,
}

impl FileMover {
    /// Create a mover for the given directories and codec
    pub fn new(config: FileMoverConfig) -> Self {
        Self { config }
    }

    /// Run forever.
    ///
    /// An empty pass sleeps for `idle_wait`; a source directory that cannot be
    /// listed sleeps for `error_backoff` before trying again.
    pub async fn run(&self) {
        info!(
            source = %self.config.source_dir.display(),
            dest = %self.config.dest_dir.display(),
            codec = %self.config.codec,
            "File mover started"
        );
        loop {
            match self.run_once().await {
                Ok(report) if report.is_empty() => {
                    debug!("Waiting for new files");
                    tokio::time::sleep(self.config.idle_wait).await;
                }
                Ok(report) => {
                    info!(
                        moved = report.moved.len(),
                        failed = report.failed.len(),
                        "File mover pass complete"
                    );
                    if !report.failed.is_empty() {
                        tokio::time::sleep(self.config.idle_wait).await;
                    }
                }
                Err(e) => {
                    warn!(
                        source = %self.config.source_dir.display(),
                        error = %e,
                        backoff = ?self.config.error_backoff,
                        "Cannot read source directory"
                    );
                    tokio::time::sleep(self.config.error_backoff).await;
                }
            }
        }
    }

    /// Compress and remove every completed file currently in the source directory.
    ///
    /// # Errors
    ///
    /// Returns an error only if the source directory cannot be listed.
    /// Per-file failures are reported in [`MoveReport::failed`].
    pub async fn run_once(&self) -> AppResult<MoveReport> {
        let mut report = MoveReport::default();

        for source in self.pending_files().await? {
            match self.compress(&source).await {
                Ok(()) => report.moved.push(source),
                Err(e) => {
                    warn!(file = %source.display(), error = %e, "Compression failed, keeping source");
                    report.failed.push(source);
                }
            }
        }

        Ok(report)
    }

    /// Regular files in the source directory ending with the configured suffix
    async fn pending_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.config.source_dir).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_candidate = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(&self.config.suffix));
            if is_candidate && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    fn destination_for(&self, source: &Path) -> io::Result<PathBuf> {
        let name = source.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "source path has no file name")
        })?;
        let mut dest_name = name.to_os_string();
        dest_name.push(&self.config.compressed_extension);
        Ok(self.config.dest_dir.join(dest_name))
    }

    async fn compress(&self, source: &Path) -> io::Result<()> {
        let dest = self.destination_for(source)?;
        let output = File::create(&dest)?;

        info!(file = %source.display(), dest = %dest.display(), "Compressing");
        let status = Command::new(&self.config.codec)
            .arg(source)
            .arg("-c")
            .stdout(Stdio::from(output))
            .status()
            .await;

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                discard_partial(&dest).await;
                return Err(e);
            }
        };

        if !status.success() {
            discard_partial(&dest).await;
            return Err(io::Error::other(format!(
                "{} exited with {status}",
                self.config.codec
            )));
        }

        tokio::fs::remove_file(source).await?;
        info!(file = %source.display(), "Deleted source after compression");
        Ok(())
    }
}

async fn discard_partial(dest: &Path) {
    if let Err(e) = tokio::fs::remove_file(dest).await {
        debug!(dest = %dest.display(), error = %e, "Could not remove partial output");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn mover(source: &TempDir, dest: &TempDir, codec: &str) -> FileMover {
        FileMover::new(FileMoverConfig {
            source_dir: source.path().to_path_buf(),
            dest_dir: dest.path().to_path_buf(),
            suffix: ".dat".to_string(),
            codec: codec.to_string(),
            compressed_extension: ".bz2".to_string(),
            idle_wait: Duration::from_millis(10),
            error_backoff: Duration::from_millis(10),
        })
    }

    #[tokio::test]
    async fn test_successful_codec_moves_matching_files() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        std::fs::write(source.path().join("run123_0001.dat"), b"payload").unwrap();
        std::fs::write(source.path().join("run123_0002.dat.tmp"), b"partial").unwrap();
        std::fs::create_dir(source.path().join("sub.dat")).unwrap();

        let report = mover(&source, &dest, "true").run_once().await.unwrap();

        assert_eq!(report.moved, vec![source.path().join("run123_0001.dat")]);
        assert!(report.failed.is_empty());
        assert!(!source.path().join("run123_0001.dat").exists());
        assert!(source.path().join("run123_0002.dat.tmp").exists());
        assert!(dest.path().join("run123_0001.dat.bz2").exists());
    }

    #[tokio::test]
    async fn test_failing_codec_keeps_source() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        std::fs::write(source.path().join("a.dat"), b"payload").unwrap();

        let report = mover(&source, &dest, "false").run_once().await.unwrap();

        assert_eq!(report.failed, vec![source.path().join("a.dat")]);
        assert!(source.path().join("a.dat").exists());
        assert!(!dest.path().join("a.dat.bz2").exists());
    }

    #[tokio::test]
    async fn test_missing_codec_keeps_source() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        std::fs::write(source.path().join("a.dat"), b"payload").unwrap();

        let report = mover(&source, &dest, "no-such-codec-binary")
            .run_once()
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert!(source.path().join("a.dat").exists());
    }

    #[tokio::test]
    async fn test_missing_source_dir_is_error() {
        let dest = TempDir::new().unwrap();
        let gone = TempDir::new().unwrap();
        let mover = mover(&gone, &dest, "true");
        drop(gone);

        assert!(matches!(
            mover.run_once().await,
            Err(crate::error::SyncError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_dir_reports_nothing() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();

        let report = mover(&source, &dest, "true").run_once().await.unwrap();
        assert!(report.is_empty());
    }
}
