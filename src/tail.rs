//! Follow-mode reading of a growing log file.
//!
//! [`FileTailer`] starts at the end of the file and hands out complete lines as they are
//! appended, waiting for more at end of file. A truncated or replaced file is read again
//! from its beginning.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};

use crate::fsutil::{self, FileOpenError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Open(#[from] FileOpenError),
    #[error("failed to read metadata of `{path}`: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to seek to the end of `{path}`: {source}")]
    Seek {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read line for file `{path}`: {source}")]
    ReadLine {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A source of text lines.
///
/// `Ok(None)` means the source is exhausted; a [`FileTailer`] never is.
pub trait LineSource {
    fn next_line(&mut self) -> impl std::future::Future<Output = Result<Option<String>>> + Send;
}

/// Reads lines appended to a file after it was opened.
#[derive(Debug)]
pub struct FileTailer {
    path: PathBuf,
    reader: BufReader<File>,
    inode: u64,
    offset: u64,
    pending: Vec<u8>,
    poll_interval: Duration,
}

impl FileTailer {
    /// Opens `path` and positions the tailer at its current end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Open`] if the file does not exist or cannot be opened.
    pub async fn open(path: impl AsRef<Path>, poll_interval: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = fsutil::open_file(&path).await?;
        let metadata = file.metadata().await.map_err(|source| Error::Metadata {
            path: path.clone(),
            source,
        })?;
        let offset = file
            .seek(SeekFrom::End(0))
            .await
            .map_err(|source| Error::Seek {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            inode: fsutil::inode(&metadata),
            reader: BufReader::new(file),
            offset,
            pending: Vec::with_capacity(256),
            poll_interval,
            path,
        })
    }

    /// Waits for the next complete line, without its line terminator.
    ///
    /// Bytes that are not valid UTF-8 are replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadLine`] if reading fails, and [`Error::Open`] or
    /// [`Error::Metadata`] if a replaced file cannot be reopened.
    pub async fn next_line(&mut self) -> Result<String> {
        loop {
            let n = self
                .reader
                .read_until(b'\n', &mut self.pending)
                .await
                .map_err(|source| Error::ReadLine {
                    path: self.path.clone(),
                    source,
                })?;
            self.offset += n as u64;

            if self.pending.last() == Some(&b'\n') {
                let line = String::from_utf8_lossy(&self.pending)
                    .trim_end_matches(['\n', '\r'])
                    .to_owned();
                self.pending.clear();
                return Ok(line);
            }

            if n == 0 && !self.reopen_if_rotated().await? {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
    }

    /// Switches to the beginning of the file if it was truncated or replaced.
    ///
    /// Returns `true` if the tailer switched.
    async fn reopen_if_rotated(&mut self) -> Result<bool> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            // replaced, but the new file does not exist yet
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(source) => {
                return Err(Error::Metadata {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let inode = fsutil::inode(&metadata);
        if inode == self.inode && metadata.len() >= self.offset {
            return Ok(false);
        }

        log::info!(
            "{} was truncated or replaced, reading it from the start",
            self.path.display()
        );
        let file = fsutil::open_file(&self.path).await?;
        self.reader = BufReader::new(file);
        self.inode = inode;
        self.offset = 0;
        self.pending.clear();
        Ok(true)
    }
}

impl LineSource for FileTailer {
    async fn next_line(&mut self) -> Result<Option<String>> {
        FileTailer::next_line(self).await.map(Some)
    }
}

impl LineSource for tokio::sync::mpsc::Receiver<String> {
    async fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.recv().await)
    }
}
