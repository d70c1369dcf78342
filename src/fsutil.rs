use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::File;

/// Error that occurs when opening a file fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to open file `{path}`: {source}")]
pub struct FileOpenError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Opens a file at the given path for asynchronous reading.
///
/// # Errors
///
/// Returns a [`FileOpenError`] if the file cannot be opened.
pub async fn open_file(path: impl AsRef<Path>) -> Result<File, FileOpenError> {
    let path = path.as_ref();
    File::open(path).await.map_err(|source| FileOpenError {
        path: path.to_path_buf(),
        source,
    })
}

/// Returns the inode number of a file, used to notice that a path now names another file.
#[cfg(unix)]
pub fn inode(metadata: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

/// Without inodes, replacement is only noticed when the new file is shorter.
#[cfg(not(unix))]
pub fn inode(_metadata: &std::fs::Metadata) -> u64 {
    0
}

/// Returns the directory containing `path`, or `.` for a bare file name.
///
/// # Example
/// ```
/// # use oom_exporter::fsutil;
/// # use std::path::Path;
/// assert_eq!(fsutil::parent_dir("/var/lib/oom.prom"), Path::new("/var/lib"));
/// assert_eq!(fsutil::parent_dir("oom.prom"), Path::new("."));
/// ```
pub fn parent_dir(path: impl AsRef<Path>) -> PathBuf {
    match path.as_ref().parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
