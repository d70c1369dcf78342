//! Prometheus text exposition of the OOM counters.
//!
//! The output file is meant for a textfile collector: it is rewritten from scratch on
//! every publish, into a temporary file next to it, and renamed over the previous
//! version so a scrape never sees a partial file.
use std::fmt::Write as _;
use std::io::{self, Write as _};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::counter::CounterStore;

pub const METRIC_NAME: &str = "oom_totals";
pub const METRIC_DESCRIPTION: &str = "OOM counts per container";

/// Errors that may occur while publishing. All of them are fatal to the exporter.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create temporary file in `{dir}`: {source}")]
    CreateTemp {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write temporary file `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to move temporary file to `{path}`: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("publishing task panicked: {0}")]
    Join(#[source] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Renders counter entries as Prometheus text exposition.
///
/// # Examples
///
/// ```
/// # use oom_exporter::metrics::render;
/// let text = render(&[("myapp".into(), 1)]);
/// assert!(text.ends_with("oom_totals{container=\"myapp\"} 1\n"));
/// ```
pub fn render(entries: &[(Arc<str>, u64)]) -> String {
    let mut out = String::with_capacity(128 + entries.len() * 48);
    // Writing into a String cannot fail.
    let _ = writeln!(out, "# HELP {METRIC_NAME} {METRIC_DESCRIPTION}");
    let _ = writeln!(out, "# TYPE {METRIC_NAME} counter");
    for (name, count) in entries {
        let _ = writeln!(
            out,
            "{METRIC_NAME}{{container=\"{}\"}} {count}",
            escape_label_value(name)
        );
    }
    out
}

/// Escapes `\`, `"` and line feeds as required for label values.
fn escape_label_value(value: &str) -> std::borrow::Cow<'_, str> {
    if !value.contains(['\\', '"', '\n']) {
        return value.into();
    }
    let mut escaped = String::with_capacity(value.len() + 4);
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped.into()
}

/// Writes [`CounterStore`] snapshots to the output file.
#[derive(Debug)]
pub struct MetricsPublisher {
    output: PathBuf,
    tmp_dir: PathBuf,
    // Serializes snapshot and rename so an older snapshot never replaces a newer one.
    publishing: Mutex<()>,
}

impl MetricsPublisher {
    /// Creates a publisher writing to `output`, staging temporary files in `tmp_dir`.
    ///
    /// `tmp_dir` must be on the same filesystem as `output` for the rename to be atomic.
    pub fn new(output: impl Into<PathBuf>, tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            tmp_dir: tmp_dir.into(),
            publishing: Mutex::default(),
        }
    }

    /// Renders the current state of `store` and atomically replaces the output file.
    ///
    /// # Errors
    ///
    /// - [`Error::CreateTemp`] if the temporary file cannot be created.
    /// - [`Error::Write`] if writing or flushing the temporary file fails.
    /// - [`Error::Persist`] if the temporary file cannot be renamed over the output.
    pub fn publish(&self, store: &CounterStore) -> Result<()> {
        let _guard = self
            .publishing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let entries = store.snapshot();
        let text = render(&entries);

        let mut builder = tempfile::Builder::new();
        builder.prefix(".oom_totals").suffix(".tmp");
        #[cfg(unix)]
        builder.permissions(readable_permissions());
        let mut tmp = builder
            .tempfile_in(&self.tmp_dir)
            .map_err(|source| Error::CreateTemp {
                dir: self.tmp_dir.clone(),
                source,
            })?;

        let write = |tmp: &mut tempfile::NamedTempFile| -> io::Result<()> {
            tmp.write_all(text.as_bytes())?;
            tmp.flush()?;
            tmp.as_file().sync_all()
        };
        write(&mut tmp).map_err(|source| Error::Write {
            path: tmp.path().to_path_buf(),
            source,
        })?;

        tmp.persist(&self.output).map_err(|err| Error::Persist {
            path: self.output.clone(),
            source: err.error,
        })?;
        log::trace!(
            "Published {} series to {}",
            entries.len(),
            self.output.display()
        );

        Ok(())
    }

    /// Runs [`MetricsPublisher::publish`] on the blocking thread pool.
    pub async fn publish_async(self: &Arc<Self>, store: &Arc<CounterStore>) -> Result<()> {
        let publisher = Arc::clone(self);
        let store = Arc::clone(store);
        tokio::task::spawn_blocking(move || publisher.publish(&store))
            .await
            .map_err(Error::Join)?
    }
}

#[cfg(unix)]
fn readable_permissions() -> std::fs::Permissions {
    use std::os::unix::fs::PermissionsExt;
    // The collector usually runs as a different user.
    std::fs::Permissions::from_mode(0o644)
}
