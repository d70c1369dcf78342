use crate::{config, metrics, resolver, runtime, tail, watcher};

/// Whether an error ends the exporter or only drops a single event or container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Recoverable,
    Fatal,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] config::Error),
    #[error("failed to follow input: {0}")]
    Tail(#[from] tail::Error),
    #[error("failed to publish metrics: {0}")]
    Publish(#[from] metrics::Error),
    #[error(transparent)]
    Runtime(#[from] runtime::Error),
    #[error(transparent)]
    Resolve(#[from] resolver::Error),
    #[error(transparent)]
    MissingContainerID(#[from] watcher::MissingContainerID),
    #[error("{0} task stopped unexpectedly: {1}")]
    Task(&'static str, #[source] tokio::task::JoinError),
}

impl Error {
    pub fn severity(&self) -> Severity {
        match self {
            Error::Resolve(_) | Error::MissingContainerID(_) => Severity::Recoverable,
            Error::Runtime(err) => match err {
                runtime::Error::SocketConnect { .. } | runtime::Error::Ping { .. } => {
                    Severity::Fatal
                }
                _ => Severity::Recoverable,
            },
            Error::Config(_) | Error::Tail(_) | Error::Publish(_) | Error::Task(..) => {
                Severity::Fatal
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Level at which a skipped event is logged.
    ///
    /// Runtime failures and timeouts lose a real OOM and are errors. Events without a
    /// usable id or name are warnings.
    pub fn log_level(&self) -> log::Level {
        match self {
            Error::Resolve(resolver::Error::Runtime(_) | resolver::Error::Timeout { .. })
            | Error::Runtime(_) => log::Level::Error,
            Error::Resolve(resolver::Error::Name { .. }) | Error::MissingContainerID(_) => {
                log::Level::Warn
            }
            Error::Config(_) | Error::Tail(_) | Error::Publish(_) | Error::Task(..) => {
                log::Level::Error
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
