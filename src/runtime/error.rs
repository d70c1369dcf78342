use std::path::PathBuf;

use crate::container::ContainerID;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to socket `{path}`: {source}")]
    SocketConnect {
        path: PathBuf,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("container runtime at `{path}` is not responding: {source}")]
    Ping {
        path: PathBuf,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("container `{0}` not found")]
    NotFound(ContainerID),
    #[error("failed to inspect container `{id}`: {source}")]
    Inspect {
        id: ContainerID,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("container `{0}` has no name")]
    MissingName(ContainerID),
    #[error("failed to list running containers: {0}")]
    List(#[source] bollard::errors::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
