//! Container runtime access.
//!
//! The exporter needs two queries from the runtime: the name of a container given its
//! short id, and the ids of all running containers. [`ContainerRuntime`] captures those
//! so the rest of the crate does not depend on a particular engine; [`DockerRuntime`]
//! implements it against the Docker Engine API.
mod docker;
mod error;

pub use docker::DockerRuntime;
pub use error::{Error, Result};

use crate::container::ContainerID;

pub trait ContainerRuntime {
    /// Returns the runtime-supplied name of the container.
    fn inspect_name(
        &self,
        id: &ContainerID,
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Returns the ids of all currently running containers.
    fn list_running(&self) -> impl std::future::Future<Output = Result<Vec<ContainerID>>> + Send;
}
