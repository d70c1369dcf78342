use std::path::{Path, PathBuf};
use std::time::Duration;

use bollard::Docker;
use bollard::query_parameters::{
    InspectContainerOptions, InspectContainerOptionsBuilder, ListContainersOptions,
    ListContainersOptionsBuilder,
};

use crate::container::ContainerID;

use super::{ContainerRuntime, Error, Result};

/// [`ContainerRuntime`] backed by the Docker Engine API on a unix socket.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects to the Docker daemon listening on `socket_path` and checks that it answers.
    ///
    /// `timeout` bounds every request made through this client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SocketConnect`] if the client cannot be created and [`Error::Ping`]
    /// if the daemon does not respond.
    pub async fn connect(socket_path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let path = socket_path.as_ref();
        log::debug!("Connecting to {}...", path.display());
        let docker = Docker::connect_with_unix(
            &path.to_string_lossy(),
            timeout.as_secs().max(1),
            bollard::API_DEFAULT_VERSION,
        )
        .map_err(|source| Error::SocketConnect {
            path: PathBuf::from(path),
            source,
        })?;

        docker.ping().await.map_err(|source| Error::Ping {
            path: PathBuf::from(path),
            source,
        })?;
        log::debug!("Connected to {}.", path.display());

        Ok(Self { docker })
    }
}

impl ContainerRuntime for DockerRuntime {
    async fn inspect_name(&self, id: &ContainerID) -> Result<String> {
        let options: InspectContainerOptions = InspectContainerOptionsBuilder::new().build();

        match self.docker.inspect_container(id.as_ref(), Some(options)).await {
            Ok(info) => info.name.ok_or_else(|| Error::MissingName(id.clone())),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Err(Error::NotFound(id.clone())),
            Err(source) => Err(Error::Inspect {
                id: id.clone(),
                source,
            }),
        }
    }

    async fn list_running(&self) -> Result<Vec<ContainerID>> {
        let options: ListContainersOptions = ListContainersOptionsBuilder::new().all(false).build();

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(Error::List)?;

        let mut ids = Vec::with_capacity(containers.len());
        for container in containers {
            let Some(raw_id) = container.id else {
                log::warn!("Runtime listed a container without an id");
                continue;
            };
            match ContainerID::from_full_id(&raw_id) {
                Ok(id) => ids.push(id),
                Err(err) => log::warn!("failed to parse ContainerID: {}", err),
            }
        }

        Ok(ids)
    }
}
