use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::container::{self, ContainerID, NamePolicy};
use crate::runtime::{self, ContainerRuntime};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Runtime(#[from] runtime::Error),
    #[error("container runtime did not answer within {timeout:?} ({operation})")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
    #[error("failed to derive friendly name for container `{id}`: {source}")]
    Name {
        id: ContainerID,
        #[source]
        source: container::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Maps short container ids to friendly names through the container runtime.
///
/// Successful lookups are cached; [`ContainerResolver::retain_running`] drops entries for
/// containers that went away.
#[derive(Debug)]
pub struct ContainerResolver<R> {
    runtime: R,
    policy: NamePolicy,
    timeout: Duration,
    names: DashMap<ContainerID, Arc<str>>,
}

impl<R: ContainerRuntime> ContainerResolver<R> {
    /// Creates a resolver. Every runtime call is abandoned after `timeout`.
    pub fn new(runtime: R, policy: NamePolicy, timeout: Duration) -> Self {
        Self {
            runtime,
            policy,
            timeout,
            names: DashMap::default(),
        }
    }

    /// Resolves the friendly name of the container with the given short id.
    ///
    /// # Errors
    ///
    /// - [`Error::Runtime`] if the runtime query fails, including unknown containers.
    /// - [`Error::Timeout`] if the runtime does not answer in time.
    /// - [`Error::Name`] if the name does not follow the convention under
    ///   [`NamePolicy::Strict`].
    ///
    /// All of them concern a single container only.
    pub async fn resolve(&self, id: &ContainerID) -> Result<Arc<str>> {
        if let Some(name) = self.names.get(id) {
            return Ok(Arc::clone(name.value()));
        }

        let runtime_name = tokio::time::timeout(self.timeout, self.runtime.inspect_name(id))
            .await
            .map_err(|_| Error::Timeout {
                operation: "inspect",
                timeout: self.timeout,
            })??;

        let name = self
            .policy
            .friendly_name(&runtime_name)
            .map_err(|source| Error::Name {
                id: id.clone(),
                source,
            })?;
        log::trace!("Resolved container {} to `{}`", id, name);

        self.names.insert(id.clone(), Arc::clone(&name));
        Ok(name)
    }

    /// Lists the short ids of all running containers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] or [`Error::Timeout`] if the listing fails.
    pub async fn list_running(&self) -> Result<Vec<ContainerID>> {
        let ids = tokio::time::timeout(self.timeout, self.runtime.list_running())
            .await
            .map_err(|_| Error::Timeout {
                operation: "list",
                timeout: self.timeout,
            })??;
        Ok(ids)
    }

    /// Forgets cached names of containers that are not in `running`.
    pub fn retain_running(&self, running: &[ContainerID]) {
        let running: HashSet<&ContainerID> = running.iter().collect();
        self.names.retain(|id, _| running.contains(id));
    }

    /// Number of cached names.
    pub fn cached(&self) -> usize {
        self.names.len()
    }
}
