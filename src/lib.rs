//! OOM Exporter: counts kernel OOM kills per container for Prometheus.
//!
//! The kernel log is followed for OOM killer reports, each report is attributed to a
//! container through the container runtime, and per-container counts are published as
//! a text exposition file for a node exporter textfile collector.
use std::sync::Arc;

use config::Config;
use counter::CounterStore;
use error::{Error, Result};
use metrics::MetricsPublisher;
use resolver::ContainerResolver;
use runtime::{ContainerRuntime, DockerRuntime};
use tail::{FileTailer, LineSource};
use watcher::LogWatcher;
use zerofill::ZeroFillLoop;

pub mod config;
pub mod container;
pub mod counter;
pub mod error;
pub mod fsutil;
pub mod metrics;
pub mod resolver;
pub mod runtime;
pub mod tail;
pub mod watcher;
pub mod zerofill;

/// Runs the exporter until a fatal error occurs.
///
/// Startup order: the input is opened, the runtime is contacted, and an empty metrics
/// file is published before the log watcher and the zero-fill loop are started.
///
/// # Errors
///
/// Possible errors include:
/// - The input file does not exist or cannot be read.
/// - The Docker daemon is unreachable at startup.
/// - The metrics file cannot be written.
pub async fn run(config: Config) -> Result<()> {
    log::info!(
        "Following {} and publishing to {}",
        config.input.display(),
        config.output.display()
    );
    let tailer = FileTailer::open(&config.input, config.poll_interval).await?;

    let runtime = DockerRuntime::connect(&config.docker_socket, config.timeout).await?;
    log::debug!("Connected to {}", config.docker_socket.display());

    run_with(config, tailer, runtime).await
}

/// Runs the exporter on the given line source and container runtime.
///
/// Returns `Ok(())` once `source` is exhausted, otherwise runs until a fatal error.
pub async fn run_with<S, R>(config: Config, source: S, runtime: R) -> Result<()>
where
    S: LineSource + Send + 'static,
    R: ContainerRuntime + Send + Sync + 'static,
{
    let store = Arc::new(CounterStore::default());
    let publisher = Arc::new(MetricsPublisher::new(&config.output, &config.tmp_dir));
    let resolver = Arc::new(ContainerResolver::new(
        runtime,
        config.name_policy,
        config.timeout,
    ));

    publisher.publish_async(&store).await?;

    let watcher = LogWatcher::new(
        Arc::clone(&resolver),
        Arc::clone(&store),
        Arc::clone(&publisher),
    );
    let mut watcher = tokio::spawn(async move { watcher.run(source).await });

    let zero_fill = ZeroFillLoop::new(resolver, store, publisher, config.interval);
    let mut zero_fill = tokio::spawn(async move { zero_fill.run().await });

    let result = tokio::select! {
        result = &mut watcher => result.map_err(|err| Error::Task("log watcher", err)),
        result = &mut zero_fill => result.map_err(|err| Error::Task("zero-fill", err)),
    };
    watcher.abort();
    zero_fill.abort();

    result?
}
