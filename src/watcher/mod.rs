//! Kernel log watching.
//!
//! [`LogWatcher`] drives an [`OomDetector`] over a [`LineSource`], attributes each OOM
//! report to a container and bumps that container's counter.
mod detect;

pub use detect::{MissingContainerID, OOM_TRIGGER, OomDetector, OomEvent, extract_container_id};

use std::sync::Arc;

use crate::counter::CounterStore;
use crate::error::{Result, Severity};
use crate::metrics::MetricsPublisher;
use crate::resolver::ContainerResolver;
use crate::runtime::ContainerRuntime;
use crate::tail::LineSource;

pub struct LogWatcher<R> {
    resolver: Arc<ContainerResolver<R>>,
    store: Arc<CounterStore>,
    publisher: Arc<MetricsPublisher>,
}

impl<R: ContainerRuntime> LogWatcher<R> {
    pub fn new(
        resolver: Arc<ContainerResolver<R>>,
        store: Arc<CounterStore>,
        publisher: Arc<MetricsPublisher>,
    ) -> Self {
        Self {
            resolver,
            store,
            publisher,
        }
    }

    /// Consumes `source` until it is exhausted or a fatal error occurs.
    ///
    /// Events that cannot be attributed to a container are logged and dropped.
    pub async fn run(&self, mut source: impl LineSource) -> Result<()> {
        let mut detector = OomDetector::default();
        while let Some(line) = source.next_line().await? {
            let Some(event) = detector.feed(line) else {
                continue;
            };
            match self.handle(&event).await {
                Ok(()) => {}
                Err(err) if err.severity() == Severity::Recoverable => {
                    log::log!(err.log_level(), "Skipping OOM event: {}", err);
                }
                Err(err) => return Err(err),
            }
        }
        log::debug!("Log source exhausted");
        Ok(())
    }

    /// Counts a single OOM event and publishes the new state.
    ///
    /// # Errors
    ///
    /// Recoverable errors if the event cannot be attributed,
    /// [`crate::error::Error::Publish`] if the metrics file cannot be written.
    pub async fn handle(&self, event: &OomEvent) -> Result<()> {
        let id = event.container_id()?;
        let name = self.resolver.resolve(&id).await?;
        let count = self.store.increment(&name);
        log::info!(
            "OOM kill in container `{}` ({}), total {}",
            name,
            id,
            count
        );
        self.publisher.publish_async(&self.store).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::container::NamePolicy;
    use crate::error::Error;
    use crate::resolver::tests::FakeRuntime;

    struct Fixture {
        _dir: tempfile::TempDir,
        output: std::path::PathBuf,
        store: Arc<CounterStore>,
        watcher: LogWatcher<FakeRuntime>,
    }

    fn fixture(containers: &[(&str, &str)], policy: NamePolicy) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("oom.prom");
        let store = Arc::new(CounterStore::default());
        let resolver = Arc::new(ContainerResolver::new(
            FakeRuntime::with(containers),
            policy,
            Duration::from_secs(1),
        ));
        let publisher = Arc::new(MetricsPublisher::new(&output, dir.path()));
        let watcher = LogWatcher::new(resolver, Arc::clone(&store), publisher);
        Fixture {
            _dir: dir,
            output,
            store,
            watcher,
        }
    }

    async fn run_lines(watcher: &LogWatcher<FakeRuntime>, lines: &[&str]) -> Result<()> {
        let (tx, rx) = tokio::sync::mpsc::channel(lines.len().max(1));
        for line in lines {
            tx.send(line.to_string()).await.unwrap();
        }
        drop(tx);
        watcher.run(rx).await
    }

    #[tokio::test]
    async fn test_counts_resolved_oom() {
        let f = fixture(&[("abcdef012345", "myapp")], NamePolicy::Fallback);

        run_lines(
            &f.watcher,
            &["foo invoked oom-killer", "bar cpuset=abcdef012345"],
        )
        .await
        .unwrap();

        assert_eq!(f.store.snapshot(), vec![("myapp".into(), 1)]);
        let text = std::fs::read_to_string(&f.output).unwrap();
        assert!(text.contains("oom_totals{container=\"myapp\"} 1\n"));
    }

    #[tokio::test]
    async fn test_counts_per_container() {
        let f = fixture(
            &[
                ("abcdef012345", "/ecs-shop-3-checkout-aabbccddeeff00112233"),
                ("0123456789ab", "/ecs-shop-3-cart-aabbccddeeff00112233"),
            ],
            NamePolicy::Strict,
        );

        let mut lines = Vec::new();
        for id in ["abcdef012345", "0123456789ab", "abcdef012345", "abcdef012345"] {
            lines.push("kernel: java invoked oom-killer: gfp_mask=0x14200ca".to_owned());
            lines.push(format!("kernel: java cpuset={id} mems_allowed=0"));
            lines.push("kernel: CPU: 3 PID: 1234 Comm: java".to_owned());
        }
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        run_lines(&f.watcher, &lines).await.unwrap();

        assert_eq!(f.store.get("checkout"), Some(3));
        assert_eq!(f.store.get("cart"), Some(1));
    }

    #[tokio::test]
    async fn test_unmatched_id_line_is_dropped() {
        let f = fixture(&[("abcdef012345", "myapp")], NamePolicy::Fallback);

        run_lines(
            &f.watcher,
            &[
                "foo invoked oom-killer",
                "bar cpuset=/ mems_allowed=0",
                "foo invoked oom-killer",
                "bar cpuset=abcdef012345",
            ],
        )
        .await
        .unwrap();

        assert_eq!(f.store.get("myapp"), Some(1));
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_container_is_skipped() {
        let f = fixture(&[], NamePolicy::Fallback);

        run_lines(
            &f.watcher,
            &["foo invoked oom-killer", "bar cpuset=abcdef012345"],
        )
        .await
        .unwrap();

        assert!(f.store.is_empty());
        assert!(!f.output.exists());
    }

    #[tokio::test]
    async fn test_strict_policy_skips_unconventional_names() {
        let f = fixture(&[("abcdef012345", "/redis")], NamePolicy::Strict);

        run_lines(
            &f.watcher,
            &["foo invoked oom-killer", "bar cpuset=abcdef012345"],
        )
        .await
        .unwrap();

        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_is_fatal() {
        let store = Arc::new(CounterStore::default());
        let resolver = Arc::new(ContainerResolver::new(
            FakeRuntime::with(&[("abcdef012345", "myapp")]),
            NamePolicy::Fallback,
            Duration::from_secs(1),
        ));
        let publisher = Arc::new(MetricsPublisher::new(
            "/definitely/does/not/exist/oom.prom",
            "/definitely/does/not/exist",
        ));
        let watcher = LogWatcher::new(resolver, Arc::clone(&store), publisher);

        let err = run_lines(&watcher, &["foo invoked oom-killer", "bar cpuset=abcdef012345"])
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, Error::Publish(_)));
    }
}
