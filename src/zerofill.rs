use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::counter::CounterStore;
use crate::error::Result;
use crate::metrics::MetricsPublisher;
use crate::resolver::ContainerResolver;
use crate::runtime::ContainerRuntime;

/// Keeps a zero-valued series for every running container.
///
/// A counter series that first appears with a non-zero value breaks `rate()` and
/// `increase()`, so each running container gets a 0 entry before its first OOM.
pub struct ZeroFillLoop<R> {
    resolver: Arc<ContainerResolver<R>>,
    store: Arc<CounterStore>,
    publisher: Arc<MetricsPublisher>,
    interval: Duration,
}

impl<R: ContainerRuntime> ZeroFillLoop<R> {
    pub fn new(
        resolver: Arc<ContainerResolver<R>>,
        store: Arc<CounterStore>,
        publisher: Arc<MetricsPublisher>,
        interval: Duration,
    ) -> Self {
        Self {
            resolver,
            store,
            publisher,
            interval,
        }
    }

    /// Runs [`ZeroFillLoop::tick`] forever, once per interval. Returns only on fatal errors.
    pub async fn run(&self) -> Result<()> {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.tick().await?;
        }
    }

    /// Lists running containers, ensures each has a counter and publishes.
    ///
    /// Containers that cannot be resolved are skipped until the next tick; a failed
    /// listing skips the whole pass. The metrics file is published either way.
    ///
    /// Returns the number of counters created.
    ///
    /// # Errors
    ///
    /// Only [`crate::error::Error::Publish`].
    pub async fn tick(&self) -> Result<usize> {
        let mut added = 0;
        match self.resolver.list_running().await {
            Ok(ids) => {
                log::trace!("Zero-fill pass over {} running containers", ids.len());
                self.resolver.retain_running(&ids);
                for id in &ids {
                    match self.resolver.resolve(id).await {
                        Ok(name) => {
                            if self.store.ensure_present(&name) {
                                log::debug!("Registered container `{}` ({})", name, id);
                                added += 1;
                            }
                        }
                        Err(err) => log::warn!("Skipping container {} in zero-fill: {}", id, err),
                    }
                }
            }
            Err(err) => log::warn!("Skipping zero-fill pass: {}", err),
        }

        self.publisher.publish_async(&self.store).await?;
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::NamePolicy;
    use crate::error::Error;
    use crate::resolver::tests::FakeRuntime;

    fn zero_fill(
        runtime: FakeRuntime,
        policy: NamePolicy,
        dir: &tempfile::TempDir,
    ) -> (Arc<CounterStore>, ZeroFillLoop<FakeRuntime>) {
        let store = Arc::new(CounterStore::default());
        let resolver = Arc::new(ContainerResolver::new(runtime, policy, Duration::from_secs(1)));
        let publisher = Arc::new(MetricsPublisher::new(dir.path().join("oom.prom"), dir.path()));
        let zero_fill = ZeroFillLoop::new(
            resolver,
            Arc::clone(&store),
            publisher,
            Duration::from_secs(10),
        );
        (store, zero_fill)
    }

    #[tokio::test]
    async fn test_tick_registers_running_containers_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = FakeRuntime::with(&[
            ("abcdef012345", "/ecs-shop-3-checkout-aabbccddeeff00112233"),
            ("0123456789ab", "/redis"),
        ]);
        let (store, zero_fill) = zero_fill(runtime, NamePolicy::Fallback, &dir);

        assert_eq!(zero_fill.tick().await.unwrap(), 2);
        assert_eq!(store.get("checkout"), Some(0));
        assert_eq!(store.get("redis"), Some(0));

        let text = std::fs::read_to_string(dir.path().join("oom.prom")).unwrap();
        assert!(text.contains("oom_totals{container=\"checkout\"} 0\n"));
        assert!(text.contains("oom_totals{container=\"redis\"} 0\n"));
    }

    #[tokio::test]
    async fn test_tick_does_not_reset_counts() {
        let dir = tempfile::tempdir().unwrap();
        let (store, zero_fill) =
            zero_fill(FakeRuntime::with(&[("0123456789ab", "/redis")]), NamePolicy::Fallback, &dir);
        store.increment("redis");

        assert_eq!(zero_fill.tick().await.unwrap(), 0);
        assert_eq!(zero_fill.tick().await.unwrap(), 0);
        assert_eq!(store.get("redis"), Some(1));
    }

    #[tokio::test]
    async fn test_tick_skips_unresolvable_containers() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = FakeRuntime::with(&[
            ("abcdef012345", "/ecs-shop-3-checkout-aabbccddeeff00112233"),
            ("0123456789ab", "/redis"),
        ]);
        let (store, zero_fill) = zero_fill(runtime, NamePolicy::Strict, &dir);

        assert_eq!(zero_fill.tick().await.unwrap(), 1);
        assert_eq!(store.snapshot(), vec![("checkout".into(), 0)]);
    }

    #[tokio::test]
    async fn test_tick_publishes_when_nothing_changes() {
        let dir = tempfile::tempdir().unwrap();
        let (store, zero_fill) = zero_fill(FakeRuntime::default(), NamePolicy::Fallback, &dir);

        assert_eq!(zero_fill.tick().await.unwrap(), 0);
        assert!(store.is_empty());
        let text = std::fs::read_to_string(dir.path().join("oom.prom")).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_publishes_when_listing_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = FakeRuntime {
            stall: true,
            ..Default::default()
        };
        let (_store, zero_fill) = zero_fill(runtime, NamePolicy::Fallback, &dir);

        assert_eq!(zero_fill.tick().await.unwrap(), 0);
        assert!(dir.path().join("oom.prom").exists());
    }

    #[tokio::test]
    async fn test_run_stops_on_publish_failure() {
        let store = Arc::new(CounterStore::default());
        let resolver = Arc::new(ContainerResolver::new(
            FakeRuntime::default(),
            NamePolicy::Fallback,
            Duration::from_secs(1),
        ));
        let publisher = Arc::new(MetricsPublisher::new(
            "/definitely/does/not/exist/oom.prom",
            "/definitely/does/not/exist",
        ));
        let zero_fill = ZeroFillLoop::new(resolver, store, publisher, Duration::from_millis(10));

        let err = zero_fill.run().await.unwrap_err();
        assert!(matches!(err, Error::Publish(_)));
    }
}
