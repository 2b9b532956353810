//! Subscriptions that survive transport drops.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::SliceKey;
use futures_core::Stream;
use futures_util::StreamExt;
use futures_util::stream;

use super::SliceSnapshot;
use crate::error::Result;

/// Boxed stream of snapshots, as handed out by a [`SnapshotFeed`].
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Arc<SliceSnapshot>> + Send>>;

/// Anything a viewer can (re)connect to for a slice's snapshots.
///
/// Every successful connect must start with the full current snapshot.
#[async_trait]
pub trait SnapshotFeed: Send + Sync {
    async fn connect(&self, key: &SliceKey) -> Result<SnapshotStream>;
}

/// Exponential backoff between reconnect attempts.
///
/// # Default Values
///
/// - `initial_delay`: 100ms
/// - `max_delay`: 10 seconds
/// - `multiplier`: 2.0
/// - `max_attempts`: 10 consecutive failures before giving up
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_attempts: usize,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            max_attempts: 10,
        }
    }
}

impl BackoffPolicy {
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Delay before retry number `attempt` (zero-based), capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return self.initial_delay.min(self.max_delay);
        }

        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis(delay_ms as u64).min(self.max_delay)
    }
}

/// Wraps a [`SnapshotFeed`] and reconnects whenever its stream ends.
///
/// Each reconnect redelivers a full snapshot, so a viewer never has to
/// reconcile partial state. The stream ends for good after
/// `max_attempts` consecutive failed connects.
pub struct ReconnectingSubscription<F: SnapshotFeed> {
    feed: Arc<F>,
    key: SliceKey,
    policy: BackoffPolicy,
}

struct State<F: SnapshotFeed> {
    feed: Arc<F>,
    key: SliceKey,
    policy: BackoffPolicy,
    current: Option<SnapshotStream>,
    connects: usize,
}

impl<F: SnapshotFeed + 'static> ReconnectingSubscription<F> {
    pub fn new(feed: Arc<F>, key: SliceKey, policy: BackoffPolicy) -> Self {
        Self { feed, key, policy }
    }

    /// Turns the subscription into a stream of snapshots.
    pub fn into_stream(self) -> SnapshotStream {
        let state = State {
            feed: self.feed,
            key: self.key,
            policy: self.policy,
            current: None,
            connects: 0,
        };

        Box::pin(stream::unfold(state, |mut state| async move {
            loop {
                if let Some(current) = state.current.as_mut() {
                    if let Some(snapshot) = current.next().await {
                        return Some((snapshot, state));
                    }
                    state.current = None;
                    tracing::info!(slice = %state.key, "snapshot stream ended, reconnecting");
                }

                let reconnecting = state.connects > 0;
                let stream =
                    connect_with_backoff(&*state.feed, &state.key, &state.policy, reconnecting)
                        .await?;
                state.current = Some(stream);
                state.connects += 1;
                if state.connects > 1 {
                    metrics::counter!("sync_reconnects_total").increment(1);
                }
            }
        }))
    }
}

async fn connect_with_backoff<F: SnapshotFeed>(
    feed: &F,
    key: &SliceKey,
    policy: &BackoffPolicy,
    reconnecting: bool,
) -> Option<SnapshotStream> {
    let mut attempt = 0;
    loop {
        // The first connect is immediate, reconnects back off from the start.
        if reconnecting || attempt > 0 {
            tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
        }
        match feed.connect(key).await {
            Ok(stream) => return Some(stream),
            Err(err) => {
                attempt += 1;
                tracing::warn!(slice = %key, attempt, error = %err, "snapshot connect failed");
                if attempt >= policy.max_attempts {
                    tracing::error!(slice = %key, "giving up on snapshot stream");
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AllocationError;
    use event_store::Version;
    use std::sync::Mutex;

    fn key() -> SliceKey {
        SliceKey::show("gala-2024").unwrap()
    }

    fn snapshot(version: i64) -> Arc<SliceSnapshot> {
        Arc::new(SliceSnapshot {
            key: key(),
            version: Version::new(version),
            last_updated: None,
            units: Default::default(),
        })
    }

    /// Feed scripted per connect: `Ok(versions)` yields those then ends.
    struct ScriptedFeed {
        script: Mutex<Vec<std::result::Result<Vec<i64>, ()>>>,
    }

    #[async_trait]
    impl SnapshotFeed for ScriptedFeed {
        async fn connect(&self, _key: &SliceKey) -> Result<SnapshotStream> {
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.is_empty() {
                    Err(())
                } else {
                    script.remove(0)
                }
            };
            match next {
                Ok(versions) => {
                    let items: Vec<_> = versions.into_iter().map(snapshot).collect();
                    Ok(Box::pin(stream::iter(items)))
                }
                Err(()) => Err(AllocationError::Unavailable("feed down".into())),
            }
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = BackoffPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_attempts: 5,
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_drop_and_failures() {
        let feed = Arc::new(ScriptedFeed {
            script: Mutex::new(vec![Ok(vec![1, 2]), Err(()), Err(()), Ok(vec![5])]),
        });
        let stream = ReconnectingSubscription::new(feed, key(), BackoffPolicy::default())
            .into_stream();

        let versions: Vec<i64> = stream
            .take(3)
            .map(|s| s.version.as_i64())
            .collect()
            .await;

        assert_eq!(versions, vec![1, 2, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let feed = Arc::new(ScriptedFeed {
            script: Mutex::new(vec![Ok(vec![1])]),
        });
        let policy = BackoffPolicy::default().with_max_attempts(3);
        let stream = ReconnectingSubscription::new(feed, key(), policy).into_stream();

        let versions: Vec<i64> = stream.map(|s| s.version.as_i64()).collect().await;

        assert_eq!(versions, vec![1]);
    }
}
