//! Observer registry fanning slice snapshots out to subscribers.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use common::SliceKey;
use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::SliceSnapshot;

struct SliceChannel {
    sender: watch::Sender<Arc<SliceSnapshot>>,
    subscribers: usize,
    /// Distinguishes this channel from one re-created after a disconnect.
    generation: u64,
}

#[derive(Default)]
struct Registry {
    slices: Mutex<HashMap<SliceKey, SliceChannel>>,
    generations: AtomicU64,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<SliceKey, SliceChannel>> {
        self.slices.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self, key: &SliceKey, generation: u64) {
        let mut slices = self.lock();
        let Some(channel) = slices.get_mut(key) else {
            return;
        };
        if channel.generation != generation {
            return;
        }
        channel.subscribers = channel.subscribers.saturating_sub(1);
        if channel.subscribers == 0 {
            slices.remove(key);
            tracing::debug!(slice = %key, "last subscriber left");
        }
        metrics::gauge!("sync_subscribers").decrement(1.0);
    }
}

/// Publishes committed slice snapshots to every viewer of that slice.
///
/// One `watch` channel per subscribed slice holds the newest snapshot.
/// A snapshot replaces the held one only when its version is higher, so
/// viewers see versions in commit order even when publishers race.
#[derive(Clone, Default)]
pub struct SyncPublisher {
    registry: Arc<Registry>,
}

impl SyncPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a viewer to `current.key`.
    ///
    /// The returned stream yields the newest known snapshot first, which is
    /// `current` unless a newer one was already published.
    pub fn subscribe(&self, current: SliceSnapshot) -> Subscription {
        let subscription = self.attach(&current.key);
        self.publish(current);
        subscription
    }

    /// Registers a viewer of `key` before its current state is known.
    ///
    /// Every snapshot published from here on reaches the viewer. Until one
    /// arrives the channel holds the held snapshot, or the untouched slice
    /// for a channel created here; callers publish what they loaded next.
    pub fn attach(&self, key: &SliceKey) -> Subscription {
        let mut slices = self.registry.lock();

        let channel = slices.entry(key.clone()).or_insert_with(|| SliceChannel {
            sender: watch::Sender::new(Arc::new(SliceSnapshot::untouched(key))),
            subscribers: 0,
            generation: self.registry.generations.fetch_add(1, Ordering::Relaxed),
        });
        channel.subscribers += 1;

        let receiver = channel.sender.subscribe();
        let generation = channel.generation;
        drop(slices);

        metrics::gauge!("sync_subscribers").increment(1.0);
        tracing::debug!(slice = %key, generation, "subscriber attached");

        Subscription {
            key: key.clone(),
            generation,
            stream: WatchStream::new(receiver),
            registry: Arc::clone(&self.registry),
        }
    }

    /// Offers a freshly committed snapshot to the slice's viewers.
    ///
    /// Returns whether anyone was listening. Stale snapshots are ignored.
    pub fn publish(&self, snapshot: SliceSnapshot) -> bool {
        let slices = self.registry.lock();
        let Some(channel) = slices.get(&snapshot.key) else {
            return false;
        };
        if offer(&channel.sender, snapshot) {
            metrics::counter!("sync_snapshots_published_total").increment(1);
        }
        true
    }

    /// Ends every stream of `key`. Viewers see their stream terminate.
    pub fn disconnect(&self, key: &SliceKey) -> usize {
        let removed = self.registry.lock().remove(key);
        let count = removed.map_or(0, |channel| channel.subscribers);
        if count > 0 {
            metrics::gauge!("sync_subscribers").decrement(count as f64);
            tracing::info!(slice = %key, subscribers = count, "slice disconnected");
        }
        count
    }

    /// Ends every stream of every slice.
    pub fn disconnect_all(&self) {
        let keys: Vec<SliceKey> = self.registry.lock().keys().cloned().collect();
        for key in keys {
            self.disconnect(&key);
        }
    }

    /// Slices with at least one attached viewer.
    pub fn active_slices(&self) -> Vec<SliceKey> {
        let mut keys: Vec<_> = self.registry.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn subscriber_count(&self, key: &SliceKey) -> usize {
        self.registry
            .lock()
            .get(key)
            .map_or(0, |channel| channel.subscribers)
    }
}

/// Replaces the held snapshot if `snapshot` is newer.
fn offer(sender: &watch::Sender<Arc<SliceSnapshot>>, snapshot: SliceSnapshot) -> bool {
    sender.send_if_modified(|held| {
        if snapshot.version > held.version {
            *held = Arc::new(snapshot);
            true
        } else {
            false
        }
    })
}

/// A viewer's stream of snapshots for one slice.
///
/// Dropping it detaches the viewer; the slice's channel goes away with its
/// last viewer.
pub struct Subscription {
    key: SliceKey,
    generation: u64,
    stream: WatchStream<Arc<SliceSnapshot>>,
    registry: Arc<Registry>,
}

impl Subscription {
    pub fn key(&self) -> &SliceKey {
        &self.key
    }

    pub fn unsubscribe(self) {}
}

impl Stream for Subscription {
    type Item = Arc<SliceSnapshot>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().stream).poll_next(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.release(&self.key, self.generation);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
