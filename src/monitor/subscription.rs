//! Subscriptions handed to the presentation layer
//!
//! A `Feed` owns the backend listeners of one subscription together with the
//! projection state they update. Every callback goes through the feed's
//! mutex, so projection updates and emissions are serialized no matter which
//! thread the backend calls from. The matching `Subscription` is the
//! receiving end: a lazy, non-restartable sequence that ends after a
//! terminal error or after `dispose`.

use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::mpsc;

use super::MonitorError;
use crate::backend::{BackendError, DbPath, ListenerId, RealtimeBackend, Snapshot};

/// Lifecycle of one subscription
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Listening to the backend
    Subscribed,

    /// A terminal error was delivered; listeners are detached
    Errored,

    /// Disposed by the caller; listeners are detached
    Disposed,
}

type Emission<T> = Result<T, MonitorError>;

trait Disposable: Send + Sync {
    fn dispose(&self) -> bool;
    fn state(&self) -> SubscriptionState;
}

struct FeedInner<T, P> {
    state: SubscriptionState,
    listeners: Vec<ListenerId>,
    projector: P,
    tx: Option<mpsc::UnboundedSender<Emission<T>>>,
}

pub(crate) struct Feed<T, P> {
    label: String,
    backend: Arc<dyn RealtimeBackend>,
    inner: Mutex<FeedInner<T, P>>,
}

impl<T, P> Feed<T, P>
where
    T: Send + 'static,
    P: Send + 'static,
{
    /// Create a feed and the subscription that reads from it
    pub(crate) fn open(
        label: impl Into<String>,
        backend: Arc<dyn RealtimeBackend>,
        projector: P,
    ) -> (Arc<Self>, Subscription<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let feed = Arc::new(Self {
            label: label.into(),
            backend,
            inner: Mutex::new(FeedInner {
                state: SubscriptionState::Subscribed,
                listeners: Vec::new(),
                projector,
                tx: Some(tx),
            }),
        });
        let subscription = Subscription {
            rx,
            handle: feed.clone(),
            done: false,
        };
        (feed, subscription)
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state() == SubscriptionState::Subscribed
    }

    /// Attach a backend listener whose snapshots are folded into the
    /// projector by `apply`. Does nothing once the feed has stopped.
    pub(crate) fn listen<F>(self: &Arc<Self>, path: &DbPath, apply: F)
    where
        F: Fn(&mut P, Snapshot) -> T + Send + Sync + 'static,
    {
        if !self.is_active() {
            return;
        }
        let feed = Arc::clone(self);
        let id = self
            .backend
            .subscribe(path, Box::new(move |result: Result<Snapshot, BackendError>| {
                feed.deliver(result, &apply)
            }));
        self.attach(id);
    }

    fn attach(&self, id: ListenerId) {
        let accepted = match self.inner.lock() {
            Ok(mut inner) if inner.state == SubscriptionState::Subscribed => {
                inner.listeners.push(id);
                true
            }
            _ => false,
        };
        // Stopped while the backend delivered the first snapshot
        if !accepted {
            self.backend.unsubscribe(id);
        }
    }

    fn deliver<F>(&self, result: Result<Snapshot, BackendError>, apply: &F)
    where
        F: Fn(&mut P, Snapshot) -> T,
    {
        let detached = {
            // A poisoned projector cannot be trusted; end the feed with an error
            let (mut inner, result) = match self.inner.lock() {
                Ok(inner) => (inner, result),
                Err(poisoned) => (
                    poisoned.into_inner(),
                    Err(BackendError::StorageError(format!(
                        "subscription {} state poisoned",
                        self.label
                    ))),
                ),
            };
            if inner.state != SubscriptionState::Subscribed {
                return;
            }
            match result {
                Ok(snapshot) => {
                    let emission = apply(&mut inner.projector, snapshot);
                    if let Some(tx) = &inner.tx {
                        let _ = tx.send(Ok(emission));
                    }
                    return;
                }
                Err(e) => {
                    log::warn!("Subscription {} failed: {}", self.label, e);
                    inner.state = SubscriptionState::Errored;
                    if let Some(tx) = inner.tx.take() {
                        let _ = tx.send(Err(e.into()));
                    }
                    std::mem::take(&mut inner.listeners)
                }
            }
        };
        for id in detached {
            self.backend.unsubscribe(id);
        }
    }
}

impl<T, P> Disposable for Feed<T, P>
where
    T: Send + 'static,
    P: Send + 'static,
{
    fn dispose(&self) -> bool {
        let detached = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if inner.state == SubscriptionState::Disposed {
                return false;
            }
            inner.state = SubscriptionState::Disposed;
            inner.tx = None;
            std::mem::take(&mut inner.listeners)
        };
        log::info!("Disposing subscription {} ({} listener(s))", self.label, detached.len());
        for id in detached {
            self.backend.unsubscribe(id);
        }
        true
    }

    fn state(&self) -> SubscriptionState {
        match self.inner.lock() {
            Ok(inner) => inner.state,
            Err(poisoned) => match poisoned.into_inner().state {
                SubscriptionState::Disposed => SubscriptionState::Disposed,
                _ => SubscriptionState::Errored,
            },
        }
    }
}

/// A live sequence of projections.
///
/// Yields `Ok` values as the backend changes. A backend failure is yielded
/// once as `Err`, after which the sequence ends; resubscribe to recover.
/// Dropping the subscription disposes it.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<Emission<T>>,
    handle: Arc<dyn Disposable>,
    done: bool,
}

impl<T> Subscription<T> {
    /// Wait for the next value. `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<Emission<T>> {
        if self.is_finished() {
            return None;
        }
        let item = self.rx.recv().await;
        self.observe(item)
    }

    /// Take the next value if one is already queued, without waiting.
    pub fn next_ready(&mut self) -> Option<Emission<T>> {
        if self.is_finished() {
            return None;
        }
        match self.rx.try_recv() {
            Ok(item) => self.observe(Some(item)),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => self.observe(None),
        }
    }

    /// Stop listening. The first call detaches the backend listeners and
    /// returns `true`; later calls return `false`.
    pub fn dispose(&self) -> bool {
        self.handle.dispose()
    }

    pub fn state(&self) -> SubscriptionState {
        self.handle.state()
    }

    fn is_finished(&self) -> bool {
        self.done || self.handle.state() == SubscriptionState::Disposed
    }

    fn observe(&mut self, item: Option<Emission<T>>) -> Option<Emission<T>> {
        match item {
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e))
            }
            None => {
                self.done = true;
                None
            }
            some => some,
        }
    }
}

impl<T> futures_util::stream::Stream for Subscription<T> {
    type Item = Emission<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.is_finished() {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(item) => Poll::Ready(this.observe(item)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.handle.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use serde_json::json;

    fn counting_feed(
        backend: &Arc<InMemoryBackend>,
    ) -> (Arc<Feed<usize, usize>>, Subscription<usize>) {
        Feed::open("test", backend.clone() as Arc<dyn RealtimeBackend>, 0usize)
    }

    #[tokio::test]
    async fn test_emits_for_each_snapshot() {
        let backend = Arc::new(InMemoryBackend::new());
        let (feed, mut sub) = counting_feed(&backend);
        let path = DbPath::parse("time").unwrap();

        feed.listen(&path, |count, _| {
            *count += 1;
            *count
        });
        backend.write(&path, json!("10:00")).await.unwrap();

        assert_eq!(sub.next().await, Some(Ok(1)));
        assert_eq!(sub.next().await, Some(Ok(2)));
        assert_eq!(sub.next_ready(), None);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent_and_detaches_once() {
        let backend = Arc::new(InMemoryBackend::new());
        let (feed, mut sub) = counting_feed(&backend);
        feed.listen(&DbPath::parse("date").unwrap(), |c, _| *c);
        feed.listen(&DbPath::parse("time").unwrap(), |c, _| *c);
        assert_eq!(backend.listener_count(), 2);

        assert!(sub.dispose());
        assert!(!sub.dispose());
        assert_eq!(backend.listener_count(), 0);
        assert_eq!(sub.state(), SubscriptionState::Disposed);
        assert_eq!(sub.next().await, None);

        // Listening after dispose is refused
        feed.listen(&DbPath::parse("date").unwrap(), |c, _| *c);
        assert_eq!(backend.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_callback_after_dispose_is_a_no_op() {
        let backend = Arc::new(InMemoryBackend::new());
        let (feed, sub) = counting_feed(&backend);
        feed.listen(&DbPath::parse("date").unwrap(), |c, _| {
            *c += 1;
            *c
        });
        sub.dispose();

        feed.deliver(
            Ok(Snapshot::new(DbPath::root(), None)),
            &|c: &mut usize, _| {
                *c += 1;
                *c
            },
        );

        let inner = feed.inner.lock().unwrap();
        assert_eq!(inner.projector, 1);
    }

    #[tokio::test]
    async fn test_error_is_terminal() {
        let backend = Arc::new(InMemoryBackend::new());
        let (feed, mut sub) = counting_feed(&backend);
        feed.listen(&DbPath::parse("date").unwrap(), |c, _| *c);
        feed.listen(&DbPath::parse("time").unwrap(), |c, _| *c);

        backend.set_online(false);

        assert_eq!(sub.next().await, Some(Ok(0)));
        assert_eq!(sub.next().await, Some(Ok(0)));
        assert!(matches!(
            sub.next().await,
            Some(Err(MonitorError::BackendUnavailable(_)))
        ));
        assert_eq!(sub.next().await, None);
        assert_eq!(sub.state(), SubscriptionState::Errored);
        assert_eq!(backend.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_first_dispose_without_listeners() {
        let backend = Arc::new(InMemoryBackend::new());
        let (_feed, sub) = counting_feed(&backend);

        assert!(sub.dispose());
        assert!(!sub.dispose());
        assert_eq!(sub.state(), SubscriptionState::Disposed);
    }

    #[tokio::test]
    async fn test_poisoned_feed_ends_with_error() {
        let backend = Arc::new(InMemoryBackend::new());
        let (feed, mut sub) = counting_feed(&backend);
        let path = DbPath::parse("time").unwrap();
        feed.listen(&path, |c, _| *c);
        assert_eq!(sub.next().await, Some(Ok(0)));

        let poisoner = feed.clone();
        std::thread::spawn(move || {
            let _inner = poisoner.inner.lock().unwrap();
            panic!("projector panicked");
        })
        .join()
        .unwrap_err();

        backend.write(&path, json!("10:00")).await.unwrap();

        assert!(matches!(
            sub.next().await,
            Some(Err(MonitorError::BackendUnavailable(_)))
        ));
        assert_eq!(sub.next().await, None);
        assert_eq!(backend.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_disposes() {
        let backend = Arc::new(InMemoryBackend::new());
        let (feed, sub) = counting_feed(&backend);
        feed.listen(&DbPath::parse("date").unwrap(), |c, _| *c);
        assert_eq!(backend.listener_count(), 1);

        drop(sub);

        assert_eq!(backend.listener_count(), 0);
        assert!(!feed.is_active());
    }

    #[tokio::test]
    async fn test_stream_impl() {
        use futures_util::stream::StreamExt;

        let backend = Arc::new(InMemoryBackend::new());
        let (feed, mut sub) = counting_feed(&backend);
        feed.listen(&DbPath::parse("date").unwrap(), |c, _| {
            *c += 10;
            *c
        });

        assert_eq!(StreamExt::next(&mut sub).await, Some(Ok(10)));
    }
}
