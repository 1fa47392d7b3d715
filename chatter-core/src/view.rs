//! The synchronized message feed.
//!
//! A [`MessageSyncView`] presents one newest-first message list. While
//! online it mirrors a single remote subscription and writes every snapshot
//! through to the cache; while offline it presents the last cached snapshot.
//! It owns at most one [`Subscription`] at a time and releases it before
//! registering another.

use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::cache::{read_snapshot, write_snapshot, Cache, CACHE_KEY};
use crate::connectivity::Connectivity;
use crate::message::{sort_newest_first, Author, Content, Message, MessageId};
use crate::remote::{Delivery, NewMessage, RemoteMessageStore, Snapshot, SortOrder, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// Waiting for connectivity to resolve.
    Uninitialized,
    /// Mirroring the remote subscription.
    Subscribed,
    /// Presenting the cached snapshot.
    CacheOnly,
    /// Unmounted. No further transitions.
    TornDown,
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewState::Uninitialized => write!(f, "waiting"),
            ViewState::Subscribed => write!(f, "live"),
            ViewState::CacheOnly => write!(f, "cached"),
            ViewState::TornDown => write!(f, "closed"),
        }
    }
}

/// What became of a send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Accepted by the store while the view was online.
    Delivered(MessageId),
    /// Accepted while not online; delivery is up to the store's queue.
    QueuedOffline(MessageId),
    Failed(String),
}

impl fmt::Display for SendOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendOutcome::Delivered(id) => write!(f, "delivered ({})", id),
            SendOutcome::QueuedOffline(id) => write!(f, "queued until reconnect ({})", id),
            SendOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

pub struct MessageSyncView<R: RemoteMessageStore, C: Cache> {
    remote: R,
    cache: C,
    cache_key: String,
    author: Author,
    state: ViewState,
    connectivity: Connectivity,
    subscription: Option<Subscription>,
    messages: watch::Sender<Vec<Message>>,
}

impl<R: RemoteMessageStore, C: Cache> MessageSyncView<R, C> {
    pub fn new(remote: R, cache: C, author: Author) -> Self {
        let (messages, _) = watch::channel(Vec::new());
        Self {
            remote,
            cache,
            cache_key: CACHE_KEY.to_string(),
            author,
            state: ViewState::Uninitialized,
            connectivity: Connectivity::Unknown,
            subscription: None,
            messages,
        }
    }

    /// Uses a different cache key, e.g. one per conversation.
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = key.into();
        self
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    pub fn has_subscription(&self) -> bool {
        self.subscription.is_some()
    }

    /// The presented list, newest first.
    pub fn messages(&self) -> Vec<Message> {
        self.messages.borrow().clone()
    }

    /// Observes the presented list. Every replacement is published whole.
    pub fn watch(&self) -> watch::Receiver<Vec<Message>> {
        self.messages.subscribe()
    }

    /// Mounts the view with the connectivity known at that moment.
    pub fn mount(&mut self, connectivity: Connectivity) {
        info!(%connectivity, author = %self.author.id, "mounting message view");
        self.set_connectivity(connectivity);
    }

    /// Applies a connectivity reading. `Unknown` never triggers a transition.
    pub fn set_connectivity(&mut self, connectivity: Connectivity) {
        if self.state == ViewState::TornDown {
            debug!(%connectivity, "ignoring connectivity change after unmount");
            return;
        }
        self.connectivity = connectivity;

        match connectivity {
            Connectivity::Unknown => {}
            Connectivity::Online if self.subscription.is_none() => self.go_online(),
            Connectivity::Online => {}
            Connectivity::Offline if self.state != ViewState::CacheOnly => self.go_offline(),
            Connectivity::Offline => {}
        }
    }

    fn go_online(&mut self) {
        self.release_subscription();
        match self.remote.subscribe(SortOrder::Descending) {
            Ok(subscription) => {
                info!(id = ?subscription.id(), "subscribed to remote messages");
                self.subscription = Some(subscription);
                self.state = ViewState::Subscribed;
            }
            Err(e) => {
                warn!(error = %e, "remote subscription failed, presenting cached messages");
                self.state = ViewState::CacheOnly;
                self.load_cached();
            }
        }
    }

    fn go_offline(&mut self) {
        self.release_subscription();
        self.state = ViewState::CacheOnly;
        info!("offline, presenting cached messages");
        self.load_cached();
    }

    fn release_subscription(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            debug!(id = ?subscription.id(), "unsubscribing from remote messages");
            self.remote.unsubscribe(subscription.id());
        }
    }

    /// Replaces the presented list with a remote snapshot and caches it.
    ///
    /// Discarded when no subscription is active.
    pub fn receive_snapshot(&mut self, snapshot: Snapshot) {
        if self.subscription.is_none() {
            debug!(len = snapshot.len(), "discarding snapshot without an active subscription");
            return;
        }

        let mut messages = Vec::with_capacity(snapshot.len());
        for record in snapshot {
            let id = record.id.clone();
            let message = match Message::try_from(record) {
                Ok(message) => message,
                Err(e) => {
                    warn!(%id, error = %e, "skipping record with invalid timestamp");
                    continue;
                }
            };
            if message.is_well_formed() {
                messages.push(message);
            } else {
                warn!(id = %message.id, "skipping record without content");
            }
        }
        sort_newest_first(&mut messages);

        if let Err(e) = write_snapshot(&self.cache, &self.cache_key, &messages) {
            warn!(error = %e, "failed to cache snapshot");
        }
        debug!(len = messages.len(), "presenting remote snapshot");
        self.messages.send_replace(messages);
    }

    /// Presents the cached snapshot, or an empty list if none was stored.
    ///
    /// Only acts while no subscription is active. Read failures keep the
    /// current list.
    pub fn load_cached(&mut self) {
        if self.subscription.is_some() {
            debug!("subscription active, not loading cache");
            return;
        }

        match read_snapshot(&self.cache, &self.cache_key) {
            Ok(Some(messages)) => {
                debug!(len = messages.len(), "presenting cached snapshot");
                self.messages.send_replace(messages);
            }
            Ok(None) => {
                debug!("no cached snapshot");
                self.messages.send_replace(Vec::new());
            }
            Err(e) => warn!(error = %e, "failed to load cached snapshot"),
        }
    }

    /// Applies every snapshot already delivered, without waiting.
    ///
    /// Returns how many were applied.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Some(subscription) = self.subscription.as_mut() {
            match subscription.try_next() {
                Delivery::Snapshot(snapshot) => {
                    self.receive_snapshot(snapshot);
                    applied += 1;
                }
                Delivery::Empty => break,
                Delivery::Closed => {
                    self.subscription_closed();
                    break;
                }
            }
        }
        applied
    }

    /// Waits for the next snapshot and applies it.
    ///
    /// Returns false immediately when no subscription is active, or when
    /// the store closed the feed.
    pub async fn recv(&mut self) -> bool {
        if self.subscription.is_none() {
            return false;
        }
        match self.next_delivery().await {
            Some(snapshot) => {
                self.receive_snapshot(snapshot);
                true
            }
            None => {
                self.subscription_closed();
                false
            }
        }
    }

    /// Next snapshot from the active subscription, `None` if it closed.
    /// Never resolves while no subscription is active.
    pub(crate) async fn next_delivery(&mut self) -> Option<Snapshot> {
        match self.subscription.as_mut() {
            Some(subscription) => subscription.next().await,
            None => std::future::pending().await,
        }
    }

    pub(crate) fn subscription_closed(&mut self) {
        warn!("remote store closed the subscription, presenting cached messages");
        self.release_subscription();
        self.state = ViewState::CacheOnly;
        self.load_cached();
    }

    /// Sends content authored by the session user, stamped now.
    pub async fn send(&self, content: Content) -> SendOutcome {
        self.send_at(content, Utc::now()).await
    }

    /// Issues one create request regardless of connectivity.
    ///
    /// The presented list is left alone; it changes only when a later
    /// snapshot includes the new record.
    #[instrument(skip(self, content), fields(author = %self.author.id))]
    pub async fn send_at(&self, content: Content, created_at: DateTime<Utc>) -> SendOutcome {
        let online = self.state == ViewState::Subscribed;
        let message = NewMessage {
            author: self.author.clone(),
            content,
            created_at,
        };

        match self.remote.create(message).await {
            Ok(id) if online => {
                debug!(%id, "message created");
                SendOutcome::Delivered(id)
            }
            Ok(id) => {
                debug!(%id, "message queued while offline");
                SendOutcome::QueuedOffline(id)
            }
            Err(e) => {
                warn!(error = %e, "failed to create message");
                SendOutcome::Failed(e.to_string())
            }
        }
    }

    /// Releases any subscription and stops reacting to connectivity.
    /// Safe to call repeatedly.
    pub fn unmount(&mut self) {
        self.release_subscription();
        if self.state != ViewState::TornDown {
            info!("message view unmounted");
            self.state = ViewState::TornDown;
        }
    }
}

impl<R: RemoteMessageStore, C: Cache> Drop for MessageSyncView<R, C> {
    fn drop(&mut self) {
        self.release_subscription();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{encode_snapshot, MemoryCache};
    use crate::remote::{MemoryMessageStore, RemoteRecord, StoreTimestamp, SubscriptionId};
    use chrono::TimeZone;
    use std::io;
    use std::sync::Arc;

    fn author() -> Author {
        Author::new("u1", "Ada")
    }

    fn record(id: &str, text: &str, millis: i64) -> RemoteRecord {
        RemoteRecord {
            id: MessageId::new(id),
            author: Author::new("u2", "Grace"),
            text: Some(text.to_string()),
            image: None,
            location: None,
            system: false,
            created_at: StoreTimestamp::from_datetime(Utc.timestamp_millis_opt(millis).unwrap()),
        }
    }

    fn ids(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.id.as_str()).collect()
    }

    #[derive(Debug, thiserror::Error)]
    #[error("store rejected the request")]
    struct Rejected;

    #[derive(Default)]
    struct RejectingStore;

    impl RemoteMessageStore for RejectingStore {
        type Error = Rejected;

        async fn create(&self, _message: NewMessage) -> Result<MessageId, Self::Error> {
            Err(Rejected)
        }

        fn subscribe(&self, _order: SortOrder) -> Result<Subscription, Self::Error> {
            Err(Rejected)
        }

        fn unsubscribe(&self, _id: SubscriptionId) {}
    }

    struct BrokenCache;

    impl Cache for BrokenCache {
        type Error = io::Error;

        fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
            Err(io::Error::other("disk unavailable"))
        }

        fn set(&self, _key: &str, _value: &[u8]) -> Result<(), Self::Error> {
            Err(io::Error::other("disk full"))
        }
    }

    #[test]
    fn unknown_connectivity_does_nothing() {
        let store = Arc::new(MemoryMessageStore::new());
        let mut view = MessageSyncView::new(Arc::clone(&store), MemoryCache::new(), author());

        view.mount(Connectivity::Unknown);

        assert_eq!(view.state(), ViewState::Uninitialized);
        assert_eq!(store.subscribe_calls(), 0);
        assert!(view.messages().is_empty());
    }

    #[test]
    fn repeated_online_keeps_one_subscription() {
        let store = Arc::new(MemoryMessageStore::new());
        let mut view = MessageSyncView::new(Arc::clone(&store), MemoryCache::new(), author());

        view.mount(Connectivity::Online);
        view.set_connectivity(Connectivity::Online);
        view.set_connectivity(Connectivity::Unknown);
        view.set_connectivity(Connectivity::Online);

        assert_eq!(store.subscribe_calls(), 1);
        assert_eq!(store.active_subscriptions(), 1);
        assert_eq!(view.state(), ViewState::Subscribed);
    }

    #[test]
    fn mounting_offline_loads_cache() {
        let store = Arc::new(MemoryMessageStore::new());
        let cache = MemoryCache::new();
        let cached = vec![Message::try_from(record("m1", "hi", 1_000)).unwrap()];
        cache.set(CACHE_KEY, &encode_snapshot(&cached).unwrap()).unwrap();

        let mut view = MessageSyncView::new(Arc::clone(&store), &cache, author());
        view.mount(Connectivity::Offline);

        assert_eq!(view.state(), ViewState::CacheOnly);
        assert_eq!(view.messages(), cached);
        assert_eq!(store.subscribe_calls(), 0);
    }

    #[test]
    fn missing_cache_presents_empty_list() {
        let store = Arc::new(MemoryMessageStore::new());
        let mut view = MessageSyncView::new(store, MemoryCache::new(), author());

        view.mount(Connectivity::Offline);

        assert!(view.messages().is_empty());
    }

    #[test]
    fn snapshot_is_written_through_to_cache() {
        let store = Arc::new(MemoryMessageStore::new());
        store.insert(record("m1", "one", 1_000));
        store.insert(record("m2", "two", 2_000));
        let cache = MemoryCache::new();

        let mut view = MessageSyncView::new(Arc::clone(&store), &cache, author());
        view.mount(Connectivity::Online);
        assert_eq!(view.poll(), 1);

        assert_eq!(ids(&view.messages()), vec!["m2", "m1"]);
        let cached = read_snapshot(&cache, CACHE_KEY).unwrap().unwrap();
        assert_eq!(cached, view.messages());
    }

    #[test]
    fn unordered_snapshot_is_presented_newest_first() {
        let store = Arc::new(MemoryMessageStore::new());
        let mut view = MessageSyncView::new(store, MemoryCache::new(), author());
        view.mount(Connectivity::Online);
        view.poll();

        view.receive_snapshot(vec![record("a", "old", 1), record("c", "new", 3), record("b", "mid", 2)]);

        assert_eq!(ids(&view.messages()), vec!["c", "b", "a"]);
    }

    #[test]
    fn records_without_content_are_skipped() {
        let store = Arc::new(MemoryMessageStore::new());
        let mut view = MessageSyncView::new(store, MemoryCache::new(), author());
        view.mount(Connectivity::Online);
        view.poll();

        let mut empty = record("empty", "", 2);
        empty.text = None;
        view.receive_snapshot(vec![empty, record("m1", "hi", 1)]);

        assert_eq!(ids(&view.messages()), vec!["m1"]);
    }

    #[test]
    fn records_with_out_of_range_timestamps_are_skipped() {
        let store = Arc::new(MemoryMessageStore::new());
        let cache = MemoryCache::new();
        let mut view = MessageSyncView::new(store, &cache, author());
        view.mount(Connectivity::Online);
        view.poll();

        let mut broken = record("broken", "far future", 0);
        broken.created_at = StoreTimestamp {
            seconds: i64::MAX / 100,
            nanos: 0,
        };
        view.receive_snapshot(vec![record("m2", "two", 2), broken, record("m1", "one", 1)]);

        assert_eq!(ids(&view.messages()), vec!["m2", "m1"]);
        let cached = read_snapshot(&cache, CACHE_KEY).unwrap().unwrap();
        assert_eq!(ids(&cached), vec!["m2", "m1"]);
    }

    #[test]
    fn custom_cache_key_is_used_for_both_directions() {
        let store = Arc::new(MemoryMessageStore::new());
        store.insert(record("m1", "hi", 1_000));
        let cache = MemoryCache::new();

        let mut view = MessageSyncView::new(Arc::clone(&store), &cache, author()).with_cache_key("room-42");
        view.mount(Connectivity::Online);
        view.poll();
        assert_eq!(cache.get(CACHE_KEY).unwrap(), None);
        assert_eq!(ids(&read_snapshot(&cache, "room-42").unwrap().unwrap()), vec!["m1"]);

        let other = vec![Message::try_from(record("m9", "elsewhere", 9)).unwrap()];
        cache.set(CACHE_KEY, &encode_snapshot(&other).unwrap()).unwrap();
        view.set_connectivity(Connectivity::Offline);
        assert_eq!(ids(&view.messages()), vec!["m1"]);
    }

    #[test]
    fn stale_snapshot_after_going_offline_is_discarded() {
        let store = Arc::new(MemoryMessageStore::new());
        let mut view = MessageSyncView::new(store, MemoryCache::new(), author());
        view.mount(Connectivity::Offline);

        view.receive_snapshot(vec![record("late", "too late", 5)]);

        assert!(view.messages().is_empty());
    }

    #[test]
    fn cache_write_failure_keeps_presenting() {
        let store = Arc::new(MemoryMessageStore::new());
        store.insert(record("m1", "hi", 1));

        let mut view = MessageSyncView::new(store, BrokenCache, author());
        view.mount(Connectivity::Online);
        view.poll();

        assert_eq!(ids(&view.messages()), vec!["m1"]);
    }

    #[test]
    fn cache_read_failure_keeps_stale_list() {
        let store = Arc::new(MemoryMessageStore::new());
        store.insert(record("m1", "hi", 1));

        let mut view = MessageSyncView::new(store, BrokenCache, author());
        view.mount(Connectivity::Online);
        view.poll();
        view.set_connectivity(Connectivity::Offline);

        assert_eq!(view.state(), ViewState::CacheOnly);
        assert_eq!(ids(&view.messages()), vec!["m1"]);
    }

    #[test]
    fn subscribe_failure_falls_back_to_cache() {
        let cache = MemoryCache::new();
        let cached = vec![Message::try_from(record("m1", "hi", 1_000)).unwrap()];
        cache.set(CACHE_KEY, &encode_snapshot(&cached).unwrap()).unwrap();

        let mut view = MessageSyncView::new(RejectingStore, &cache, author());
        view.mount(Connectivity::Online);

        assert_eq!(view.state(), ViewState::CacheOnly);
        assert!(!view.has_subscription());
        assert_eq!(view.messages(), cached);
    }

    #[test]
    fn closed_feed_falls_back_to_cache() {
        let store = Arc::new(MemoryMessageStore::new());
        store.insert(record("m1", "hi", 1));
        let mut view = MessageSyncView::new(Arc::clone(&store), MemoryCache::new(), author());
        view.mount(Connectivity::Online);
        view.poll();

        // Simulate the store dropping the registration on its side.
        store.unsubscribe(SubscriptionId::new(1));
        view.poll();

        assert_eq!(view.state(), ViewState::CacheOnly);
        assert!(!view.has_subscription());
        assert_eq!(ids(&view.messages()), vec!["m1"]);

        view.set_connectivity(Connectivity::Online);
        assert_eq!(view.state(), ViewState::Subscribed);
        assert_eq!(store.active_subscriptions(), 1);
    }

    #[test]
    fn unmount_is_idempotent_and_final() {
        let store = Arc::new(MemoryMessageStore::new());
        let mut view = MessageSyncView::new(Arc::clone(&store), MemoryCache::new(), author());
        view.mount(Connectivity::Online);

        view.unmount();
        view.unmount();
        view.set_connectivity(Connectivity::Online);

        assert_eq!(view.state(), ViewState::TornDown);
        assert_eq!(store.active_subscriptions(), 0);
        assert_eq!(store.subscribe_calls(), 1);
    }

    #[test]
    fn dropping_the_view_releases_its_subscription() {
        let store = Arc::new(MemoryMessageStore::new());
        {
            let mut view = MessageSyncView::new(Arc::clone(&store), MemoryCache::new(), author());
            view.mount(Connectivity::Online);
            assert_eq!(store.active_subscriptions(), 1);
        }
        assert_eq!(store.active_subscriptions(), 0);
    }

    #[test]
    fn watchers_see_replacements() {
        let store = Arc::new(MemoryMessageStore::new());
        store.insert(record("m1", "hi", 1));
        let mut view = MessageSyncView::new(store, MemoryCache::new(), author());
        let mut watcher = view.watch();

        view.mount(Connectivity::Online);
        view.poll();

        assert!(watcher.has_changed().unwrap());
        assert_eq!(ids(&watcher.borrow_and_update()), vec!["m1"]);
    }

    #[tokio::test]
    async fn send_reports_delivery_state() {
        let store = Arc::new(MemoryMessageStore::new());
        let mut view = MessageSyncView::new(Arc::clone(&store), MemoryCache::new(), author());

        view.mount(Connectivity::Online);
        let online = view.send(Content::text("hello")).await;
        assert!(matches!(online, SendOutcome::Delivered(_)));

        view.set_connectivity(Connectivity::Offline);
        let offline = view.send(Content::text("later")).await;
        assert!(matches!(offline, SendOutcome::QueuedOffline(_)));

        assert_eq!(store.create_calls(), 2);
    }

    #[tokio::test]
    async fn unknown_reading_while_subscribed_still_reports_delivery() {
        let store = Arc::new(MemoryMessageStore::new());
        let mut view = MessageSyncView::new(Arc::clone(&store), MemoryCache::new(), author());
        view.mount(Connectivity::Online);
        view.set_connectivity(Connectivity::Unknown);
        assert_eq!(view.state(), ViewState::Subscribed);

        let outcome = view.send(Content::text("hello")).await;

        assert!(matches!(outcome, SendOutcome::Delivered(_)));
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn send_failure_is_reported() {
        let mut view = MessageSyncView::new(RejectingStore, MemoryCache::new(), author());
        view.mount(Connectivity::Offline);

        let outcome = view.send(Content::text("hello")).await;

        assert_eq!(outcome, SendOutcome::Failed("store rejected the request".to_string()));
        assert!(view.messages().is_empty());
    }

    #[tokio::test]
    async fn send_does_not_insert_optimistically() {
        let store = Arc::new(MemoryMessageStore::new());
        let mut view = MessageSyncView::new(Arc::clone(&store), MemoryCache::new(), author());
        view.mount(Connectivity::Online);
        assert!(view.recv().await);

        view.send(Content::text("hello")).await;
        assert!(view.messages().is_empty());

        assert!(view.recv().await);
        let messages = view.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text.as_deref(), Some("hello"));
        assert_eq!(messages[0].author, author());
    }

    #[tokio::test]
    async fn recv_without_subscription_returns_false() {
        let store = Arc::new(MemoryMessageStore::new());
        let mut view = MessageSyncView::new(store, MemoryCache::new(), author());

        assert!(!view.recv().await);
    }
}
