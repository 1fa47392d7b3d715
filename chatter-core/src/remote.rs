use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::message::{Author, Content, Location, Message, MessageId};

/// Timestamp as the remote store represents it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoreTimestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl StoreTimestamp {
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            seconds: at.timestamp(),
            nanos: at.timestamp_subsec_nanos(),
        }
    }

    /// Epoch milliseconds, `None` if they overflow an `i64`.
    pub fn to_millis(&self) -> Option<i64> {
        self.seconds
            .checked_mul(1000)?
            .checked_add(i64::from(self.nanos / 1_000_000))
    }

    /// Converts to the canonical timestamp type at millisecond precision.
    pub fn to_datetime(&self) -> Result<DateTime<Utc>, TimestampOutOfRange> {
        self.to_millis()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or(TimestampOutOfRange(*self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("store timestamp {}s+{}ns is out of range", .0.seconds, .0.nanos)]
pub struct TimestampOutOfRange(pub StoreTimestamp);

/// The create-record request: `{authorId, authorName, createdAt, text|image|location}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    #[serde(flatten)]
    pub author: Author,
    #[serde(flatten)]
    pub content: Content,
    #[serde(with = "crate::serde_helpers::created_at")]
    pub created_at: DateTime<Utc>,
}

/// A committed record as delivered in a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    pub id: MessageId,
    pub author: Author,
    pub text: Option<String>,
    pub image: Option<String>,
    pub location: Option<Location>,
    pub system: bool,
    pub created_at: StoreTimestamp,
}

impl RemoteRecord {
    /// The record a store commits for `message` under `id`.
    pub fn from_new(id: MessageId, message: NewMessage) -> Self {
        let mut record = Self {
            id,
            author: message.author,
            text: None,
            image: None,
            location: None,
            system: false,
            created_at: StoreTimestamp::from_datetime(message.created_at),
        };
        match message.content {
            Content::Text(text) => record.text = Some(text),
            Content::Image(uri) => record.image = Some(uri),
            Content::Location(location) => record.location = Some(location),
        }
        record
    }
}

impl TryFrom<RemoteRecord> for Message {
    type Error = TimestampOutOfRange;

    fn try_from(record: RemoteRecord) -> Result<Self, Self::Error> {
        Ok(Message {
            created_at: record.created_at.to_datetime()?,
            id: record.id,
            author: record.author,
            text: record.text,
            image: record.image,
            location: record.location,
            system: record.system,
        })
    }
}

/// A full, ordered batch of records at one point in time.
pub type Snapshot = Vec<RemoteRecord>;

/// Ordering of a subscription on `createdAt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Receiving end of a registered query.
///
/// The store pushes a snapshot immediately on registration and after every
/// committed write. Dropping this does not unregister; call
/// [`RemoteMessageStore::unsubscribe`] with [`Subscription::id`].
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    snapshots: mpsc::UnboundedReceiver<Snapshot>,
}

/// Outcome of a non-blocking poll on a subscription.
#[derive(Debug)]
pub enum Delivery {
    Snapshot(Snapshot),
    Empty,
    Closed,
}

impl Subscription {
    pub fn new(id: SubscriptionId, snapshots: mpsc::UnboundedReceiver<Snapshot>) -> Self {
        Self { id, snapshots }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Waits for the next snapshot. `None` once the store closed the feed.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.snapshots.recv().await
    }

    pub fn try_next(&mut self) -> Delivery {
        match self.snapshots.try_recv() {
            Ok(snapshot) => Delivery::Snapshot(snapshot),
            Err(mpsc::error::TryRecvError::Empty) => Delivery::Empty,
            Err(mpsc::error::TryRecvError::Disconnected) => Delivery::Closed,
        }
    }
}

/// An append-only, subscribable message collection.
pub trait RemoteMessageStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Creates one record. The store assigns the id.
    fn create(
        &self,
        message: NewMessage,
    ) -> impl Future<Output = Result<MessageId, Self::Error>> + Send;

    /// Registers a query over the whole collection.
    fn subscribe(&self, order: SortOrder) -> Result<Subscription, Self::Error>;

    /// Releases a registration. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

impl<S: RemoteMessageStore> RemoteMessageStore for Arc<S> {
    type Error = S::Error;

    fn create(
        &self,
        message: NewMessage,
    ) -> impl Future<Output = Result<MessageId, Self::Error>> + Send {
        (**self).create(message)
    }

    fn subscribe(&self, order: SortOrder) -> Result<Subscription, Self::Error> {
        (**self).subscribe(order)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        (**self).unsubscribe(id)
    }
}

/// An in-process message collection.
///
/// Useful for testing and as a reference implementation. While marked
/// unreachable it behaves like a client SDK's offline queue: creates return
/// an id at once but are committed and broadcast only after reachability
/// returns.
#[derive(Debug)]
pub struct MemoryMessageStore {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    records: Vec<RemoteRecord>,
    pending: Vec<RemoteRecord>,
    subscribers: HashMap<SubscriptionId, (SortOrder, mpsc::UnboundedSender<Snapshot>)>,
    reachable: bool,
    next_subscription: u64,
    create_calls: usize,
    subscribe_calls: usize,
}

impl Default for MemoryMessageStore {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                records: Vec::new(),
                pending: Vec::new(),
                subscribers: HashMap::new(),
                reachable: true,
                next_subscription: 0,
                create_calls: 0,
                subscribe_calls: 0,
            }),
        }
    }
}

impl Inner {
    fn snapshot(&self, order: SortOrder) -> Snapshot {
        let mut records = self.records.clone();
        match order {
            SortOrder::Ascending => records.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            SortOrder::Descending => records.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
        records
    }

    fn broadcast(&mut self) {
        let mut closed = Vec::new();
        for (id, (order, tx)) in &self.subscribers {
            if tx.send(self.snapshot(*order)).is_err() {
                closed.push(*id);
            }
        }
        for id in closed {
            debug!(?id, "dropping subscriber with closed receiver");
            self.subscribers.remove(&id);
        }
    }
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Commits a record written by another participant.
    pub fn insert(&self, record: RemoteRecord) {
        let mut inner = self.lock();
        inner.records.push(record);
        inner.broadcast();
    }

    /// Toggles simulated reachability. Going reachable flushes queued writes.
    pub fn set_reachable(&self, reachable: bool) {
        let mut inner = self.lock();
        inner.reachable = reachable;
        if reachable && !inner.pending.is_empty() {
            let pending = std::mem::take(&mut inner.pending);
            debug!(count = pending.len(), "flushing queued writes");
            inner.records.extend(pending);
            inner.broadcast();
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.lock().reachable
    }

    /// Committed records in insertion order.
    pub fn records(&self) -> Vec<RemoteRecord> {
        self.lock().records.clone()
    }

    pub fn pending_writes(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    pub fn subscribe_calls(&self) -> usize {
        self.lock().subscribe_calls
    }
}

impl RemoteMessageStore for MemoryMessageStore {
    type Error = Infallible;

    async fn create(&self, message: NewMessage) -> Result<MessageId, Self::Error> {
        let id = MessageId::new(uuid::Uuid::new_v4().simple().to_string());
        let record = RemoteRecord::from_new(id.clone(), message);

        let mut inner = self.lock();
        inner.create_calls += 1;
        if inner.reachable {
            inner.records.push(record);
            inner.broadcast();
        } else {
            inner.pending.push(record);
        }
        Ok(id)
    }

    fn subscribe(&self, order: SortOrder) -> Result<Subscription, Self::Error> {
        let mut inner = self.lock();
        inner.subscribe_calls += 1;
        inner.next_subscription += 1;
        let id = SubscriptionId::new(inner.next_subscription);

        let (tx, rx) = mpsc::unbounded_channel();
        // First delivery carries the current state.
        let _ = tx.send(inner.snapshot(order));
        inner.subscribers.insert(id, (order, tx));

        Ok(Subscription::new(id, rx))
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().subscribers.remove(&id);
    }
}
