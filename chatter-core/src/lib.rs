//! Chatter keeps a chat feed consistent across network loss.
//!
//! Core concepts:
//! - **Message**: one chat entry, ordered newest first by `created_at`
//! - **RemoteMessageStore**: the hosted, append-only message collection
//! - **Cache**: a durable key-value store holding the last remote snapshot
//! - **Connectivity**: reachability, `Unknown` until the platform reports
//! - **MessageSyncView**: mirrors the remote feed while online and the
//!   cached snapshot while offline
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use chatter_core::{Author, Connectivity, MemoryCache, MemoryMessageStore, MessageSyncView};
//!
//! let store = Arc::new(MemoryMessageStore::new());
//! let mut view = MessageSyncView::new(Arc::clone(&store), MemoryCache::new(), Author::new("u1", "Ada"));
//!
//! view.mount(Connectivity::Online);
//! view.poll();
//! assert_eq!(store.active_subscriptions(), 1);
//!
//! view.set_connectivity(Connectivity::Offline);
//! assert_eq!(store.active_subscriptions(), 0);
//! ```

mod cache;
mod connectivity;
pub mod driver;
pub mod media;
mod message;
mod remote;
pub mod serde_helpers;
mod session;
mod view;

pub use cache::{
    decode_snapshot, encode_snapshot, read_snapshot, write_snapshot, Cache, MemoryCache,
    SnapshotError, CACHE_KEY,
};
pub use connectivity::{signal, Connectivity};
pub use driver::{ViewCommand, ViewHandle};
pub use message::{sort_newest_first, Author, Content, Location, Message, MessageId};
pub use remote::{
    Delivery, MemoryMessageStore, NewMessage, RemoteMessageStore, RemoteRecord, Snapshot,
    SortOrder, StoreTimestamp, Subscription, SubscriptionId, TimestampOutOfRange,
};
pub use session::{
    AnonymousAuthenticator, Authenticator, InvalidColor, Session, SessionError, ThemeColor,
    SIGNED_IN_NOTICE, THEME_OPTIONS,
};
pub use view::{MessageSyncView, SendOutcome, ViewState};
