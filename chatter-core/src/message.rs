use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::serde_helpers::created_at;

/// Identifier assigned by the remote store when a message is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Sender identity, fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Author {
    #[serde(rename = "authorId")]
    pub id: String,
    #[serde(rename = "authorName")]
    pub name: String,
}

impl Author {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// The payload of an outgoing message. Exactly one kind per send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Content {
    Text(String),
    /// URI or download URL of an uploaded picture.
    Image(String),
    Location(Location),
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text(text.into())
    }
}

/// A chat entry as presented by the view and persisted in the cache.
///
/// The JSON shape (`authorId`, `authorName`, `createdAt`, optional `text`,
/// `image`, `location`, `system`) is the cache layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    #[serde(flatten)]
    pub author: Author,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(with = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub system: bool,
}

impl Message {
    /// Builds a user message carrying a single piece of content.
    pub fn new(id: MessageId, author: Author, content: Content, created_at: DateTime<Utc>) -> Self {
        let mut message = Self {
            id,
            author,
            text: None,
            image: None,
            location: None,
            created_at,
            system: false,
        };
        message.set_content(content);
        message
    }

    fn set_content(&mut self, content: Content) {
        match content {
            Content::Text(text) => self.text = Some(text),
            Content::Image(uri) => self.image = Some(uri),
            Content::Location(location) => self.location = Some(location),
        }
    }

    /// True when the message carries content or is a system entry.
    pub fn is_well_formed(&self) -> bool {
        self.system || self.text.is_some() || self.image.is_some() || self.location.is_some()
    }
}

/// Sorts newest first. Stable, so equal timestamps keep their order.
pub fn sort_newest_first(messages: &mut [Message]) {
    messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
