//! Image and location sharing.
//!
//! Both are permission-gated device capabilities that end in a single
//! [`Content`] ready to send. Failures are user notices, never fatal.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::message::{Content, Location};

pub const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    MediaLibrary,
    Camera,
    Location,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::MediaLibrary => write!(f, "media library"),
            Capability::Camera => write!(f, "camera"),
            Capability::Location => write!(f, "location"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Permissions to use the {0} haven't been granted.")]
    PermissionDenied(Capability),
    #[error("No image was selected.")]
    Cancelled,
    #[error("Error occurred while fetching location")]
    LocationUnavailable,
    #[error("Image upload failed: {0}")]
    Upload(String),
}

/// A picture chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedImage {
    pub uri: String,
    pub bytes: Vec<u8>,
}

/// The device's photo library or camera.
pub trait ImageSource: Send + Sync {
    fn capability(&self) -> Capability;

    fn request_permission(&self) -> impl Future<Output = Permission> + Send;

    /// `None` when the user backed out.
    fn pick(&self) -> impl Future<Output = Option<PickedImage>> + Send;
}

pub trait LocationProvider: Send + Sync {
    fn request_permission(&self) -> impl Future<Output = Permission> + Send;

    fn current_position(&self) -> impl Future<Output = Option<Location>> + Send;
}

/// File storage that hands back a download URL.
pub trait MediaStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn upload(
        &self,
        reference: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;
}

/// Storage reference `{author}-{epoch millis}-{file name}` for an upload.
pub fn upload_reference(author_id: &str, at: DateTime<Utc>, uri: &str) -> String {
    let name = uri.rsplit('/').next().unwrap_or(uri);
    format!("{}-{}-{}", author_id, at.timestamp_millis(), name)
}

/// Picks an image, uploads it and returns the content to send.
#[instrument(skip(source, media), fields(capability = %source.capability()))]
pub async fn share_image<S, M>(source: &S, media: &M, author_id: &str) -> Result<Content, ActionError>
where
    S: ImageSource,
    M: MediaStore,
{
    if source.request_permission().await == Permission::Denied {
        return Err(ActionError::PermissionDenied(source.capability()));
    }
    let image = source.pick().await.ok_or(ActionError::Cancelled)?;

    let reference = upload_reference(author_id, Utc::now(), &image.uri);
    let url = media
        .upload(&reference, image.bytes, IMAGE_CONTENT_TYPE)
        .await
        .map_err(|e| {
            warn!(error = %e, %reference, "upload failed");
            ActionError::Upload(e.to_string())
        })?;
    debug!(%url, "image uploaded");
    Ok(Content::Image(url))
}

/// Reads the current position and returns the content to send.
#[instrument(skip(provider))]
pub async fn share_location<L: LocationProvider>(provider: &L) -> Result<Content, ActionError> {
    if provider.request_permission().await == Permission::Denied {
        return Err(ActionError::PermissionDenied(Capability::Location));
    }
    let location = provider
        .current_position()
        .await
        .ok_or(ActionError::LocationUnavailable)?;
    Ok(Content::Location(location))
}

/// Uploads kept in memory, addressed as `memory://{reference}`.
#[derive(Debug, Default)]
pub struct MemoryMediaStore {
    objects: RwLock<HashMap<String, (String, Vec<u8>)>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type and bytes stored under `reference`.
    pub fn get(&self, reference: &str) -> Option<(String, Vec<u8>)> {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        objects.get(reference).cloned()
    }
}

impl MediaStore for MemoryMediaStore {
    type Error = Infallible;

    async fn upload(&self, reference: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, Self::Error> {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        objects.insert(reference.to_string(), (content_type.to_string(), bytes));
        Ok(format!("memory://{}", reference))
    }
}

/// A provider with a fixed answer, for devices without positioning.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedLocation(pub Option<Location>);

impl LocationProvider for FixedLocation {
    async fn request_permission(&self) -> Permission {
        match self.0 {
            Some(_) => Permission::Granted,
            None => Permission::Denied,
        }
    }

    async fn current_position(&self) -> Option<Location> {
        self.0
    }
}
