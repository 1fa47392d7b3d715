//! Local stand-ins for the device capabilities the chat needs.

use std::path::PathBuf;

use chatter_core::media::{Capability, ImageSource, MediaStore, Permission, PickedImage};
use tracing::debug;

/// Treats a file on disk as the picture picked from the library.
pub struct FileImageSource {
    path: PathBuf,
}

impl FileImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ImageSource for FileImageSource {
    fn capability(&self) -> Capability {
        Capability::MediaLibrary
    }

    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    async fn pick(&self) -> Option<PickedImage> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Some(PickedImage {
                uri: format!("file://{}", self.path.display()),
                bytes,
            }),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "image not readable");
                None
            }
        }
    }
}

/// Uploads written under a directory and addressed by `file://` URL.
#[derive(Debug)]
pub struct DirMediaStore {
    root: PathBuf,
}

impl DirMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl MediaStore for DirMediaStore {
    type Error = std::io::Error;

    async fn upload(&self, reference: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String, Self::Error> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(reference);
        tokio::fs::write(&path, bytes).await?;
        Ok(format!("file://{}", path.display()))
    }
}
