//! Read access to the enrolled gallery.

use crate::types::EnrolledIdentity;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("gallery read failed: {0}")]
    ReadFailed(String),
}

/// Source of enrolled identities. Each call returns a fresh snapshot.
#[async_trait]
pub trait GallerySource: Send + Sync {
    async fn list_enrolled(&self) -> Result<Vec<EnrolledIdentity>, GalleryError>;
}

/// Fixed in-memory gallery.
#[derive(Debug, Clone, Default)]
pub struct StaticGallery {
    identities: Vec<EnrolledIdentity>,
}

impl StaticGallery {
    pub fn new(identities: Vec<EnrolledIdentity>) -> Self {
        Self { identities }
    }
}

#[async_trait]
impl GallerySource for StaticGallery {
    async fn list_enrolled(&self) -> Result<Vec<EnrolledIdentity>, GalleryError> {
        Ok(self.identities.clone())
    }
}
