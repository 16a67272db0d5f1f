//! Input resolution: turn a job payload into a local image path.

use std::path::PathBuf;
use std::sync::Arc;

use yolo_core::error::ObjectStoreError;
use yolo_core::layout::{object_key, StorageLayout};
use yolo_core::payload::{InputSource, JobPayload};
use yolo_core::traits::ObjectStore;

/// Why a job's input could not be resolved. Every variant drops the job.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// Neither `img` nor `source: "path"` with a `path` was given.
    #[error("Payload has neither an object key nor a local path")]
    Unsupported,

    /// `chat_id` would not stay a single directory under the chats root.
    #[error("chat_id '{0}' is not a valid directory name")]
    UnsafeChatId(String),

    #[error("Failed to fetch input: {0}")]
    Fetch(#[from] ObjectStoreError),
}

/// Resolves job inputs, downloading object-store keys into the uploads
/// directory.
pub struct InputResolver {
    store: Arc<dyn ObjectStore>,
    layout: StorageLayout,
}

impl InputResolver {
    pub fn new(store: Arc<dyn ObjectStore>, layout: StorageLayout) -> Self {
        Self { store, layout }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Resolve the input image of `payload` for job `uid`.
    ///
    /// Object keys are fetched to `<root>/original/<stem>-<uid><ext>`.
    /// Local paths are returned verbatim without checking that they exist;
    /// a missing file surfaces later as an inference failure.
    pub async fn resolve(&self, payload: &JobPayload, uid: &str) -> Result<PathBuf, InputError> {
        match payload.input_source().ok_or(InputError::Unsupported)? {
            InputSource::ObjectKey(img) => {
                let key = object_key(img);
                let dest = self.layout.original_path(key, uid);
                self.store.fetch(key, &dest).await?;
                tracing::debug!(key, dest = %dest.display(), "Input fetched from object store");
                Ok(dest)
            }
            InputSource::LocalPath(path) => Ok(PathBuf::from(path)),
        }
    }
}
