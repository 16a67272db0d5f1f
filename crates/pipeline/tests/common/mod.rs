//! In-memory collaborators for handler tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use yolo_core::error::{
    CallbackError, InferenceError, ObjectStoreError, PublishError, RepositoryError,
};
use yolo_core::events::{CallbackOutcome, CallbackSummary, ImageProcessedEvent};
use yolo_core::layout::StorageLayout;
use yolo_core::prediction::{Detection, InferenceOutput, PredictionArtifact};
use yolo_core::traits::{
    CallbackNotifier, EventPublisher, IdentityStore, ObjectStore, PredictionRepository, Predictor,
};
use yolo_core::types::DbId;
use yolo_pipeline::{Collaborators, JobHandler};

// ---------------------------------------------------------------------------
// Object store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeObjectStore {
    pub fetched: Mutex<Vec<(String, PathBuf)>>,
    pub fail: bool,
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn fetch(&self, key: &str, dest: &Path) -> Result<(), ObjectStoreError> {
        self.fetched
            .lock()
            .unwrap()
            .push((key.to_string(), dest.to_path_buf()));
        if self.fail {
            return Err(ObjectStoreError::Download {
                key: key.to_string(),
                message: "NoSuchKey".into(),
            });
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, b"original")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Predictor
// ---------------------------------------------------------------------------

pub struct FakePredictor {
    pub detections: Vec<Detection>,
    /// Overrides the reported count when set.
    pub count: Option<usize>,
    pub fail: bool,
    pub calls: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl FakePredictor {
    pub fn returning(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            count: None,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::returning(Vec::new())
        }
    }
}

#[async_trait]
impl Predictor for FakePredictor {
    async fn predict(&self, input: &Path, dest: &Path) -> Result<InferenceOutput, InferenceError> {
        self.calls
            .lock()
            .unwrap()
            .push((input.to_path_buf(), dest.to_path_buf()));
        if self.fail {
            return Err(InferenceError::UnreadableInput {
                path: input.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        std::fs::write(dest, b"annotated").map_err(|source| InferenceError::Output {
            path: dest.to_path_buf(),
            source,
        })?;
        Ok(InferenceOutput {
            detections: self.detections.clone(),
            count: self.count.unwrap_or(self.detections.len()),
        })
    }
}

// ---------------------------------------------------------------------------
// Repository + identity
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRepository {
    pub saved: Mutex<Vec<PredictionArtifact>>,
    pub fail: bool,
}

#[async_trait]
impl PredictionRepository for MemoryRepository {
    async fn save_prediction(&self, artifact: &PredictionArtifact) -> Result<(), RepositoryError> {
        if self.fail {
            return Err(RepositoryError::Database("connection refused".into()));
        }
        let mut saved = self.saved.lock().unwrap();
        if saved.iter().any(|a| a.uid == artifact.uid) {
            return Err(RepositoryError::Duplicate(artifact.uid.clone()));
        }
        saved.push(artifact.clone());
        Ok(())
    }
}

pub const ANONYMOUS_ID: DbId = 1;

pub struct MemoryIdentities {
    users: Mutex<HashMap<String, DbId>>,
    pub lookups: Mutex<Vec<String>>,
}

impl Default for MemoryIdentities {
    fn default() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            lookups: Mutex::new(Vec::new()),
        }
    }
}

impl MemoryIdentities {
    fn id_for(&self, username: &str) -> DbId {
        let mut users = self.users.lock().unwrap();
        let next = users.len() as DbId + 100;
        *users.entry(username.to_string()).or_insert(next)
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentities {
    async fn resolve_or_create_user(&self, username: &str) -> Result<DbId, RepositoryError> {
        self.lookups.lock().unwrap().push(username.to_string());
        Ok(self.id_for(username))
    }

    async fn anonymous_user_id(&self) -> Result<DbId, RepositoryError> {
        self.lookups.lock().unwrap().push("__anonymous__".to_string());
        Ok(ANONYMOUS_ID)
    }
}

// ---------------------------------------------------------------------------
// Callback + publisher
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingCallback {
    pub calls: Mutex<Vec<(CallbackSummary, Option<String>)>>,
    pub fail_status: Option<u16>,
    /// Fail as if the endpoint were unreachable.
    pub fail_transport: bool,
}

#[async_trait]
impl CallbackNotifier for RecordingCallback {
    async fn notify(
        &self,
        summary: &CallbackSummary,
        url_override: Option<&str>,
    ) -> Result<CallbackOutcome, CallbackError> {
        self.calls
            .lock()
            .unwrap()
            .push((summary.clone(), url_override.map(str::to_owned)));
        if self.fail_transport {
            return Err(CallbackError::Request("connection refused".into()));
        }
        match self.fail_status {
            Some(status) => Err(CallbackError::HttpStatus(status)),
            None if url_override.is_some() => Ok(CallbackOutcome::Delivered { status: 200 }),
            None => Ok(CallbackOutcome::Skipped),
        }
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub events: Mutex<Vec<ImageProcessedEvent>>,
    pub fail: bool,
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &ImageProcessedEvent) -> Result<(), PublishError> {
        if self.fail {
            return Err(PublishError::Broker("connection reset".into()));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A handler wired to fakes, rooted in a temporary uploads directory.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub store: Arc<FakeObjectStore>,
    pub predictor: Arc<FakePredictor>,
    pub repository: Arc<MemoryRepository>,
    pub identities: Arc<MemoryIdentities>,
    pub callback: Arc<RecordingCallback>,
    pub publisher: Arc<RecordingPublisher>,
}

impl Harness {
    pub fn new(predictor: FakePredictor) -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            store: Arc::new(FakeObjectStore::default()),
            predictor: Arc::new(predictor),
            repository: Arc::new(MemoryRepository::default()),
            identities: Arc::new(MemoryIdentities::default()),
            callback: Arc::new(RecordingCallback::default()),
            publisher: Arc::new(RecordingPublisher::default()),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn handler(&self) -> JobHandler {
        JobHandler::new(
            Collaborators {
                object_store: self.store.clone(),
                predictor: self.predictor.clone(),
                predictions: self.repository.clone(),
                identities: self.identities.clone(),
                callback: self.callback.clone(),
                publisher: self.publisher.clone(),
            },
            StorageLayout::new(self.dir.path()),
        )
    }

    pub fn saved(&self) -> Vec<PredictionArtifact> {
        self.repository.saved.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<ImageProcessedEvent> {
        self.publisher.events.lock().unwrap().clone()
    }

    pub fn callback_count(&self) -> usize {
        self.callback.calls.lock().unwrap().len()
    }

    pub fn inference_count(&self) -> usize {
        self.predictor.calls.lock().unwrap().len()
    }
}

pub fn dog() -> Detection {
    Detection::new("dog", 0.92, [1.0, 2.0, 3.0, 4.0])
}
