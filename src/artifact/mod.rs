//! Artifact store - key-addressed byte blobs handed between jobs

use crate::core::InstanceId;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Error types for artifact operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("artifact '{0}' was already written in this run")]
    Duplicate(String),

    #[error("artifact '{0}' not found")]
    NotFound(String),
}

/// A published artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub payload: Vec<u8>,

    /// Instance that published it
    pub producer: InstanceId,
}

/// Storage for artifacts published during one pipeline run
///
/// Keys are write-once. `get` never waits for a producer: ordering between
/// producers and consumers comes from the job graph alone.
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Publish an artifact; fails if the key was already written
    async fn put(&self, key: &str, artifact: Artifact) -> Result<(), ArtifactError>;

    /// Fetch an artifact by key
    async fn get(&self, key: &str) -> Result<Artifact, ArtifactError>;

    /// All keys written so far
    async fn keys(&self) -> Vec<String>;
}

/// In-memory store living for a single run
#[derive(Default)]
pub struct InMemoryArtifactStore {
    artifacts: RwLock<HashMap<String, Artifact>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(&self, key: &str, artifact: Artifact) -> Result<(), ArtifactError> {
        let mut artifacts = self.artifacts.write().await;
        if artifacts.contains_key(key) {
            return Err(ArtifactError::Duplicate(key.to_string()));
        }
        artifacts.insert(key.to_string(), artifact);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Artifact, ArtifactError> {
        let artifacts = self.artifacts.read().await;
        artifacts
            .get(key)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound(key.to_string()))
    }

    async fn keys(&self) -> Vec<String> {
        let artifacts = self.artifacts.read().await;
        let mut keys: Vec<String> = artifacts.keys().cloned().collect();
        keys.sort();
        keys
    }
}
