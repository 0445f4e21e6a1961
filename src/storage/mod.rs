//! Corpus persistence.
//!
//! A run uploads its corpus exactly once, as a single JSON document.

mod bucket;
mod local;

use anyhow::{Context, Result};
use async_trait::async_trait;

pub use bucket::S3CorpusStore;
pub use local::LocalCorpusStore;

use crate::config::{Config, StorageBackend};
use crate::constants::CORPUS_CONTENT_TYPE;
use crate::models::Discussion;

/// Destination for a serialized corpus.
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Store `data` under `key`, replacing any previous object.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable or rejects the write.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()>;

    /// Human-readable location of `key`, for logs.
    fn location(&self, key: &str) -> String;
}

/// Build the store selected by `config.storage_backend`.
///
/// # Errors
///
/// Returns an error if the S3 backend cannot be initialised.
pub fn open_store(config: &Config) -> Result<Box<dyn CorpusStore>> {
    match config.storage_backend {
        StorageBackend::Local => Ok(Box::new(LocalCorpusStore::new(&config.output_dir))),
        StorageBackend::S3 => {
            let store = S3CorpusStore::new(config).context("Failed to initialize S3 store")?;
            Ok(Box::new(store))
        }
    }
}

/// Serialize `corpus` as a JSON array and store it under `key`.
///
/// # Errors
///
/// Returns an error if serialization or the upload fails.
pub async fn persist_corpus(
    store: &dyn CorpusStore,
    key: &str,
    corpus: &[Discussion],
) -> Result<usize> {
    let body = serde_json::to_vec(corpus).context("Failed to serialize corpus")?;
    store
        .put(key, &body, CORPUS_CONTENT_TYPE)
        .await
        .with_context(|| format!("Failed to persist corpus to {}", store.location(key)))?;
    Ok(body.len())
}
