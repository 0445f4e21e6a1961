use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::CorpusStore;

/// Stores corpora as files below a root directory.
///
/// Writes go to a sibling temporary file first and are renamed into place,
/// so readers never observe a partially written corpus.
#[derive(Debug, Clone)]
pub struct LocalCorpusStore {
    root: PathBuf,
}

impl LocalCorpusStore {
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Filesystem path of `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key.trim_start_matches('/'))
    }
}

#[async_trait]
impl CorpusStore for LocalCorpusStore {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".partial");
        let tmp_path = path.with_file_name(tmp_name);

        debug!(path = %path.display(), content_type = %content_type, bytes = data.len(), "Writing corpus file");

        tokio::fs::write(&tmp_path, data)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("Failed to move corpus into place: {}", path.display()))?;

        Ok(())
    }

    fn location(&self, key: &str) -> String {
        self.path_for(key).display().to_string()
    }
}
