use crate::error::RetrievalError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_SNAPSHOT_DIR: &str = "data/processed";
pub const DEFAULT_CHUNK_SIZE: usize = 3;
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 16;
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub snapshot_dir: PathBuf,
    pub chunk_size: usize,
    pub embed_batch_size: usize,
    pub default_top_k: usize,
    /// Extra abbreviations that never end a sentence, lowercase and without the trailing dot.
    pub extra_abbreviations: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
            chunk_size: DEFAULT_CHUNK_SIZE,
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
            default_top_k: DEFAULT_TOP_K,
            extra_abbreviations: Vec::new(),
        }
    }
}

impl RetrievalConfig {
    pub fn with_snapshot_dir(snapshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_dir: snapshot_dir.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.chunk_size == 0 {
            return Err(RetrievalError::InvalidConfig(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.embed_batch_size == 0 {
            return Err(RetrievalError::InvalidConfig(
                "embed_batch_size must be at least 1".to_string(),
            ));
        }
        if self.snapshot_dir.as_os_str().is_empty() {
            return Err(RetrievalError::InvalidConfig(
                "snapshot_dir is empty".to_string(),
            ));
        }
        Ok(())
    }
}
