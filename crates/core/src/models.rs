use crate::ingest::SkippedPdf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct DocumentText {
    pub name: String,
    pub path: PathBuf,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub documents_dir: PathBuf,
    pub documents_found: usize,
    pub documents_processed: usize,
    pub passages: usize,
    pub dimension: usize,
    pub embedder: String,
    pub skipped: Vec<SkippedPdf>,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnavailableReason {
    NoSnapshot,
    CorruptSnapshot(String),
    EmptySnapshot,
    EmbeddingFailed(String),
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSnapshot | Self::EmptySnapshot => f.write_str("No knowledge base found."),
            Self::CorruptSnapshot(_) => f.write_str("Knowledge base is unavailable."),
            Self::EmbeddingFailed(_) => f.write_str("Knowledge base could not be searched."),
        }
    }
}

/// Outcome of a query. `Unavailable` is never mixed into passage text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Retrieval {
    Content(Vec<String>),
    Unavailable(UnavailableReason),
}

impl Retrieval {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Content(_))
    }

    pub fn passages(&self) -> &[String] {
        match self {
            Self::Content(passages) => passages,
            Self::Unavailable(_) => &[],
        }
    }

    pub fn into_passages(self) -> Vec<String> {
        match self {
            Self::Content(passages) => passages,
            Self::Unavailable(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_has_no_passages() {
        let retrieval = Retrieval::Unavailable(UnavailableReason::NoSnapshot);
        assert!(!retrieval.is_available());
        assert!(retrieval.passages().is_empty());
        assert!(retrieval.into_passages().is_empty());
    }

    #[test]
    fn reasons_render_a_fixed_message() {
        assert_eq!(
            UnavailableReason::NoSnapshot.to_string(),
            "No knowledge base found."
        );
        assert_eq!(
            UnavailableReason::CorruptSnapshot("checksum".to_string()).to_string(),
            "Knowledge base is unavailable."
        );
    }
}
