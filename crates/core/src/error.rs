use crate::ingest::SkippedPdf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("no extractable text in {0}")]
    NoExtractableText(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("failed to initialize embedding model: {0}")]
    ModelInit(String),

    #[error("embedding dimension must be greater than zero")]
    ZeroDimension,

    #[error("failed to generate embedding: {0}")]
    Embedding(String),

    #[error("embedder returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedding dimension {actual} does not match model dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("index dimension must be greater than zero")]
    ZeroDimension,

    #[error("vector dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("malformed index data: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("index holds {vectors} vectors but {passages} passages were given")]
    Inconsistent { vectors: usize, passages: usize },

    #[error("index file checksum does not match the passage file")]
    ChecksumMismatch,

    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no readable pdf documents in {folder} ({} skipped)", skipped.len())]
    NoDocuments {
        folder: String,
        skipped: Vec<SkippedPdf>,
    },

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(
        "snapshot was built with {snapshot}-dimensional vectors but the embedder produces {embedder}"
    )]
    DimensionMismatch { snapshot: usize, embedder: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}
