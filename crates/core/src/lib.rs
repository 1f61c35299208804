pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod store;

#[cfg(test)]
mod testing;

pub use chunking::{normalize_whitespace, Chunker, ChunkingConfig, SentenceSplitter};
pub use config::RetrievalConfig;
#[cfg(feature = "minilm")]
pub use embeddings::MiniLmEmbedder;
pub use embeddings::{
    embed_in_batches, CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{
    BuildError, EmbedError, IndexError, IngestError, RetrievalError, SnapshotError,
};
pub use extractor::{extract_document_text, LopdfExtractor, PageText, PdfExtractor, TextCleaner};
pub use index::{FlatL2Index, Neighbor};
pub use ingest::{
    discover_pdf_files, extract_folder_best_effort, ingest_folder_passages_best_effort,
    IngestionReport, SkippedPdf,
};
pub use models::{BuildReport, DocumentText, Retrieval, UnavailableReason};
pub use orchestrator::RetrievalService;
pub use store::{
    IndexStore, Snapshot, SnapshotManifest, SnapshotState, INDEX_FILE_NAME, PASSAGES_FILE_NAME,
};
