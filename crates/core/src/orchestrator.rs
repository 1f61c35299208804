use crate::chunking::{Chunker, ChunkingConfig, SentenceSplitter};
use crate::config::RetrievalConfig;
use crate::embeddings::{embed_in_batches, Embedder};
use crate::error::{BuildError, RetrievalError};
use crate::extractor::{LopdfExtractor, PdfExtractor, TextCleaner};
use crate::index::FlatL2Index;
use crate::ingest::ingest_folder_passages_best_effort;
use crate::models::{BuildReport, Retrieval, UnavailableReason};
use crate::store::{IndexStore, Snapshot, SnapshotState};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

enum Loaded {
    Ready(Arc<Snapshot>),
    Corrupt(String),
}

pub struct RetrievalService<E, X = LopdfExtractor>
where
    E: Embedder,
    X: PdfExtractor,
{
    config: RetrievalConfig,
    embedder: E,
    extractor: X,
    cleaner: TextCleaner,
    chunker: Chunker,
    store: IndexStore,
    loaded: RwLock<Option<Loaded>>,
    build_lock: Mutex<()>,
}

impl<E> RetrievalService<E, LopdfExtractor>
where
    E: Embedder,
{
    pub fn open(config: RetrievalConfig, embedder: E) -> Result<Self, RetrievalError> {
        Self::with_extractor(config, embedder, LopdfExtractor)
    }
}

impl<E, X> RetrievalService<E, X>
where
    E: Embedder,
    X: PdfExtractor,
{
    /// Validates `config` and probes any existing snapshot. A snapshot built
    /// with a different vector dimension is logged here and fails queries
    /// until `build` replaces it.
    pub fn with_extractor(
        config: RetrievalConfig,
        embedder: E,
        extractor: X,
    ) -> Result<Self, RetrievalError> {
        config.validate()?;

        let splitter =
            SentenceSplitter::with_abbreviations(config.extra_abbreviations.iter().cloned())?;
        let chunker = Chunker::with_splitter(
            ChunkingConfig {
                chunk_size: config.chunk_size,
            },
            splitter,
        )?;
        let store = IndexStore::new(config.snapshot_dir.clone());

        let service = Self {
            config,
            embedder,
            extractor,
            cleaner: TextCleaner::new()?,
            chunker,
            store,
            loaded: RwLock::new(None),
            build_lock: Mutex::new(()),
        };

        if let Ok(snapshot) = service.adopt(service.store.load()) {
            if service.check_dimension(&snapshot).is_ok()
                && snapshot.manifest.embedder != service.embedder.model_id()
            {
                warn!(
                    snapshot = %snapshot.manifest.embedder,
                    embedder = %service.embedder.model_id(),
                    "snapshot was built by a different embedder"
                );
            }
        }

        Ok(service)
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Rebuilds the snapshot from every PDF in `documents_dir`. The previous
    /// snapshot stays in place unless the new one is fully written.
    pub fn build(&self, documents_dir: &Path) -> Result<BuildReport, BuildError> {
        let _writer = self.build_lock.lock();
        info!(folder = %documents_dir.display(), "building snapshot");

        let report = ingest_folder_passages_best_effort(
            documents_dir,
            &self.extractor,
            &self.cleaner,
            &self.chunker,
        );

        if report.passages.is_empty() {
            warn!(
                folder = %documents_dir.display(),
                found = report.documents_found,
                skipped = report.skipped_files.len(),
                "no readable documents, keeping previous snapshot"
            );
            return Err(BuildError::NoDocuments {
                folder: documents_dir.display().to_string(),
                skipped: report.skipped_files,
            });
        }

        let vectors = embed_in_batches(
            &self.embedder,
            &report.passages,
            self.config.embed_batch_size,
        )?;

        let mut index = FlatL2Index::new(self.embedder.dimensions())?;
        index.add(&vectors)?;

        let embedder_id = self.embedder.model_id();
        let manifest = self.store.save(&index, &report.passages, &embedder_id)?;

        let passage_count = report.passages.len();
        let snapshot = Snapshot {
            index,
            passages: report.passages,
            manifest,
        };
        let built_at = snapshot.manifest.built_at;
        *self.loaded.write() = Some(Loaded::Ready(Arc::new(snapshot)));

        info!(
            documents = report.documents.len(),
            passages = passage_count,
            skipped = report.skipped_files.len(),
            "snapshot built"
        );

        Ok(BuildReport {
            documents_dir: documents_dir.to_path_buf(),
            documents_found: report.documents_found,
            documents_processed: report.documents.len(),
            passages: passage_count,
            dimension: self.embedder.dimensions(),
            embedder: embedder_id,
            skipped: report.skipped_files,
            built_at,
        })
    }

    /// Returns the current snapshot, loading it from disk on first use. A
    /// corrupt snapshot is remembered until `reload` or `build`.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>, UnavailableReason> {
        match self.loaded.read().as_ref() {
            Some(Loaded::Ready(snapshot)) => return Ok(Arc::clone(snapshot)),
            Some(Loaded::Corrupt(reason)) => {
                return Err(UnavailableReason::CorruptSnapshot(reason.clone()))
            }
            None => {}
        }

        self.adopt(self.store.load())
    }

    fn adopt(&self, state: SnapshotState) -> Result<Arc<Snapshot>, UnavailableReason> {
        let mut slot = self.loaded.write();
        if let Some(Loaded::Ready(current)) = slot.as_ref() {
            return Ok(Arc::clone(current));
        }

        match state {
            SnapshotState::Ready(snapshot) => {
                info!(
                    passages = snapshot.len(),
                    dimension = snapshot.index.dimension(),
                    "snapshot loaded"
                );
                let snapshot = Arc::new(snapshot);
                *slot = Some(Loaded::Ready(Arc::clone(&snapshot)));
                Ok(snapshot)
            }
            SnapshotState::Absent => {
                debug!(dir = %self.store.dir().display(), "no snapshot on disk");
                Err(UnavailableReason::NoSnapshot)
            }
            SnapshotState::Corrupt(reason) => {
                error!(
                    dir = %self.store.dir().display(),
                    reason = %reason,
                    "snapshot is corrupt, retrieval unavailable until a build or reload"
                );
                *slot = Some(Loaded::Corrupt(reason.clone()));
                Err(UnavailableReason::CorruptSnapshot(reason))
            }
        }
    }

    pub fn reload(&self) {
        *self.loaded.write() = None;
    }

    pub fn retrieve_default(&self, query: &str) -> Result<Retrieval, RetrievalError> {
        self.retrieve(query, self.config.default_top_k)
    }

    /// Up to `k` passages nearest to `query`. Only a vector dimension mismatch
    /// is an error; every other problem becomes `Retrieval::Unavailable`.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Retrieval, RetrievalError> {
        let snapshot = match self.snapshot() {
            Ok(snapshot) => snapshot,
            Err(reason) => return Ok(Retrieval::Unavailable(reason)),
        };

        self.check_dimension(&snapshot)?;

        if snapshot.is_empty() {
            return Ok(Retrieval::Unavailable(UnavailableReason::EmptySnapshot));
        }
        if k == 0 || query.trim().is_empty() {
            return Ok(Retrieval::Content(Vec::new()));
        }

        let query_vector = match self.embedder.embed(query) {
            Ok(vector) => vector,
            Err(error) => {
                warn!(error = %error, "query embedding failed");
                return Ok(Retrieval::Unavailable(UnavailableReason::EmbeddingFailed(
                    error.to_string(),
                )));
            }
        };

        let neighbors = snapshot.index.search(&query_vector, k).map_err(|_| {
            RetrievalError::DimensionMismatch {
                snapshot: snapshot.index.dimension(),
                embedder: query_vector.len(),
            }
        })?;

        let passages = neighbors
            .iter()
            .filter_map(|neighbor| snapshot.passage(neighbor.position).map(str::to_string))
            .collect::<Vec<_>>();

        debug!(k, hits = passages.len(), "retrieved passages");
        Ok(Retrieval::Content(passages))
    }

    fn check_dimension(&self, snapshot: &Snapshot) -> Result<(), RetrievalError> {
        let embedder = self.embedder.dimensions();
        let stored = snapshot.index.dimension();
        if stored != embedder {
            error!(snapshot = stored, embedder, "embedding dimension mismatch");
            return Err(RetrievalError::DimensionMismatch {
                snapshot: stored,
                embedder,
            });
        }
        Ok(())
    }
}
