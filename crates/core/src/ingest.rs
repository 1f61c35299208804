use crate::chunking::Chunker;
use crate::error::IngestError;
use crate::extractor::{extract_document_text, PdfExtractor, TextCleaner};
use crate::models::DocumentText;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub documents_found: usize,
    pub documents: Vec<DocumentText>,
    pub passages: Vec<String>,
    pub skipped_files: Vec<SkippedPdf>,
}

pub fn extract_folder_best_effort<X: PdfExtractor + ?Sized>(
    folder: &Path,
    extractor: &X,
    cleaner: &TextCleaner,
) -> (usize, Vec<DocumentText>, Vec<SkippedPdf>) {
    if !folder.is_dir() {
        warn!(folder = %folder.display(), "documents folder not found");
    }

    let files = discover_pdf_files(folder);
    let found = files.len();
    let mut documents = Vec::new();
    let mut skipped_files = Vec::new();

    for path in files {
        let extracted = document_name(&path)
            .and_then(|name| Ok((name, extract_document_text(extractor, cleaner, &path)?)));

        match extracted {
            Ok((name, text)) => {
                info!(document = %name, chars = text.len(), "extracted document text");
                documents.push(DocumentText { name, path, text });
            }
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "skipped pdf");
                skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    (found, documents, skipped_files)
}

/// Extracts every PDF in `folder` and chunks each document on its own;
/// passages never span two documents.
pub fn ingest_folder_passages_best_effort<X: PdfExtractor + ?Sized>(
    folder: &Path,
    extractor: &X,
    cleaner: &TextCleaner,
    chunker: &Chunker,
) -> IngestionReport {
    let (documents_found, documents, skipped_files) =
        extract_folder_best_effort(folder, extractor, cleaner);

    let mut passages = Vec::new();
    for document in &documents {
        let document_passages = chunker.chunk(&document.text);
        info!(
            document = %document.name,
            passages = document_passages.len(),
            "chunked document"
        );
        passages.extend(document_passages);
    }

    IngestionReport {
        documents_found,
        documents,
        passages,
        skipped_files,
    }
}

fn document_name(path: &Path) -> Result<String, IngestError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })
}
