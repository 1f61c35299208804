use crate::error::IngestError;
use crate::extractor::{PageText, PdfExtractor};
use std::fs;
use std::path::Path;

/// Treats each "pdf" as a UTF-8 text file with a single page. Files that
/// contain `UNREADABLE` fail the way a corrupted PDF does.
pub struct PlainTextExtractor;

impl PdfExtractor for PlainTextExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let text = fs::read_to_string(path)?;
        if text.contains("UNREADABLE") {
            return Err(IngestError::PdfParse(format!(
                "unreadable fixture: {}",
                path.display()
            )));
        }
        Ok(vec![PageText { number: 1, text }])
    }
}
