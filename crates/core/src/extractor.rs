use crate::chunking::normalize_whitespace;
use crate::error::IngestError;
use lopdf::Document;
use regex::Regex;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document = Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::NoExtractableText(path.display().to_string()));
        }

        Ok(pages)
    }
}

impl<X: PdfExtractor + ?Sized> PdfExtractor for &X {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        (**self).extract_pages(path)
    }
}

/// Strips font-embedding placeholders like `(cid:123)`, replacement and control
/// characters, then collapses whitespace.
#[derive(Debug, Clone)]
pub struct TextCleaner {
    cid_placeholder: Regex,
}

impl TextCleaner {
    pub fn new() -> Result<Self, IngestError> {
        Ok(Self {
            cid_placeholder: Regex::new(r"\(cid:\d+\)")?,
        })
    }

    pub fn clean(&self, text: &str) -> String {
        let without_cid = self.cid_placeholder.replace_all(text, "");
        let printable: String = without_cid
            .chars()
            .map(|ch| {
                if ch == '\u{fffd}' || (ch.is_control() && !ch.is_whitespace()) {
                    ' '
                } else {
                    ch
                }
            })
            .collect();
        normalize_whitespace(&printable)
    }
}

pub fn extract_document_text<X: PdfExtractor + ?Sized>(
    extractor: &X,
    cleaner: &TextCleaner,
    path: &Path,
) -> Result<String, IngestError> {
    let pages = extractor.extract_pages(path)?;

    let cleaned = pages
        .iter()
        .map(|page| cleaner.clean(&page.text))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>();

    if cleaned.is_empty() {
        return Err(IngestError::NoExtractableText(path.display().to_string()));
    }

    Ok(cleaned.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};
    use tempfile::tempdir;

    fn write_single_page_pdf(path: &Path, line: &str) -> Result<(), Box<dyn std::error::Error>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path)?;
        Ok(())
    }

    #[test]
    fn cid_artifacts_and_spacing_are_removed() -> Result<(), Box<dyn std::error::Error>> {
        let cleaned = TextCleaner::new()?.clean("  Pump(cid:12) pressure \n\n  is\t(cid:3)rated.\u{fffd}  ");
        assert_eq!(cleaned, "Pump pressure is rated.");
        Ok(())
    }

    #[test]
    fn control_characters_become_spaces() -> Result<(), Box<dyn std::error::Error>> {
        let cleaner = TextCleaner::new()?;
        assert_eq!(cleaner.clean("a\u{0007}b"), "a b");
        assert_eq!(cleaner.clean(""), "");
        Ok(())
    }

    #[test]
    fn lopdf_extractor_reads_generated_pdf() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("hello.pdf");
        write_single_page_pdf(&path, "Hello World. Second sentence here.")?;

        let text = extract_document_text(&LopdfExtractor, &TextCleaner::new()?, &path)?;
        assert!(text.contains("Hello World."));
        assert!(!text.ends_with(' '));
        Ok(())
    }

    #[test]
    fn corrupted_pdf_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\n%broken")?;

        let result = extract_document_text(&LopdfExtractor, &TextCleaner::new()?, &path);
        assert!(matches!(result, Err(IngestError::PdfParse(_))));
        Ok(())
    }

    struct BlankPages;

    impl PdfExtractor for BlankPages {
        fn extract_pages(&self, _path: &Path) -> Result<Vec<PageText>, IngestError> {
            Ok(vec![PageText {
                number: 1,
                text: "(cid:1)(cid:2)  ".to_string(),
            }])
        }
    }

    #[test]
    fn pages_that_clean_to_nothing_yield_no_extractable_text() -> Result<(), Box<dyn std::error::Error>> {
        let result = extract_document_text(&BlankPages, &TextCleaner::new()?, Path::new("scan.pdf"));
        assert!(matches!(result, Err(IngestError::NoExtractableText(_))));
        Ok(())
    }
}
