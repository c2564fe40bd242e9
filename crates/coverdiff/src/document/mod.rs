//! Document preparation.
//!
//! Turns an uploaded PDF byte stream into extracted text plus a page
//! count. A parseable PDF with no extractable text is not an error here;
//! the pipeline decides whether empty text is acceptable.

use crate::error::DocumentError;

mod pdf;

/// Extracted content of one policy document.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub text: String,
    pub page_count: u32,
}

impl PreparedDocument {
    /// Whether any usable text came out of extraction.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Validates and extracts a PDF byte stream.
///
/// Fails on an empty stream, a stream over `max_bytes`, or bytes that do
/// not parse as a PDF. Extraction itself is tolerant: unreadable pages
/// are skipped and may leave the text empty.
pub fn prepare(bytes: &[u8], max_bytes: usize) -> Result<PreparedDocument, DocumentError> {
    if bytes.is_empty() {
        return Err(DocumentError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(DocumentError::TooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| DocumentError::InvalidPdf(e.to_string()))?;

    Ok(PreparedDocument {
        text: pdf::extract_text(&doc),
        page_count: pdf::page_count(&doc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object, Stream};

    const TEST_MAX_BYTES: usize = 25 * 1024 * 1024;

    /// Builds a minimal single-page PDF containing the given text, or an
    /// empty page when `text` is None.
    fn build_pdf(text: Option<&str>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let page_id = match text {
            Some(text) => {
                let font_id = doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Courier",
                });
                let resources_id = doc.add_object(dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                });
                let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text);
                let content_id =
                    doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                    "Resources" => resources_id,
                    "Contents" => content_id,
                })
            }
            None => doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        };

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_prepare_extracts_text_and_pages() {
        let bytes = build_pdf(Some("General Liability Limit 1000000"));

        let prepared = prepare(&bytes, TEST_MAX_BYTES).unwrap();
        assert!(prepared.text.contains("General Liability Limit 1000000"));
        assert_eq!(prepared.page_count, 1);
        assert!(prepared.has_text());
    }

    #[test]
    fn test_prepare_tolerates_empty_page() {
        let bytes = build_pdf(None);

        let prepared = prepare(&bytes, TEST_MAX_BYTES).unwrap();
        assert!(!prepared.has_text());
        assert_eq!(prepared.page_count, 1);
    }

    #[test]
    fn test_prepare_rejects_empty_stream() {
        let result = prepare(&[], TEST_MAX_BYTES);
        assert!(matches!(result, Err(DocumentError::Empty)));
    }

    #[test]
    fn test_prepare_rejects_oversized_stream() {
        let bytes = build_pdf(Some("text"));
        let result = prepare(&bytes, 16);
        assert!(matches!(
            result,
            Err(DocumentError::TooLarge { limit: 16, .. })
        ));
    }

    #[test]
    fn test_prepare_rejects_garbage_bytes() {
        let result = prepare(b"not a valid pdf content", TEST_MAX_BYTES);
        assert!(matches!(result, Err(DocumentError::InvalidPdf(_))));
    }
}
