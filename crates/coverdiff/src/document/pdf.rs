//! Text extraction internals for PDF documents.

use lopdf::Document;

/// Extracts text page by page. Pages whose content streams cannot be
/// decoded are skipped rather than failing the whole document; scanned
/// or image-only pages simply contribute nothing.
pub fn extract_text(doc: &Document) -> String {
    let mut text = String::new();

    for (page_num, _) in doc.get_pages() {
        if let Ok(page_text) = doc.extract_text(&[page_num]) {
            text.push_str(&page_text);
            text.push('\n');
        }
    }

    text
}

/// Number of pages in the document.
pub fn page_count(doc: &Document) -> u32 {
    doc.get_pages().len() as u32
}
