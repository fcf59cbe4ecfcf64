//! PDF text extraction backed by the `pdf-extract` crate.
//!
//! Extraction works on the uploaded bytes directly, so no temporary file is
//! ever shared between sessions. `pdf-extract` returns all pages as a single
//! string with form-feed breaks between pages; pages are split on those
//! breaks in order. No OCR, no layout recovery.

use thiserror::Error;
use tracing::warn;

use crate::models::{DocumentText, PageText};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("could not read '{file_name}' as a PDF: {detail}")]
    Unreadable { file_name: String, detail: String },

    #[error("no usable text in '{file_name}'")]
    NoText { file_name: String },

    #[error("extraction task failed: {0}")]
    TaskFailed(String),
}

/// Extract per-page text from PDF bytes, in ascending page order.
///
/// Runs on a blocking thread so parsing a large document does not obstruct
/// the async scheduler.
pub async fn extract_document(
    file_name: &str,
    data: Vec<u8>,
) -> Result<DocumentText, ExtractError> {
    let name = file_name.to_string();
    tokio::task::spawn_blocking(move || extract_sync(&name, &data))
        .await
        .map_err(|e| ExtractError::TaskFailed(e.to_string()))?
}

fn extract_sync(file_name: &str, data: &[u8]) -> Result<DocumentText, ExtractError> {
    let text = pdf_extract::extract_text_from_mem(data).map_err(|e| {
        warn!(file_name, "PDF extraction failed: {e}");
        ExtractError::Unreadable {
            file_name: file_name.to_string(),
            detail: e.to_string(),
        }
    })?;

    if text.trim().is_empty() {
        return Err(ExtractError::NoText {
            file_name: file_name.to_string(),
        });
    }

    Ok(DocumentText {
        file_name: file_name.to_string(),
        pages: split_pages(&text),
    })
}

/// Split extracted text on the form-feed page breaks `pdf-extract` inserts.
/// Page numbers are 1-based and ascending by construction; removing the
/// break characters keeps the concatenated length equal to the sum of the
/// per-page lengths.
fn split_pages(text: &str) -> Vec<PageText> {
    let parts: Vec<&str> = if text.contains('\x0C') {
        text.split('\x0C').collect()
    } else {
        vec![text]
    };

    parts
        .into_iter()
        .enumerate()
        .map(|(i, t)| PageText {
            number: i + 1,
            text: t.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_are_split_in_ascending_order() {
        let pages = split_pages("first page\x0Csecond page\x0Cthird page");
        assert_eq!(pages.len(), 3);
        let numbers: Vec<usize> = pages.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(pages[0].text, "first page");
        assert_eq!(pages[2].text, "third page");
    }

    #[test]
    fn concatenation_length_equals_sum_of_page_lengths() {
        let pages = split_pages("aaa\x0Cbb\x0Cc");
        let doc = DocumentText {
            file_name: "t.pdf".to_string(),
            pages,
        };
        let sum: usize = doc.pages.iter().map(|p| p.text.len()).sum();
        assert_eq!(doc.full_text().len(), sum);
        assert_eq!(doc.full_text(), "aaabbc");
    }

    #[test]
    fn text_without_breaks_is_one_page() {
        let pages = split_pages("only page");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].number, 1);
    }
}
