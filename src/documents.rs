//! Text extraction from documents linked in assignment descriptions.
//!
//! Only formats that are already text are handled here. Binary document
//! formats are downloaded and published as-is but contribute no text.

use crate::analyzers::outcomes::strip_markup;
use std::path::Path;

/// Broad kind of a downloaded document, judged by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PlainText,
    Html,
    Unsupported,
}

impl DocumentKind {
    pub fn from_filename(filename: &str) -> Self {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("txt" | "md" | "csv") => DocumentKind::PlainText,
            Some("html" | "htm") => DocumentKind::Html,
            _ => DocumentKind::Unsupported,
        }
    }
}

/// Extracts readable text from a downloaded file, or `None` when the format
/// is not a text format.
pub fn extract_text(filename: &str, bytes: &[u8]) -> Option<String> {
    match DocumentKind::from_filename(filename) {
        DocumentKind::PlainText => Some(String::from_utf8_lossy(bytes).trim().to_string()),
        DocumentKind::Html => {
            let html = String::from_utf8_lossy(bytes);
            Some(collapse_blank_lines(&strip_markup(&html)))
        }
        DocumentKind::Unsupported => None,
    }
}

fn collapse_blank_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
