//! Boundary protocol for converting many documents in one converter call.
//!
//! Documents are joined with a fixed token on its own paragraph. The token
//! survives Textile → Markdown conversion unchanged, so the output can be
//! split back on it.

/// Separates documents inside a joined converter input.
pub const DOCUMENT_BOUNDARY: &str =
    "TextileConverterDocumentBoundary09339cab-f4f4-4739-85b0-d02ba1f342e6";

/// Join documents into a single converter input.
pub fn join_documents<S: AsRef<str>>(documents: &[S]) -> String {
    let separator = format!("\n\n{}\n\n", DOCUMENT_BOUNDARY);
    documents
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(&separator)
}

/// Split converter output back into trimmed documents.
pub fn split_documents(text: &str) -> Vec<String> {
    text.split(DOCUMENT_BOUNDARY)
        .map(|piece| piece.trim().to_string())
        .collect()
}
