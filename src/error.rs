//! Error types for the page-reassembly engine.
//!
//! Low-level variants (header, lexer, xref, stream decoding) describe what went
//! wrong inside one document. The engine surfaces them to callers wrapped in
//! [`Error::MalformedSource`] together with the label of the offending document.

use crate::object::ObjectRef;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while parsing, copying or writing.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)] // "Invalid" prefix is intentional for clarity
pub enum Error {
    /// A source document is structurally broken: no usable cross-reference
    /// section, missing catalog or page tree, or a dangling reference found
    /// while copying.
    #[error("Malformed source document '{document}': {detail}")]
    MalformedSource {
        /// Label of the offending document
        document: String,
        /// What was wrong
        detail: String,
    },

    /// A source document is encrypted; decryption is not supported.
    #[error("Source document '{document}' is encrypted")]
    UnsupportedEncryption {
        /// Label of the encrypted document
        document: String,
    },

    /// A page selection references a page the document does not have.
    #[error("Page index {index} out of range for '{document}' ({page_count} pages)")]
    PageIndexOutOfRange {
        /// Label of the document
        document: String,
        /// The rejected 0-based index
        index: usize,
        /// Number of pages in the document
        page_count: usize,
    },

    /// The request selected zero pages in total.
    #[error("Nothing to merge: no pages selected")]
    EmptyMerge,

    /// The caller cancelled the operation between documents.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: {0}")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in the object table
    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectRef),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),

    /// Invalid configuration document
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a document-internal error as [`Error::MalformedSource`].
    ///
    /// Errors that already name a document (or are not about document
    /// structure, like cancellation) pass through unchanged.
    pub fn in_document(self, document: &str) -> Error {
        match self {
            Error::MalformedSource { .. }
            | Error::UnsupportedEncryption { .. }
            | Error::PageIndexOutOfRange { .. }
            | Error::EmptyMerge
            | Error::Cancelled
            | Error::Config(_) => self,
            other => Error::MalformedSource {
                document: document.to_string(),
                detail: other.to_string(),
            },
        }
    }

    /// Whether this error concerns the content of a source document rather
    /// than the request.
    pub fn is_source_error(&self) -> bool {
        matches!(self, Error::MalformedSource { .. } | Error::UnsupportedEncryption { .. })
    }
}
