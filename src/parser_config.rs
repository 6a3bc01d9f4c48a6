//! Limits and recovery switches for parsing source documents.

use serde::{Deserialize, Serialize};

/// Parser options controlling resource limits and recovery behavior.
///
/// Every limit exists to keep a hostile or broken input from exhausting
/// memory or stack; a value of 0 disables the corresponding size check.
///
/// # Example
///
/// ```
/// use pdf_splice::parser_config::ParseOptions;
///
/// // Defaults: lenient, no xref reconstruction
/// let lenient = ParseOptions::default();
///
/// // Reject anything that needs recovery
/// let strict = ParseOptions::strict();
///
/// // Custom configuration
/// let custom = ParseOptions {
///     recover_xref: true,
///     max_file_size: 50 * 1024 * 1024,
///     ..ParseOptions::lenient()
/// };
/// assert!(custom.recover_xref);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Reject objects with a broken stream `/Length` or missing `endobj`
    /// instead of repairing them
    pub strict: bool,

    /// Maximum array/dictionary nesting inside a single object
    pub max_nesting: usize,

    /// Maximum depth of the page tree below the catalog's `/Pages`
    pub max_page_tree_depth: u32,

    /// Maximum number of cross-reference sections followed through `/Prev`
    pub max_xref_chain: u32,

    /// Maximum decompression ratio (decompressed:compressed). Default 100.
    pub max_decompression_ratio: u32,

    /// Maximum decompressed stream size in bytes. Default 100 MB.
    pub max_decompressed_size: usize,

    /// Maximum input size in bytes. Default 500 MB.
    pub max_file_size: usize,

    /// Rebuild the object table by scanning for `N G obj` headers when the
    /// cross-reference section cannot be read
    pub recover_xref: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParseOptions {
    /// Strict mode: every structural problem is an error.
    pub fn strict() -> Self {
        Self {
            strict: true,
            recover_xref: false,
            ..Self::lenient()
        }
    }

    /// Lenient mode: tolerate common producer bugs (wrong `/Length`,
    /// unparseable objects nothing references).
    pub fn lenient() -> Self {
        Self {
            strict: false,
            max_nesting: 100,
            max_page_tree_depth: 64,
            max_xref_chain: 32,
            max_decompression_ratio: 100,
            max_decompressed_size: 100 * 1024 * 1024,
            max_file_size: 500 * 1024 * 1024,
            recover_xref: false,
        }
    }

    /// Enable or disable scan-based xref reconstruction.
    pub fn with_recover_xref(mut self, enable: bool) -> Self {
        self.recover_xref = enable;
        self
    }
}
