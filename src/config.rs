//! Configuration for building the merged document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::parser_config::ParseOptions;

/// How the cross-reference section of the output is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XrefStyle {
    /// Classic `xref` table followed by a `trailer` dictionary
    #[default]
    Table,
    /// Compressed `/Type /XRef` stream (PDF 1.5+)
    Stream,
}

/// Merge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Header version written as `%PDF-{version}`
    pub version: String,

    /// `/Producer` entry of the information dictionary
    pub producer: String,

    /// Optional `/Creator` entry
    pub creator: Option<String>,

    /// Optional `/Title` entry
    pub title: Option<String>,

    /// Fixed `/CreationDate` and `/ModDate`; the current time when unset
    pub creation_date: Option<DateTime<Utc>>,

    /// FlateDecode-compress copied streams that carry no `/Filter`
    pub compress_streams: bool,

    /// Cross-reference section style
    pub xref_style: XrefStyle,

    /// Parse the inputs of [`crate::api::merge_pdfs`] on scoped threads
    pub parallel_parse: bool,

    /// Limits applied when parsing inputs
    pub parse: ParseOptions,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeOptions {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self {
            version: "1.7".to_string(),
            producer: format!("{} {}", crate::NAME, crate::VERSION),
            creator: None,
            title: None,
            creation_date: None,
            compress_streams: false,
            xref_style: XrefStyle::Table,
            parallel_parse: false,
            parse: ParseOptions::default(),
        }
    }

    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the header version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set `/Producer`.
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }

    /// Set `/Creator`.
    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    /// Set `/Title`.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Pin the timestamps, making the output fully reproducible.
    pub fn with_creation_date(mut self, date: DateTime<Utc>) -> Self {
        self.creation_date = Some(date);
        self
    }

    /// Enable compression of unfiltered streams.
    pub fn with_compression(mut self, enable: bool) -> Self {
        self.compress_streams = enable;
        self
    }

    /// Choose the cross-reference style.
    pub fn with_xref_style(mut self, style: XrefStyle) -> Self {
        self.xref_style = style;
        self
    }

    /// Parse batch inputs concurrently.
    pub fn with_parallel_parse(mut self, enable: bool) -> Self {
        self.parallel_parse = enable;
        self
    }

    /// Replace the parse limits.
    pub fn with_parse_options(mut self, parse: ParseOptions) -> Self {
        self.parse = parse;
        self
    }
}
