//! Parse-and-merge in one call.

use super::page::DocumentHandle;
use crate::config::MergeOptions;
use crate::document::SourceDocument;
use crate::error::Result;
use crate::merge::{CancellationToken, MergeEngine, MergeRequest};
use std::thread;

/// One input file and the pages to take from it.
#[derive(Debug, Clone)]
pub struct MergeInput<'a> {
    /// Raw file bytes; not retained after parsing
    pub data: &'a [u8],
    /// 0-based page indices in output order
    pub pages: Vec<usize>,
    /// Name used in error messages, `document #n` when unset
    pub label: Option<String>,
}

impl<'a> MergeInput<'a> {
    /// Input without a label.
    pub fn new(data: &'a [u8], pages: Vec<usize>) -> Self {
        Self {
            data,
            pages,
            label: None,
        }
    }

    /// Set the label used in error messages.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn label_or_position(&self, position: usize) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| format!("document #{}", position + 1))
    }
}

/// Parse every input, in input order.
///
/// With [`MergeOptions::parallel_parse`] each input is parsed on its own
/// scoped thread. `cancel` is checked before each document.
pub fn parse_all(
    inputs: &[MergeInput<'_>],
    options: &MergeOptions,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<SourceDocument>> {
    let parse_one = |position: usize, input: &MergeInput<'_>| -> Result<SourceDocument> {
        if let Some(token) = cancel {
            token.check()?;
        }
        SourceDocument::parse_with_options(input.data, input.label_or_position(position), &options.parse)
    };

    if !options.parallel_parse || inputs.len() < 2 {
        return inputs
            .iter()
            .enumerate()
            .map(|(position, input)| parse_one(position, input))
            .collect();
    }

    log::debug!("Parsing {} documents in parallel", inputs.len());
    thread::scope(|scope| {
        let handles: Vec<_> = inputs
            .iter()
            .enumerate()
            .map(|(position, input)| scope.spawn(move || parse_one(position, input)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    })
}

/// Parse `inputs` and merge their selected pages.
pub fn merge_pdfs(inputs: &[MergeInput<'_>], options: &MergeOptions) -> Result<Vec<u8>> {
    merge_pdfs_with(inputs, options, None)
}

/// [`merge_pdfs`] with a cancellation token, checked between documents
/// while parsing and while copying.
pub fn merge_pdfs_with(
    inputs: &[MergeInput<'_>],
    options: &MergeOptions,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<u8>> {
    let documents = parse_all(inputs, options, cancel)?;

    let mut request = MergeRequest::new();
    for (document, input) in documents.iter().zip(inputs) {
        request.push(document, input.pages.clone());
    }

    let mut engine = MergeEngine::new(options.clone());
    if let Some(token) = cancel {
        engine = engine.with_cancellation(token.clone());
    }
    engine.merge(&request)
}

/// Merge pages from documents that are already parsed.
pub fn merge_documents(
    selections: &[(&DocumentHandle, Vec<usize>)],
    options: &MergeOptions,
) -> Result<Vec<u8>> {
    let mut request = MergeRequest::new();
    for (handle, pages) in selections {
        request.push(handle.document(), pages.clone());
    }
    MergeEngine::new(options.clone()).merge(&request)
}
