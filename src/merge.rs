//! Page reassembly.
//!
//! A [`MergeRequest`] lists source documents with the pages to take from
//! each. [`MergeEngine`] validates it, copies every selected page (with
//! everything it references) into a fresh [`MergedDocument`], hangs the
//! copies under a single page-tree root and serializes the result.
//!
//! ```no_run
//! use pdf_splice::config::MergeOptions;
//! use pdf_splice::document::SourceDocument;
//! use pdf_splice::merge::{MergeEngine, MergeRequest};
//!
//! # fn run(a: &[u8], b: &[u8]) -> pdf_splice::Result<Vec<u8>> {
//! let a = SourceDocument::parse_labeled(a, "a.pdf")?;
//! let b = SourceDocument::parse_labeled(b, "b.pdf")?;
//! let request = MergeRequest::new().with(&a, vec![1, 0]).with(&b, vec![0]);
//! MergeEngine::new(MergeOptions::default()).merge(&request)
//! # }
//! ```

use crate::config::MergeOptions;
use crate::copier::ObjectGraphCopier;
use crate::document::SourceDocument;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::writer::PdfWriter;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Object number of the merged catalog.
const CATALOG_NUMBER: u32 = 1;
/// Object number of the merged page-tree root.
const ROOT_NUMBER: u32 = 2;

/// Ordered 0-based page indices into one document.
///
/// Duplicates are kept: each occurrence produces its own page copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSelection(Vec<usize>);

impl PageSelection {
    /// Every page of a document with `page_count` pages, in order.
    pub fn all(page_count: usize) -> Self {
        Self((0..page_count).collect())
    }

    /// The selected indices in order.
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Number of pages selected.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<usize>> for PageSelection {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl FromIterator<usize> for PageSelection {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Documents and page selections, in output order.
#[derive(Debug, Clone, Default)]
pub struct MergeRequest<'d> {
    entries: Vec<(&'d SourceDocument, PageSelection)>,
}

impl<'d> MergeRequest<'d> {
    /// An empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a document and its selection.
    pub fn push(
        &mut self,
        document: &'d SourceDocument,
        selection: impl IntoIterator<Item = usize>,
    ) {
        self.entries.push((document, selection.into_iter().collect()));
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(
        mut self,
        document: &'d SourceDocument,
        selection: impl IntoIterator<Item = usize>,
    ) -> Self {
        self.push(document, selection);
        self
    }

    /// The entries in order.
    pub fn entries(&self) -> &[(&'d SourceDocument, PageSelection)] {
        &self.entries
    }

    /// Total pages the output will have.
    pub fn total_pages(&self) -> usize {
        self.entries.iter().map(|(_, s)| s.len()).sum()
    }

    /// Check every index against its document's page count.
    ///
    /// Fails with [`Error::PageIndexOutOfRange`] for the first bad index,
    /// then with [`Error::EmptyMerge`] if nothing is selected.
    pub fn validate(&self) -> Result<()> {
        for (document, selection) in &self.entries {
            let page_count = document.page_count();
            if let Some(&index) = selection.indices().iter().find(|&&i| i >= page_count) {
                return Err(Error::PageIndexOutOfRange {
                    document: document.label().to_string(),
                    index,
                    page_count,
                });
            }
        }
        if self.total_pages() == 0 {
            return Err(Error::EmptyMerge);
        }
        Ok(())
    }
}

/// Shared flag for stopping a merge or batch parse between documents.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Work stops at the next document boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Snapshot passed to the progress callback after each document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeProgress {
    /// Documents finished so far
    pub documents_done: usize,
    /// Documents in the request
    pub documents_total: usize,
    /// Pages copied so far
    pub pages_copied: usize,
}

/// Object table of the document being assembled.
///
/// Numbers are handed out from 1 upward and never reused. Object 1 is the
/// catalog and object 2 the page-tree root.
#[derive(Debug, Clone)]
pub struct MergedDocument {
    objects: BTreeMap<u32, Object>,
    next_number: u32,
    pages: Vec<ObjectRef>,
}

impl Default for MergedDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MergedDocument {
    /// An empty document with the catalog and root numbers reserved.
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            next_number: ROOT_NUMBER + 1,
            pages: Vec::new(),
        }
    }

    /// Reserve the next object number.
    pub fn allocate(&mut self) -> u32 {
        let number = self.next_number;
        self.next_number += 1;
        number
    }

    /// Store the object for a reserved number.
    pub fn set(&mut self, number: u32, object: Object) {
        self.objects.insert(number, object);
    }

    /// Object by number.
    pub fn get(&self, number: u32) -> Option<&Object> {
        self.objects.get(&number)
    }

    /// All objects, by number.
    pub fn objects(&self) -> &BTreeMap<u32, Object> {
        &self.objects
    }

    /// One past the highest allocated number.
    pub fn next_number(&self) -> u32 {
        self.next_number
    }

    /// The catalog reference.
    pub fn catalog(&self) -> ObjectRef {
        ObjectRef::new(CATALOG_NUMBER, 0)
    }

    /// The page-tree root reference.
    pub fn root(&self) -> ObjectRef {
        ObjectRef::new(ROOT_NUMBER, 0)
    }

    /// Append a page as the last leaf of the root.
    pub fn push_page(&mut self, page: ObjectRef) {
        self.pages.push(page);
    }

    /// Pages in output order.
    pub fn pages(&self) -> &[ObjectRef] {
        &self.pages
    }

    /// Write the catalog and the page-tree root.
    fn finalize(&mut self) {
        let kids = self.pages.iter().map(|p| Object::Reference(*p)).collect();
        let mut root = crate::object::Dictionary::new();
        root.insert("Type".to_string(), Object::Name("Pages".to_string()));
        root.insert("Kids".to_string(), Object::Array(kids));
        root.insert("Count".to_string(), Object::Integer(self.pages.len() as i64));
        self.set(ROOT_NUMBER, Object::Dictionary(root));

        let mut catalog = crate::object::Dictionary::new();
        catalog.insert("Type".to_string(), Object::Name("Catalog".to_string()));
        catalog.insert("Pages".to_string(), Object::Reference(self.root()));
        self.set(CATALOG_NUMBER, Object::Dictionary(catalog));
    }
}

/// Runs merge requests with one set of options.
pub struct MergeEngine<'p> {
    options: MergeOptions,
    cancellation: Option<CancellationToken>,
    progress: Option<Box<dyn FnMut(MergeProgress) + 'p>>,
}

impl<'p> MergeEngine<'p> {
    /// Create an engine.
    pub fn new(options: MergeOptions) -> Self {
        Self {
            options,
            cancellation: None,
            progress: None,
        }
    }

    /// Check `token` before each document.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Call `callback` after each document's pages are copied.
    pub fn with_progress(mut self, callback: impl FnMut(MergeProgress) + 'p) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// The options in use.
    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Merge and serialize.
    pub fn merge(&mut self, request: &MergeRequest<'_>) -> Result<Vec<u8>> {
        let merged = self.assemble(request)?;
        PdfWriter::new(&self.options).write(&merged)
    }

    /// Build the merged object table without serializing it.
    pub fn assemble(&mut self, request: &MergeRequest<'_>) -> Result<MergedDocument> {
        request.validate()?;

        let documents_total = request.entries().len();
        log::info!(
            "Merging {} pages from {} documents",
            request.total_pages(),
            documents_total
        );

        let mut merged = MergedDocument::new();
        let root = merged.root();

        for (done, (document, selection)) in request.entries().iter().enumerate() {
            if let Some(token) = &self.cancellation {
                token.check()?;
            }

            if selection.is_empty() {
                log::debug!("'{}': nothing selected, skipping", document.label());
            } else {
                copy_document(document, selection, root, &mut merged)?;
            }

            if let Some(callback) = self.progress.as_mut() {
                callback(MergeProgress {
                    documents_done: done + 1,
                    documents_total,
                    pages_copied: merged.pages().len(),
                });
            }
        }

        merged.finalize();
        log::info!(
            "Assembled {} pages in {} objects",
            merged.pages().len(),
            merged.objects().len()
        );
        Ok(merged)
    }
}

/// Copy one document's selected pages, sharing one memo table.
fn copy_document(
    document: &SourceDocument,
    selection: &PageSelection,
    root: ObjectRef,
    merged: &mut MergedDocument,
) -> Result<()> {
    let mut copier = ObjectGraphCopier::new(document, root);

    // Page numbers are reserved up front so links between selected pages
    // resolve regardless of order.
    let mut planned = Vec::with_capacity(selection.len());
    for &index in selection.indices() {
        let page = document.page(index).ok_or_else(|| Error::PageIndexOutOfRange {
            document: document.label().to_string(),
            index,
            page_count: document.page_count(),
        })?;
        let number = merged.allocate();
        copier.register_page(page.object.id, number);
        planned.push((page, number));
    }

    for (page, number) in planned {
        copier.copy_page(page, number, merged)?;
        merged.push_page(ObjectRef::new(number, 0));
    }

    log::debug!(
        "'{}': copied {} pages and {} shared objects",
        document.label(),
        selection.len(),
        copier.copied_count()
    );
    Ok(())
}
