//! Deep copy of page object graphs into a merged document.
//!
//! [`ObjectGraphCopier`] walks everything reachable from a source page and
//! re-creates it in the target [`MergedDocument`] under fresh object numbers.
//! A memo table maps source numbers to merged numbers: it makes shared
//! objects (a font used by two pages) come out once, and because a number is
//! memoized before the object's children are visited, reference cycles
//! terminate.
//!
//! Page-tree structure is never copied. References to intermediate
//! `/Pages` nodes become references to the merged root, references to
//! selected pages become references to their first copy, and references to
//! pages that were not selected become `null`.

use crate::document::{PageEntry, SourceDocument};
use crate::error::{Error, Result};
use crate::merge::MergedDocument;
use crate::object::{Dictionary, Object, ObjectRef};
use std::collections::HashMap;

/// Copies objects from one source document during one merge.
pub struct ObjectGraphCopier<'s> {
    source: &'s SourceDocument,
    root: ObjectRef,
    /// Source object number -> merged object number
    memo: HashMap<u32, u32>,
    /// Source page object number -> merged number of its first copy
    selected_pages: HashMap<u32, u32>,
    /// Objects allocated but not yet filled in
    pending: Vec<(u32, u32)>,
}

impl<'s> ObjectGraphCopier<'s> {
    /// Start copying from `source`; page-tree links point at `root`.
    pub fn new(source: &'s SourceDocument, root: ObjectRef) -> Self {
        Self {
            source,
            root,
            memo: HashMap::new(),
            selected_pages: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Record that a source page is copied under `merged_number`.
    ///
    /// Only the first registration of a page is kept: links to a page that
    /// is selected twice point at its first copy. Both copies share the same
    /// copied annotations, whose `/P` names the first copy.
    pub fn register_page(&mut self, source_page: u32, merged_number: u32) {
        self.selected_pages.entry(source_page).or_insert(merged_number);
    }

    /// Copy one page into `target` as object `merged_number`.
    ///
    /// The copy gets `/Parent` set to the merged root and carries the
    /// attributes it inherited in the source tree.
    pub fn copy_page(
        &mut self,
        page: &PageEntry,
        merged_number: u32,
        target: &mut MergedDocument,
    ) -> Result<()> {
        let source = self.source;
        let source_dict = source
            .object(page.object.id)
            .and_then(|o| o.as_dict())
            .ok_or_else(|| self.dangling(page.object))?;

        let mut copied = Dictionary::new();
        for (key, value) in source_dict {
            let value = if key == "Parent" {
                Object::Reference(self.root)
            } else {
                self.rewrite(value, target)?
            };
            copied.insert(key.clone(), value);
        }
        copied.entry("Type".to_string()).or_insert_with(|| Object::Name("Page".to_string()));
        copied
            .entry("Parent".to_string())
            .or_insert(Object::Reference(self.root));
        for (key, value) in &page.inherited {
            if !copied.contains_key(key) {
                let value = self.rewrite(value, target)?;
                copied.insert(key.clone(), value);
            }
        }

        target.set(merged_number, Object::Dictionary(copied));
        self.drain(target)
    }

    /// Copy the object behind `r` and everything it references, returning the
    /// merged reference (or `null` for an unselected page).
    pub fn copy_object(&mut self, r: ObjectRef, target: &mut MergedDocument) -> Result<Object> {
        let mapped = self.map_reference(r, target)?;
        self.drain(target)?;
        Ok(mapped)
    }

    /// Number of non-page objects copied so far.
    pub fn copied_count(&self) -> usize {
        self.memo.len()
    }

    /// Fill in every allocated-but-empty object.
    fn drain(&mut self, target: &mut MergedDocument) -> Result<()> {
        while let Some((source_number, merged_number)) = self.pending.pop() {
            let source = self.source;
            let original = source
                .object(source_number)
                .ok_or_else(|| self.dangling(ObjectRef::new(source_number, 0)))?;
            let copied = self.rewrite(original, target)?;
            target.set(merged_number, copied);
        }
        Ok(())
    }

    /// Clone a direct object, mapping every reference inside it.
    fn rewrite(&mut self, obj: &Object, target: &mut MergedDocument) -> Result<Object> {
        Ok(match obj {
            Object::Reference(r) => self.map_reference(*r, target)?,
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.rewrite(item, target))
                    .collect::<Result<_>>()?,
            ),
            Object::Dictionary(dict) => Object::Dictionary(self.rewrite_dict(dict, target)?),
            Object::Stream { dict, data } => {
                let mut dict = dict.clone();
                // An indirect /Length would drag a useless integer object along
                dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
                Object::Stream {
                    dict: self.rewrite_dict(&dict, target)?,
                    data: data.clone(),
                }
            },
            direct => direct.clone(),
        })
    }

    fn rewrite_dict(&mut self, dict: &Dictionary, target: &mut MergedDocument) -> Result<Dictionary> {
        let mut out = Dictionary::with_capacity(dict.len());
        for (key, value) in dict {
            out.insert(key.clone(), self.rewrite(value, target)?);
        }
        Ok(out)
    }

    fn map_reference(&mut self, r: ObjectRef, target: &mut MergedDocument) -> Result<Object> {
        if self.source.is_page_tree_node(r.id) {
            return Ok(Object::Reference(self.root));
        }
        if self.source.page_position(r.id).is_some() {
            return Ok(match self.selected_pages.get(&r.id) {
                Some(&merged) => Object::Reference(ObjectRef::new(merged, 0)),
                None => {
                    log::debug!("'{}': dropping link to unselected page {}", self.source.label(), r);
                    Object::Null
                },
            });
        }
        if let Some(&merged) = self.memo.get(&r.id) {
            return Ok(Object::Reference(ObjectRef::new(merged, 0)));
        }
        if self.source.object(r.id).is_none() {
            return Err(self.dangling(r));
        }

        let merged = target.allocate();
        self.memo.insert(r.id, merged);
        self.pending.push((r.id, merged));
        Ok(Object::Reference(ObjectRef::new(merged, 0)))
    }

    fn dangling(&self, r: ObjectRef) -> Error {
        Error::MalformedSource {
            document: self.source.label().to_string(),
            detail: format!("reference {} points to a missing object", r),
        }
    }
}
