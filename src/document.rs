//! Parsed source documents.
//!
//! A [`SourceDocument`] is built once from a byte buffer and is read-only
//! afterwards. Parsing is eager: every object listed in the cross-reference
//! data is parsed into an owned table, and the page tree is flattened into an
//! ordered page list, so the caller's buffer can be dropped (or zeroed) as
//! soon as [`SourceDocument::parse`] returns.
//!
//! # Example
//!
//! ```no_run
//! use pdf_splice::document::SourceDocument;
//!
//! let bytes = std::fs::read("report.pdf")?;
//! let doc = SourceDocument::parse_labeled(&bytes, "report.pdf")?;
//! println!("{} pages, PDF {}.{}", doc.page_count(), doc.version().0, doc.version().1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::{parse_indirect_object_at, ParseContext};
use crate::parser_config::ParseOptions;
use crate::xref::{find_startxref, read_xref_chain, CrossRefTable, XRefEntry};
use crate::xref_reconstruction::reconstruct_xref;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Page attributes a page may inherit from its ancestors.
pub const INHERITABLE_KEYS: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// How far into the file the `%PDF-` header may start.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Longest chain of references [`SourceDocument::resolve`] follows.
const MAX_REFERENCE_CHAIN: usize = 32;

/// One leaf of the flattened page tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PageEntry {
    /// The page object
    pub object: ObjectRef,
    /// Inheritable attributes the page lacks, taken from its nearest ancestor
    /// that defines them
    pub inherited: Dictionary,
}

/// An immutable, fully parsed input document.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    label: String,
    version: (u8, u8),
    objects: HashMap<u32, Object>,
    trailer: Dictionary,
    catalog: ObjectRef,
    pages: Vec<PageEntry>,
    page_tree_nodes: HashSet<u32>,
    page_positions: HashMap<u32, usize>,
}

impl SourceDocument {
    /// Parse with the label `"document"` and default options.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_with_options(data, "document", &ParseOptions::default())
    }

    /// Parse with a label used in error messages.
    pub fn parse_labeled(data: &[u8], label: impl Into<String>) -> Result<Self> {
        Self::parse_with_options(data, label, &ParseOptions::default())
    }

    /// Parse with a label and explicit limits.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedEncryption`] if the trailer has `/Encrypt`
    /// - [`Error::MalformedSource`] for everything else that prevents
    ///   locating the objects, the catalog or the page tree
    pub fn parse_with_options(
        data: &[u8],
        label: impl Into<String>,
        options: &ParseOptions,
    ) -> Result<Self> {
        let label = label.into();
        Self::parse_inner(data, &label, options).map_err(|e| e.in_document(&label))
    }

    fn parse_inner(data: &[u8], label: &str, options: &ParseOptions) -> Result<Self> {
        if options.max_file_size > 0 && data.len() > options.max_file_size {
            return Err(Error::InvalidPdf(format!(
                "file is {} bytes, limit is {}",
                data.len(),
                options.max_file_size
            )));
        }

        let (header_offset, mut version) = parse_header(data, options)?;
        // Offsets are relative to the header when junk precedes it
        let data = &data[header_offset..];

        let xref = load_xref(data, options)?;
        let trailer = xref.trailer().clone();
        if trailer.contains_key("Encrypt") {
            return Err(Error::UnsupportedEncryption {
                document: label.to_string(),
            });
        }

        let objects = load_objects(data, &xref, options)?;
        log::debug!("'{}': parsed {} objects", label, objects.len());

        let catalog = trailer
            .get("Root")
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::InvalidPdf("trailer has no /Root reference".to_string()))?;
        let catalog_dict = objects
            .get(&catalog.id)
            .and_then(|o| o.as_dict())
            .ok_or_else(|| Error::InvalidPdf(format!("catalog {} is missing", catalog)))?;

        if let Some(declared) = catalog_dict.get("Version").and_then(|o| o.as_name()) {
            if let Some(v) = parse_version(declared.as_bytes()) {
                version = version.max(v);
            }
        }

        let root = catalog_dict
            .get("Pages")
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::InvalidPdf("catalog has no /Pages reference".to_string()))?;

        let mut doc = SourceDocument {
            label: label.to_string(),
            version,
            objects,
            trailer,
            catalog,
            pages: Vec::new(),
            page_tree_nodes: HashSet::new(),
            page_positions: HashMap::new(),
        };
        doc.flatten_page_tree(root, options)?;

        log::info!(
            "Parsed '{}': PDF {}.{}, {} objects, {} pages",
            doc.label,
            doc.version.0,
            doc.version.1,
            doc.objects.len(),
            doc.pages.len()
        );
        Ok(doc)
    }

    /// Walk the page tree from `root`, collecting leaves in document order.
    fn flatten_page_tree(&mut self, root: ObjectRef, options: &ParseOptions) -> Result<()> {
        if !self.objects.get(&root.id).is_some_and(|o| o.as_dict().is_some()) {
            return Err(Error::InvalidPdf(format!("page tree root {} is missing", root)));
        }

        let mut visited = HashSet::new();
        let mut pages = Vec::new();
        let mut nodes = HashSet::new();
        // (node, inherited attributes so far, depth)
        let mut stack = vec![(root, Dictionary::new(), 0u32)];

        while let Some((node_ref, inherited, depth)) = stack.pop() {
            if !visited.insert(node_ref.id) {
                log::warn!("'{}': page tree revisits {}, skipping", self.label, node_ref);
                continue;
            }
            if depth > options.max_page_tree_depth {
                log::warn!(
                    "'{}': page tree deeper than {} levels at {}, skipping",
                    self.label,
                    options.max_page_tree_depth,
                    node_ref
                );
                continue;
            }
            let Some(node) = self.objects.get(&node_ref.id).and_then(|o| o.as_dict()) else {
                log::warn!("'{}': page tree node {} is missing", self.label, node_ref);
                continue;
            };

            let kids = node.get("Kids").and_then(|k| self.resolve(k)).and_then(|k| k.as_array());
            let is_node = match node.get("Type").and_then(|t| t.as_name()) {
                Some("Pages") => true,
                Some("Page") => false,
                _ => kids.is_some(),
            };

            if !is_node {
                let mut own = Dictionary::new();
                for key in INHERITABLE_KEYS {
                    if !node.contains_key(key) {
                        if let Some(value) = inherited.get(key) {
                            own.insert(key.to_string(), value.clone());
                        }
                    }
                }
                pages.push(PageEntry {
                    object: node_ref,
                    inherited: own,
                });
                continue;
            }

            nodes.insert(node_ref.id);
            let mut passed_down = inherited;
            for key in INHERITABLE_KEYS {
                if let Some(value) = node.get(key) {
                    passed_down.insert(key.to_string(), value.clone());
                }
            }

            // Reverse so the stack pops kids in document order
            for kid in kids.map(|k| k.as_slice()).unwrap_or_default().iter().rev() {
                match kid.as_reference() {
                    Some(kid_ref) => stack.push((kid_ref, passed_down.clone(), depth + 1)),
                    None => log::warn!(
                        "'{}': non-reference entry in /Kids of {}, skipping",
                        self.label,
                        node_ref
                    ),
                }
            }
        }

        for (index, page) in pages.iter().enumerate() {
            self.page_positions.entry(page.object.id).or_insert(index);
        }
        self.pages = pages;
        self.page_tree_nodes = nodes;
        Ok(())
    }

    /// Label used in error messages.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Header version, raised to the catalog's `/Version` if that is newer.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All pages in document order.
    pub fn pages(&self) -> &[PageEntry] {
        &self.pages
    }

    /// The page at a 0-based index.
    pub fn page(&self, index: usize) -> Option<&PageEntry> {
        self.pages.get(index)
    }

    /// Position of a page object in the page list, if it is a page.
    pub fn page_position(&self, object_number: u32) -> Option<usize> {
        self.page_positions.get(&object_number).copied()
    }

    /// Whether an object is an intermediate `/Pages` node.
    pub fn is_page_tree_node(&self, object_number: u32) -> bool {
        self.page_tree_nodes.contains(&object_number)
    }

    /// Object by number. Generation numbers are not checked.
    pub fn object(&self, object_number: u32) -> Option<&Object> {
        self.objects.get(&object_number)
    }

    /// Number of objects in the table.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// All objects, in no particular order.
    pub fn objects(&self) -> impl Iterator<Item = (u32, &Object)> + '_ {
        self.objects.iter().map(|(&number, object)| (number, object))
    }

    /// Trailer dictionary of the newest cross-reference section.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Reference to the document catalog.
    pub fn catalog_ref(&self) -> ObjectRef {
        self.catalog
    }

    /// Follow references until a direct object is reached.
    pub fn resolve<'a>(&'a self, mut object: &'a Object) -> Option<&'a Object> {
        for _ in 0..MAX_REFERENCE_CHAIN {
            match object {
                Object::Reference(r) => object = self.objects.get(&r.id)?,
                direct => return Some(direct),
            }
        }
        None
    }

    /// An attribute of a page, its own value first, then the inherited one,
    /// with references resolved.
    pub fn page_attribute<'a>(&'a self, page: &'a PageEntry, key: &str) -> Option<&'a Object> {
        let own = self
            .objects
            .get(&page.object.id)
            .and_then(|o| o.as_dict())
            .and_then(|d| d.get(key));
        self.resolve(own.or_else(|| page.inherited.get(key))?)
    }
}

/// Locate `%PDF-M.m` near the start of the file.
fn parse_header(data: &[u8], options: &ParseOptions) -> Result<(usize, (u8, u8))> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let offset = window
        .windows(5)
        .position(|w| w == b"%PDF-")
        .ok_or_else(|| Error::InvalidHeader("no %PDF- header found".to_string()))?;
    if offset > 0 {
        if options.strict {
            return Err(Error::InvalidHeader(format!("header starts at byte {}", offset)));
        }
        log::warn!("Ignoring {} bytes before the %PDF- header", offset);
    }

    let version = parse_version(&data[offset + 5..]).ok_or_else(|| {
        Error::InvalidHeader(format!(
            "invalid version '{}'",
            String::from_utf8_lossy(&data[offset + 5..(offset + 8).min(data.len())])
        ))
    })?;
    Ok((offset, version))
}

/// `M.m` at the start of `text`.
fn parse_version(text: &[u8]) -> Option<(u8, u8)> {
    match text {
        [major, b'.', minor, ..] if major.is_ascii_digit() && minor.is_ascii_digit() => {
            Some((major - b'0', minor - b'0'))
        },
        _ => None,
    }
}

fn load_xref(data: &[u8], options: &ParseOptions) -> Result<CrossRefTable> {
    let regular = find_startxref(data).and_then(|start| read_xref_chain(data, start, options));
    match regular {
        Ok(table) if table.trailer().contains_key("Root") || !options.recover_xref => Ok(table),
        Ok(_) => {
            log::warn!("Cross-reference trailer lacks /Root, reconstructing");
            reconstruct_xref(data, options)
        },
        Err(e) if options.recover_xref => {
            log::warn!("Cross-reference section unusable ({}), reconstructing", e);
            reconstruct_xref(data, options)
        },
        Err(e) => Err(e),
    }
}

/// Parse every in-use object: plain objects first, then object-stream
/// members.
fn load_objects(
    data: &[u8],
    xref: &CrossRefTable,
    options: &ParseOptions,
) -> Result<HashMap<u32, Object>> {
    let base = ParseContext::from_options(options);
    let resolve_length = |r: ObjectRef| -> Option<usize> {
        match xref.get(r.id)? {
            XRefEntry::InUse { offset, .. } => parse_indirect_object_at(data, *offset, &base)
                .ok()
                .and_then(|(_, obj)| obj.as_integer())
                .and_then(|n| usize::try_from(n).ok()),
            _ => None,
        }
    };
    let ctx = base.with_length_resolver(&resolve_length);

    let mut objects = HashMap::new();
    let mut compressed: BTreeMap<u32, Vec<(u32, u32)>> = BTreeMap::new();

    for (number, entry) in xref.entries() {
        match *entry {
            XRefEntry::InUse { offset, .. } => {
                match parse_indirect_object_at(data, offset, &ctx) {
                    Ok((found, object)) if found.id == number => {
                        objects.insert(number, object);
                    },
                    Ok((found, _)) => {
                        let msg = format!("xref entry {} points at object {}", number, found.id);
                        if options.strict {
                            return Err(Error::InvalidPdf(msg));
                        }
                        log::warn!("{}, ignoring", msg);
                    },
                    Err(e) => {
                        if options.strict {
                            return Err(e);
                        }
                        log::warn!("Object {} at byte {} unreadable: {}", number, offset, e);
                    },
                }
            },
            XRefEntry::Compressed { stream, index } => {
                compressed.entry(stream).or_default().push((number, index));
            },
            XRefEntry::Free { .. } => {},
        }
    }

    for (stream_number, members) in compressed {
        let extracted = match objects.get(&stream_number) {
            Some(stream) => parse_object_stream(stream, options),
            None => Err(Error::ObjectNotFound(ObjectRef::new(stream_number, 0))),
        };
        let extracted = match extracted {
            Ok(list) => list,
            Err(e) => {
                if options.strict {
                    return Err(e);
                }
                log::warn!("Object stream {} unreadable: {}", stream_number, e);
                continue;
            },
        };

        for (number, index) in members {
            let slot = extracted
                .get(index as usize)
                .filter(|(n, _)| *n == number)
                .or_else(|| extracted.iter().find(|(n, _)| *n == number));
            match slot {
                // A plain definition from the same update takes precedence
                Some((_, object)) => {
                    objects.entry(number).or_insert_with(|| object.clone());
                },
                None => log::warn!(
                    "Object {} not found in object stream {}",
                    number,
                    stream_number
                ),
            }
        }
    }

    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Assemble a classic-xref PDF from object bodies numbered from 1.
    fn build(bodies: &[&str], trailer_extra: &str) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in bodies.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref_at = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", bodies.len() + 1).as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R {} >>\nstartxref\n{}\n%%EOF\n",
                bodies.len() + 1,
                trailer_extra,
                xref_at
            )
            .as_bytes(),
        );
        out
    }

    #[test]
    fn test_parse_flat_document() {
        let data = build(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 612 792] >>",
                "<< /Type /Page /Parent 2 0 R >>",
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 100 100] >>",
            ],
            "",
        );
        let doc = SourceDocument::parse_labeled(&data, "flat.pdf").unwrap();
        assert_eq!(doc.label(), "flat.pdf");
        assert_eq!(doc.version(), (1, 4));
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page(0).unwrap().object, ObjectRef::new(3, 0));
        assert!(doc.page(0).unwrap().inherited.contains_key("MediaBox"));
        // Page 4 has its own MediaBox
        assert!(doc.page(1).unwrap().inherited.is_empty());
        assert!(doc.is_page_tree_node(2));
        assert_eq!(doc.page_position(4), Some(1));
    }

    #[test]
    fn test_nested_tree_order_and_inheritance() {
        let data = build(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R 6 0 R] /Rotate 90 /Resources << /Font << >> >> >>",
                "<< /Type /Pages /Kids [4 0 R 5 0 R] /Rotate 180 >>",
                "<< /Type /Page >>",
                "<< /Type /Page >>",
                "<< /Type /Page /Rotate 0 >>",
            ],
            "",
        );
        let doc = SourceDocument::parse(&data).unwrap();
        let order: Vec<u32> = doc.pages().iter().map(|p| p.object.id).collect();
        assert_eq!(order, vec![4, 5, 6]);

        let first = doc.page(0).unwrap();
        assert_eq!(doc.page_attribute(first, "Rotate"), Some(&Object::Integer(180)));
        assert!(doc.page_attribute(first, "Resources").is_some());
        let last = doc.page(2).unwrap();
        assert_eq!(doc.page_attribute(last, "Rotate"), Some(&Object::Integer(0)));
    }

    #[test]
    fn test_page_attribute_from_detached_entry() {
        let data = build(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R] /MediaBox [0 0 200 100] >>",
                "<< /Type /Page /Rotate 7 0 R >>",
                "<< >>",
                "<< >>",
                "<< >>",
                "270",
            ],
            "",
        );
        let doc = SourceDocument::parse(&data).unwrap();
        let media_box = {
            // An entry owned by the caller rather than borrowed from `doc`
            let entry = doc.page(0).unwrap().clone();
            doc.page_attribute(&entry, "MediaBox").cloned()
        };
        assert_eq!(
            media_box.and_then(|m| m.as_array().map(|a| a.len())),
            Some(4)
        );
        let page = doc.page(0).unwrap();
        assert_eq!(doc.page_attribute(page, "Rotate"), Some(&Object::Integer(270)));
        assert_eq!(doc.page_attribute(page, "CropBox"), None);
    }

    #[test]
    fn test_page_tree_cycle_is_skipped() {
        let data = build(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R 2 0 R] >>",
                "<< /Type /Page /Parent 2 0 R >>",
            ],
            "",
        );
        let doc = SourceDocument::parse(&data).unwrap();
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn test_encrypted_document_rejected() {
        let data = build(
            &["<< /Type /Catalog /Pages 2 0 R >>", "<< /Type /Pages /Kids [] >>"],
            "/Encrypt << /Filter /Standard >>",
        );
        match SourceDocument::parse_labeled(&data, "secret.pdf") {
            Err(Error::UnsupportedEncryption { document }) => assert_eq!(document, "secret.pdf"),
            other => panic!("expected UnsupportedEncryption, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_startxref_is_malformed() {
        let err = SourceDocument::parse_labeled(b"%PDF-1.4\n1 0 obj null endobj", "x.pdf").unwrap_err();
        match err {
            Error::MalformedSource { document, .. } => assert_eq!(document, "x.pdf"),
            other => panic!("expected MalformedSource, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_header() {
        assert!(matches!(
            SourceDocument::parse(b"GIF89a not a pdf"),
            Err(Error::MalformedSource { .. })
        ));
    }

    #[test]
    fn test_recovery_when_enabled() {
        let mut data = build(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R] >>",
                "<< /Type /Page >>",
            ],
            "",
        );
        // Break the startxref offset
        let pos = data.windows(9).rposition(|w| w == b"startxref").unwrap();
        data.truncate(pos);
        data.extend_from_slice(b"startxref\n3\n%%EOF\n");

        assert!(SourceDocument::parse(&data).is_err());
        let options = ParseOptions::default().with_recover_xref(true);
        let doc = SourceDocument::parse_with_options(&data, "broken.pdf", &options).unwrap();
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn test_catalog_version_overrides_header() {
        let data = build(
            &["<< /Type /Catalog /Pages 2 0 R /Version /1.7 >>", "<< /Type /Pages /Kids [] >>"],
            "",
        );
        let doc = SourceDocument::parse(&data).unwrap();
        assert_eq!(doc.version(), (1, 7));
        assert_eq!(doc.page_count(), 0);
    }

    #[test]
    fn test_source_document_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SourceDocument>();
    }
}
