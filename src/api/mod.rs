//! High-level API for page-picking front ends.
//!
//! A front end parses each dropped file once to learn its page count and
//! page sizes, lets the user pick and order pages, then hands everything to
//! [`merge_pdfs`] (or [`merge_documents`] with the handles it already has).
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdf_splice::api::{get_page, merge_pdfs, parse_document, MergeInput};
//! use pdf_splice::config::MergeOptions;
//!
//! # fn main() -> pdf_splice::Result<()> {
//! let a = std::fs::read("a.pdf")?;
//! let b = std::fs::read("b.pdf")?;
//!
//! let handle = parse_document(&a)?;
//! let first = get_page(&handle, 0)?;
//! println!("{} pages, first is {}x{}", handle.page_count(), first.width(), first.height());
//!
//! let merged = merge_pdfs(
//!     &[MergeInput::new(&a, vec![1, 0]), MergeInput::new(&b, vec![0]).with_label("b.pdf")],
//!     &MergeOptions::default(),
//! )?;
//! std::fs::write("merged.pdf", merged)?;
//! # Ok(())
//! # }
//! ```

mod batch;
mod page;

pub use batch::{merge_documents, merge_pdfs, merge_pdfs_with, parse_all, MergeInput};
pub use page::{get_page, parse_document, parse_document_with, DocumentHandle, PageRef};
