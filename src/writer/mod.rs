//! PDF output.
//!
//! ## Architecture
//!
//! ```text
//! MergedDocument (object table, catalog, page-tree root)
//!     ↓
//! [PdfWriter] (header, body, xref table or stream, trailer)
//!     ↓
//! [ObjectSerializer] (serializes PDF objects)
//!     ↓
//! PDF bytes
//! ```

mod object_serializer;
mod pdf_writer;

pub use object_serializer::ObjectSerializer;
pub use pdf_writer::PdfWriter;
