//! PDF document writer.
//!
//! Lays out a [`MergedDocument`] as header, body, cross-reference section
//! (classic table or compressed stream) and trailer.

use super::object_serializer::ObjectSerializer;
use crate::config::{MergeOptions, XrefStyle};
use crate::error::{Error, Result};
use crate::merge::MergedDocument;
use crate::object::{Dictionary, Object, ObjectRef};
use chrono::{DateTime, Utc};
use flate2::write::ZlibEncoder;
use flate2::{Compression, Crc};
use std::io::Write;

/// Serializes merged documents.
pub struct PdfWriter<'o> {
    options: &'o MergeOptions,
    serializer: ObjectSerializer,
}

impl<'o> PdfWriter<'o> {
    /// Create a writer for `options`.
    pub fn new(options: &'o MergeOptions) -> Self {
        Self {
            options,
            serializer: ObjectSerializer::new(),
        }
    }

    /// Serialize the whole document.
    pub fn write(&self, doc: &MergedDocument) -> Result<Vec<u8>> {
        let version = self.header_version()?;
        let mut output = Vec::new();
        writeln!(output, "%PDF-{}.{}", version.0, version.1)?;
        // Binary marker
        output.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

        let info_ref = ObjectRef::new(doc.next_number(), 0);
        let mut offsets: Vec<(u32, usize)> = Vec::with_capacity(doc.objects().len() + 2);

        for (&number, object) in doc.objects() {
            offsets.push((number, output.len()));
            let r = ObjectRef::new(number, 0);
            match self.compressed(object)? {
                Some(stream) => self.serializer.write_indirect(&mut output, r, &stream)?,
                None => self.serializer.write_indirect(&mut output, r, object)?,
            }
        }

        let body_end = output.len();
        offsets.push((info_ref.id, body_end));
        self.serializer.write_indirect(&mut output, info_ref, &self.info_dictionary())?;

        let mut trailer = Dictionary::new();
        trailer.insert("Root".to_string(), Object::Reference(doc.catalog()));
        trailer.insert("Info".to_string(), Object::Reference(info_ref));
        let id = Object::String(file_id(doc.pages().len(), &offsets, &output[..body_end]));
        trailer.insert("ID".to_string(), Object::Array(vec![id.clone(), id]));

        match self.options.xref_style {
            XrefStyle::Table => self.write_xref_table(&mut output, &offsets, trailer)?,
            XrefStyle::Stream => self.write_xref_stream(&mut output, &mut offsets, trailer)?,
        }

        log::info!(
            "Wrote {} bytes ({} objects, {} pages)",
            output.len(),
            offsets.len(),
            doc.pages().len()
        );
        Ok(output)
    }

    /// The configured version, raised to 1.5 for a cross-reference stream.
    fn header_version(&self) -> Result<(u8, u8)> {
        let parsed = self
            .options
            .version
            .split_once('.')
            .and_then(|(major, minor)| Some((major.parse::<u8>().ok()?, minor.parse::<u8>().ok()?)))
            .filter(|&(major, minor)| major <= 9 && minor <= 9)
            .ok_or_else(|| {
                Error::InvalidHeader(format!("invalid output version '{}'", self.options.version))
            })?;
        Ok(match self.options.xref_style {
            XrefStyle::Stream => parsed.max((1, 5)),
            XrefStyle::Table => parsed,
        })
    }

    /// Flate-compress an unfiltered stream when enabled and worthwhile.
    fn compressed(&self, object: &Object) -> Result<Option<Object>> {
        let Object::Stream { dict, data } = object else {
            return Ok(None);
        };
        if !self.options.compress_streams || dict.contains_key("Filter") || data.is_empty() {
            return Ok(None);
        }
        let packed = deflate(data)?;
        if packed.len() >= data.len() {
            return Ok(None);
        }
        let mut dict = dict.clone();
        dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));
        dict.shift_remove("DecodeParms");
        Ok(Some(Object::Stream {
            dict,
            data: bytes::Bytes::from(packed),
        }))
    }

    fn info_dictionary(&self) -> Object {
        let when = self.options.creation_date.unwrap_or_else(Utc::now);
        let date = Object::String(pdf_date(when).into_bytes());
        let mut info = Dictionary::new();
        info.insert("Producer".to_string(), ObjectSerializer::string(&self.options.producer));
        if let Some(creator) = &self.options.creator {
            info.insert("Creator".to_string(), ObjectSerializer::string(creator));
        }
        if let Some(title) = &self.options.title {
            info.insert("Title".to_string(), ObjectSerializer::string(title));
        }
        info.insert("CreationDate".to_string(), date.clone());
        info.insert("ModDate".to_string(), date);
        Object::Dictionary(info)
    }

    fn write_xref_table(
        &self,
        output: &mut Vec<u8>,
        offsets: &[(u32, usize)],
        trailer: Dictionary,
    ) -> Result<()> {
        let size = offsets.iter().map(|(n, _)| n + 1).max().unwrap_or(1);
        let xref_start = output.len();

        writeln!(output, "xref")?;
        writeln!(output, "0 {}", size)?;
        output.extend_from_slice(b"0000000000 65535 f\r\n");
        let mut located = offsets.iter().peekable();
        for number in 1..size {
            match located.peek() {
                Some(&&(n, offset)) if n == number => {
                    write!(output, "{:010} 00000 n\r\n", offset)?;
                    located.next();
                },
                _ => output.extend_from_slice(b"0000000000 00000 f\r\n"),
            }
        }

        let mut full = Dictionary::new();
        full.insert("Size".to_string(), Object::Integer(size as i64));
        full.extend(trailer);
        output.extend_from_slice(b"trailer\n");
        self.serializer.write_object(output, &Object::Dictionary(full))?;
        write!(output, "\nstartxref\n{}\n%%EOF\n", xref_start)?;
        Ok(())
    }

    fn write_xref_stream(
        &self,
        output: &mut Vec<u8>,
        offsets: &mut Vec<(u32, usize)>,
        trailer: Dictionary,
    ) -> Result<()> {
        let xref_start = output.len();
        let own_number = offsets.iter().map(|(n, _)| n + 1).max().unwrap_or(1);
        offsets.push((own_number, xref_start));
        let size = own_number + 1;

        let offset_width = byte_width(xref_start as u64);
        let mut rows = Vec::with_capacity(size as usize * (offset_width + 3));
        push_row(&mut rows, 0, 0, offset_width, 65535);
        let mut located = offsets.iter().peekable();
        for number in 1..size {
            match located.peek() {
                Some(&&(n, offset)) if n == number => {
                    push_row(&mut rows, 1, offset as u64, offset_width, 0);
                    located.next();
                },
                _ => push_row(&mut rows, 0, 0, offset_width, 0),
            }
        }

        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::Name("XRef".to_string()));
        dict.insert("Size".to_string(), Object::Integer(size as i64));
        dict.insert(
            "W".to_string(),
            Object::Array(vec![
                Object::Integer(1),
                Object::Integer(offset_width as i64),
                Object::Integer(2),
            ]),
        );
        dict.extend(trailer);
        dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));
        let stream = Object::Stream {
            dict,
            data: bytes::Bytes::from(deflate(&rows)?),
        };

        self.serializer
            .write_indirect(output, ObjectRef::new(own_number, 0), &stream)?;
        write!(output, "startxref\n{}\n%%EOF\n", xref_start)?;
        Ok(())
    }
}

fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// `D:YYYYMMDDHHmmSS+00'00'`
fn pdf_date(when: DateTime<Utc>) -> String {
    when.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}

/// 16 bytes from the page count, the object layout and the body bytes.
///
/// The information dictionary is outside `body`, so the timestamps never
/// change the identifier.
fn file_id(page_count: usize, offsets: &[(u32, usize)], body: &[u8]) -> Vec<u8> {
    let mut id = Vec::with_capacity(16);
    for salt in 0u8..4 {
        let mut crc = Crc::new();
        crc.update(&[salt]);
        crc.update(crate::NAME.as_bytes());
        crc.update(&(page_count as u64).to_be_bytes());
        for &(number, offset) in offsets {
            crc.update(&number.to_be_bytes());
            crc.update(&(offset as u64).to_be_bytes());
        }
        crc.update(body);
        id.extend_from_slice(&crc.sum().to_be_bytes());
    }
    id
}

/// Smallest number of bytes holding `value`, at least 1.
fn byte_width(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

fn push_row(rows: &mut Vec<u8>, kind: u8, field2: u64, width: usize, field3: u16) {
    rows.push(kind);
    rows.extend_from_slice(&field2.to_be_bytes()[8 - width..]);
    rows.extend_from_slice(&field3.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xref::{find_startxref, read_xref_chain, XRefEntry};
    use chrono::TimeZone;

    fn tiny_document() -> MergedDocument {
        let mut doc = MergedDocument::new();
        let page = doc.allocate();
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::Name("Page".to_string()));
        dict.insert("Parent".to_string(), Object::Reference(doc.root()));
        doc.set(page, Object::Dictionary(dict));
        doc.push_page(ObjectRef::new(page, 0));
        doc.set(1, ObjectSerializer::dict(vec![("Type", ObjectSerializer::name("Catalog"))]));
        doc.set(2, ObjectSerializer::dict(vec![("Type", ObjectSerializer::name("Pages"))]));
        doc
    }

    fn fixed_options() -> MergeOptions {
        MergeOptions::default().with_creation_date(Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap())
    }

    #[test]
    fn test_pdf_date_format() {
        let when = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        assert_eq!(pdf_date(when), "D:20240305140709+00'00'");
    }

    #[test]
    fn test_byte_width() {
        assert_eq!(byte_width(0), 1);
        assert_eq!(byte_width(255), 1);
        assert_eq!(byte_width(256), 2);
        assert_eq!(byte_width(70_000), 3);
    }

    #[test]
    fn test_file_id_tells_same_shaped_files_apart() {
        let offsets = [(1, 15), (2, 60), (3, 110)];
        let first = file_id(1, &offsets, b"%PDF-1.7 body one");
        let second = file_id(1, &offsets, b"%PDF-1.7 body two");
        assert_eq!(first.len(), 16);
        assert_ne!(first, second);
        assert_eq!(first, file_id(1, &offsets, b"%PDF-1.7 body one"));
    }

    #[test]
    fn test_table_output_reads_back() {
        let options = fixed_options();
        let bytes = PdfWriter::new(&options).write(&tiny_document()).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7\n%"));
        assert!(bytes.ends_with(b"%%EOF\n"));

        let start = find_startxref(&bytes).unwrap();
        let table = read_xref_chain(&bytes, start, &options.parse).unwrap();
        // Catalog, root, page, info
        assert_eq!(table.len(), 5);
        assert_eq!(table.trailer().get("Size"), Some(&Object::Integer(5)));
        assert!(table.trailer().contains_key("ID"));
        match table.get(1) {
            Some(XRefEntry::InUse { offset, .. }) => assert!(bytes[*offset..].starts_with(b"1 0 obj")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_stream_output_reads_back() {
        let options = fixed_options().with_xref_style(XrefStyle::Stream).with_version("1.4");
        let bytes = PdfWriter::new(&options).write(&tiny_document()).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let start = find_startxref(&bytes).unwrap();
        let table = read_xref_chain(&bytes, start, &options.parse).unwrap();
        assert_eq!(table.trailer().get("Root"), Some(&Object::Reference(ObjectRef::new(1, 0))));
        match table.get(4) {
            Some(XRefEntry::InUse { offset, .. }) => assert!(bytes[*offset..].starts_with(b"4 0 obj")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fixed_date_is_deterministic() {
        let options = fixed_options();
        let a = PdfWriter::new(&options).write(&tiny_document()).unwrap();
        let b = PdfWriter::new(&options).write(&tiny_document()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_compresses_only_unfiltered_streams() {
        let options = fixed_options().with_compression(true);
        let writer = PdfWriter::new(&options);
        let plain = Object::Stream {
            dict: Dictionary::new(),
            data: bytes::Bytes::from(vec![b'a'; 500]),
        };
        let packed = writer.compressed(&plain).unwrap().unwrap();
        assert_eq!(
            packed.as_dict().and_then(|d| d.get("Filter")),
            Some(&Object::Name("FlateDecode".to_string()))
        );
        assert_eq!(packed.decode_stream_data().unwrap(), vec![b'a'; 500]);

        let mut dict = Dictionary::new();
        dict.insert("Filter".to_string(), Object::Name("DCTDecode".to_string()));
        let jpeg = Object::Stream {
            dict,
            data: bytes::Bytes::from(vec![0u8; 500]),
        };
        assert!(writer.compressed(&jpeg).unwrap().is_none());
    }

    #[test]
    fn test_bad_version_rejected() {
        let options = fixed_options().with_version("seven");
        assert!(PdfWriter::new(&options).write(&tiny_document()).is_err());
    }
}
