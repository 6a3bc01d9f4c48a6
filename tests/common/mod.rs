//! Synthetic PDF fixtures shared by the integration tests.
//!
//! Every fixture is assembled byte by byte so offsets, lengths and
//! cross-reference data are exact.

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use pdf_splice::document::SourceDocument;
use std::io::Write;

/// Initialise logging once per test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Content stream text for page `index` of a fixture tagged `tag`.
pub fn page_text(tag: &str, index: usize) -> String {
    format!("BT /F1 12 Tf 72 720 Td ({}-{}) Tj ET", tag, index)
}

/// Builder for files with a classic cross-reference table.
#[derive(Default)]
pub struct PdfFixture {
    version: &'static str,
    objects: Vec<(u32, Vec<u8>)>,
    trailer_extra: String,
}

impl PdfFixture {
    pub fn new() -> Self {
        Self {
            version: "1.4",
            ..Self::default()
        }
    }

    pub fn version(mut self, version: &'static str) -> Self {
        self.version = version;
        self
    }

    /// Add `number 0 obj body endobj`.
    pub fn object(mut self, number: u32, body: &str) -> Self {
        self.objects.push((number, body.as_bytes().to_vec()));
        self
    }

    /// Add a stream object with an exact direct `/Length`.
    pub fn stream(mut self, number: u32, dict_entries: &str, data: &[u8]) -> Self {
        let mut body = format!("<< /Length {} {} >>\nstream\n", data.len(), dict_entries).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.objects.push((number, body));
        self
    }

    /// Extra trailer entries, e.g. `/Encrypt 9 0 R`.
    pub fn trailer_entry(mut self, entry: &str) -> Self {
        self.trailer_extra.push(' ');
        self.trailer_extra.push_str(entry);
        self
    }

    /// Assemble the file; the catalog must be object 1.
    pub fn build(&self) -> Vec<u8> {
        let mut out = format!("%PDF-{}\n%\u{e2}\u{e3}\n", self.version).into_bytes();
        let mut offsets = Vec::new();
        for (number, body) in &self.objects {
            offsets.push((*number, out.len()));
            out.extend_from_slice(format!("{} 0 obj\n", number).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let size = offsets.iter().map(|(n, _)| n + 1).max().unwrap_or(1);
        let xref_at = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", size).as_bytes());
        for number in 1..size {
            match offsets.iter().find(|(n, _)| *n == number) {
                Some((_, offset)) => out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes()),
                None => out.extend_from_slice(b"0000000000 00000 f \n"),
            }
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R{} >>\nstartxref\n{}\n%%EOF\n",
                size, self.trailer_extra, xref_at
            )
            .as_bytes(),
        );
        out
    }
}

/// `pages` pages sharing font 3 and an inherited MediaBox; page `i` is
/// object `4 + 2i` with content `5 + 2i`.
pub fn simple_pdf(tag: &str, pages: usize) -> Vec<u8> {
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    let mut fixture = PdfFixture::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            &format!(
                "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 612 792] >>",
                kids.join(" "),
                pages
            ),
        )
        .object(3, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>");
    for i in 0..pages {
        let page = 4 + 2 * i;
        fixture = fixture
            .object(
                page as u32,
                &format!(
                    "<< /Type /Page /Parent 2 0 R /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                    page + 1
                ),
            )
            .stream(page as u32 + 1, "", page_text(tag, i).as_bytes());
    }
    fixture.build()
}

/// Same layout as [`simple_pdf`], but the catalog, page tree, font and page
/// dictionaries live in a compressed object stream, and the cross-reference
/// data is a FlateDecode stream with a PNG Up predictor.
pub fn xref_stream_pdf(tag: &str, pages: usize) -> Vec<u8> {
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    let mut packed: Vec<(u32, String)> = vec![
        (1, "<< /Type /Catalog /Pages 2 0 R >>".to_string()),
        (
            2,
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 595 842] >>",
                kids.join(" "),
                pages
            ),
        ),
        (3, "<< /Type /Font /Subtype /Type1 /BaseFont /Courier >>".to_string()),
    ];
    for i in 0..pages {
        let page = (4 + 2 * i) as u32;
        packed.push((
            page,
            format!(
                "<< /Type /Page /Parent 2 0 R /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                page + 1
            ),
        ));
    }

    let objstm_number = (4 + 2 * pages) as u32;
    let xref_number = objstm_number + 1;

    let mut out = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n".to_vec();
    // (number, kind, field2, field3)
    let mut entries: Vec<(u32, u8, u64, u16)> = Vec::new();

    for i in 0..pages {
        let number = (5 + 2 * i) as u32;
        let data = deflate(page_text(tag, i).as_bytes());
        entries.push((number, 1, out.len() as u64, 0));
        out.extend_from_slice(
            format!("{} 0 obj\n<< /Length {} /Filter /FlateDecode >>\nstream\n", number, data.len()).as_bytes(),
        );
        out.extend_from_slice(&data);
        out.extend_from_slice(b"\nendstream\nendobj\n");
    }

    let mut header = String::new();
    let mut body = String::new();
    for (index, (number, text)) in packed.iter().enumerate() {
        header.push_str(&format!("{} {} ", number, body.len()));
        body.push_str(text);
        body.push(' ');
        entries.push((*number, 2, objstm_number as u64, index as u16));
    }
    let raw = format!("{}{}", header, body);
    let data = deflate(raw.as_bytes());
    entries.push((objstm_number, 1, out.len() as u64, 0));
    out.extend_from_slice(
        format!(
            "{} 0 obj\n<< /Type /ObjStm /N {} /First {} /Length {} /Filter /FlateDecode >>\nstream\n",
            objstm_number,
            packed.len(),
            header.len(),
            data.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&data);
    out.extend_from_slice(b"\nendstream\nendobj\n");

    let xref_at = out.len();
    entries.push((xref_number, 1, xref_at as u64, 0));
    entries.push((0, 0, 0, 65535));
    entries.sort_by_key(|e| e.0);

    // Rows of W [1 4 2], PNG Up predictor
    let mut rows = Vec::new();
    let mut previous = [0u8; 7];
    for (_, kind, field2, field3) in &entries {
        let mut row = [0u8; 7];
        row[0] = *kind;
        row[1..5].copy_from_slice(&(*field2 as u32).to_be_bytes());
        row[5..7].copy_from_slice(&field3.to_be_bytes());
        rows.push(2u8);
        for (byte, prev) in row.iter().zip(previous.iter()) {
            rows.push(byte.wrapping_sub(*prev));
        }
        previous = row;
    }
    let data = deflate(&rows);
    out.extend_from_slice(
        format!(
            "{} 0 obj\n<< /Type /XRef /Size {} /W [1 4 2] /Root 1 0 R /Filter /FlateDecode \
             /DecodeParms << /Predictor 12 /Columns 7 >> /Length {} >>\nstream\n",
            xref_number,
            xref_number + 1,
            data.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&data);
    out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_at).as_bytes());
    out
}

/// Three pages under two levels of `/Pages` nodes, with `/Rotate` and
/// `/Resources` inherited from different levels.
pub fn nested_pdf() -> Vec<u8> {
    PdfFixture::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            "<< /Type /Pages /Kids [3 0 R 8 0 R] /Count 3 /MediaBox [0 0 300 400] \
             /Resources << /Font << /F1 10 0 R >> >> >>",
        )
        .object(3, "<< /Type /Pages /Parent 2 0 R /Kids [4 0 R 6 0 R] /Count 2 /Rotate 90 >>")
        .object(4, "<< /Type /Page /Parent 3 0 R /Contents 5 0 R >>")
        .stream(5, "", page_text("nested", 0).as_bytes())
        .object(6, "<< /Type /Page /Parent 3 0 R /Contents 7 0 R /CropBox [10 10 290 390] >>")
        .stream(7, "", page_text("nested", 1).as_bytes())
        .object(8, "<< /Type /Page /Parent 2 0 R /Contents 9 0 R /MediaBox [0 0 200 200] >>")
        .stream(9, "", page_text("nested", 2).as_bytes())
        .object(10, "<< /Type /Font /Subtype /Type1 /BaseFont /Times-Roman >>")
        .build()
}

/// A page tree whose node lists itself as a kid, and a form XObject whose
/// resources point back at the form.
pub fn cyclic_pdf() -> Vec<u8> {
    PdfFixture::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R 2 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 100 100] \
             /Resources << /XObject << /X1 5 0 R >> >> /Contents 4 0 R >>",
        )
        .stream(4, "", b"/X1 Do")
        .stream(
            5,
            "/Type /XObject /Subtype /Form /BBox [0 0 10 10] /Resources << /XObject << /Self 5 0 R >> >> \
             /Parent 2 0 R",
            b"0 0 10 10 re f",
        )
        .build()
}

/// Two pages where page 0 carries a link annotation to page 1.
pub fn linked_pdf() -> Vec<u8> {
    PdfFixture::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 612 792] >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /Annots [5 0 R] /Contents 6 0 R >>")
        .object(4, "<< /Type /Page /Parent 2 0 R /Contents 7 0 R >>")
        .object(5, "<< /Type /Annot /Subtype /Link /Rect [0 0 50 50] /Dest [4 0 R /Fit] >>")
        .stream(6, "", page_text("linked", 0).as_bytes())
        .stream(7, "", page_text("linked", 1).as_bytes())
        .build()
}

/// Decoded content stream of page `index`.
pub fn page_content(doc: &SourceDocument, index: usize) -> Vec<u8> {
    let page = doc.page(index).expect("page index");
    let dict = doc.object(page.object.id).and_then(|o| o.as_dict()).expect("page dict");
    let contents = dict.get("Contents").and_then(|c| doc.resolve(c)).expect("contents");
    contents.decode_stream_data().expect("decodable content")
}

/// Page texts of a parsed document, in page order.
pub fn page_texts(doc: &SourceDocument) -> Vec<String> {
    (0..doc.page_count())
        .map(|i| String::from_utf8_lossy(&page_content(doc, i)).into_owned())
        .collect()
}
