//! Text extraction from uploaded PDF and DOCX files

use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use serde::Serialize;
use std::io::{Cursor, Read};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use docqa_core::{Document, Error, FileKind, Result, UploadedFile};

/// A file that was not attempted because its type is not supported
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

/// A supported file whose extraction failed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedFile {
    pub name: String,
    pub error: String,
}

/// Outcome of loading a batch of uploads
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub documents: Vec<Arc<Document>>,
    pub skipped: Vec<SkippedFile>,
    pub failed: Vec<FailedFile>,
}

impl LoadReport {
    pub fn document_names(&self) -> Vec<String> {
        self.documents.iter().map(|doc| doc.name.clone()).collect()
    }
}

/// Extracts and normalizes text from PDF and DOCX bytes
pub struct DocumentLoader {
    trailing_space: Regex,
    blank_runs: Regex,
}

impl DocumentLoader {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::Configuration(format!("invalid pattern: {}", e)))
        };
        Ok(Self {
            trailing_space: compile(r"(?m)[ \t]+$")?,
            blank_runs: compile(r"\n{3,}")?,
        })
    }

    /// Load every supported file; unsupported and broken files are reported, not fatal
    pub fn load_batch(&self, files: &[UploadedFile]) -> LoadReport {
        let mut report = LoadReport::default();

        for file in files {
            if file.kind().is_none() {
                warn!(file = %file.name, "skipping unsupported file type");
                report.skipped.push(SkippedFile {
                    name: file.name.clone(),
                    reason: "unsupported file type (expected .pdf or .docx)".to_string(),
                });
                continue;
            }

            match self.load_file(file) {
                Ok(document) => {
                    debug!(
                        file = %document.name,
                        pages = document.pages.len(),
                        chars = document.char_len(),
                        "extracted text"
                    );
                    report.documents.push(Arc::new(document));
                }
                Err(e) => {
                    warn!(file = %file.name, error = %e, "failed to load file");
                    report.failed.push(FailedFile {
                        name: file.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            loaded = report.documents.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "document batch loaded"
        );
        report
    }

    /// Extract the text of a single file
    pub fn load_file(&self, file: &UploadedFile) -> Result<Document> {
        let kind = file
            .kind()
            .ok_or_else(|| Error::load(&file.name, "unsupported file type"))?;

        let raw_pages = match kind {
            FileKind::Pdf => extract_pdf_pages(&file.bytes).map_err(|msg| Error::load(&file.name, msg))?,
            FileKind::Docx => vec![extract_docx_text(&file.bytes).map_err(|msg| Error::load(&file.name, msg))?],
        };

        let pages: Vec<String> = raw_pages
            .iter()
            .map(|page| self.normalize(page))
            .filter(|page| !page.is_empty())
            .collect();

        if pages.is_empty() {
            return Err(Error::load(&file.name, "no extractable text"));
        }

        Ok(Document::new(&file.name, kind, pages))
    }

    /// Unify line endings, strip trailing spaces and collapse blank-line runs
    pub fn normalize(&self, text: &str) -> String {
        let unified = text.replace("\r\n", "\n").replace('\r', "\n");
        let stripped = self.trailing_space.replace_all(&unified, "");
        let collapsed = self.blank_runs.replace_all(&stripped, "\n\n");
        collapsed.trim().to_string()
    }
}

fn extract_pdf_pages(bytes: &[u8]) -> std::result::Result<Vec<String>, String> {
    let pdf = lopdf::Document::load_mem(bytes).map_err(|e| format!("not a readable PDF: {}", e))?;
    if pdf.is_encrypted() {
        return Err("PDF is encrypted".to_string());
    }

    let pages = pdf.get_pages();
    if pages.is_empty() {
        return Err("PDF has no pages".to_string());
    }

    pages
        .keys()
        .map(|&number| {
            pdf.extract_text(&[number])
                .map_err(|e| format!("failed to extract text from page {}: {}", number, e))
        })
        .collect()
}

fn extract_docx_text(bytes: &[u8]) -> std::result::Result<String, String> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("not a readable DOCX archive: {}", e))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| "DOCX archive has no word/document.xml".to_string())?
        .read_to_string(&mut xml)
        .map_err(|e| format!("failed to read document body: {}", e))?;

    docx_body_text(&xml)
}

/// Flatten WordprocessingML into plain text, one line per non-empty paragraph
///
/// Paragraphs nested inside another (text boxes) are emitted as their own
/// line when they close; the enclosing paragraph keeps its text.
pub(crate) fn docx_body_text(xml: &str) -> std::result::Result<String, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut paragraphs: Vec<String> = Vec::new();
    let mut open: Vec<String> = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"p" => open.push(String::new()),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if let Some(current) = open.last_mut() {
                    match e.local_name().as_ref() {
                        b"tab" => current.push('\t'),
                        b"br" | b"cr" => current.push('\n'),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if let Some(current) = open.pop() {
                        let paragraph = current.trim_end();
                        if !paragraph.trim().is_empty() {
                            paragraphs.push(paragraph.to_string());
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e.unescape().map_err(|e| format!("invalid text in document body: {}", e))?;
                if let Some(current) = open.last_mut() {
                    current.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Storage &amp; handling</w:t></w:r></w:p>
    <w:p></w:p>
    <w:p><w:r><w:t xml:space="preserve">Keep potatoes </w:t></w:r><w:r><w:t>dark.</w:t></w:r></w:p>
    <w:p><w:r><w:t>Name</w:t><w:tab/><w:t>Value</w:t><w:br/><w:t>Next line</w:t></w:r></w:p>
    <w:p><w:r><w:instrText>PAGE</w:instrText></w:r></w:p>
  </w:body>
</w:document>"#;

    fn docx_bytes(body: &str) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file("word/document.xml", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_docx_paragraphs_tabs_and_breaks() {
        let text = docx_body_text(BODY).unwrap();
        assert_eq!(text, "Storage & handling\nKeep potatoes dark.\nName\tValue\nNext line");
    }

    #[test]
    fn test_docx_text_box_keeps_enclosing_paragraph() {
        let body = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t xml:space="preserve">Intro text </w:t></w:r><w:r><w:pict><w:txbxContent><w:p><w:r><w:t>Box</w:t></w:r></w:p></w:txbxContent></w:pict></w:r><w:r><w:t>tail</w:t></w:r></w:p>
</w:body></w:document>"#;

        let text = docx_body_text(body).unwrap();
        assert_eq!(text, "Box\nIntro text tail");
    }

    #[test]
    fn test_load_docx_file() {
        let loader = DocumentLoader::new().unwrap();
        let file = UploadedFile::new("guide.docx", docx_bytes(BODY));

        let doc = loader.load_file(&file).unwrap();
        assert_eq!(doc.kind, FileKind::Docx);
        assert_eq!(doc.pages.len(), 1);
        assert!(doc.text.starts_with("Storage & handling\nKeep potatoes dark."));
    }

    #[test]
    fn test_empty_docx_is_load_error() {
        let loader = DocumentLoader::new().unwrap();
        let body = r#"<w:document xmlns:w="x"><w:body><w:p/></w:body></w:document>"#;
        let file = UploadedFile::new("blank.docx", docx_bytes(body));

        let err = loader.load_file(&file).unwrap_err();
        assert_eq!(err.to_string(), "Failed to load blank.docx: no extractable text");
    }

    #[test]
    fn test_corrupt_files_are_load_errors() {
        let loader = DocumentLoader::new().unwrap();
        for name in ["broken.pdf", "broken.docx"] {
            let err = loader
                .load_file(&UploadedFile::new(name, b"definitely not a document".to_vec()))
                .unwrap_err();
            assert!(matches!(err, Error::Load { ref file, .. } if file == name));
        }
    }

    #[test]
    fn test_batch_reports_skipped_and_failed() {
        let loader = DocumentLoader::new().unwrap();
        let files = vec![
            UploadedFile::new("notes.txt", b"plain text".to_vec()),
            UploadedFile::new("broken.pdf", b"%PDF-garbage".to_vec()),
            UploadedFile::new("guide.docx", docx_bytes(BODY)),
        ];

        let report = loader.load_batch(&files);
        assert_eq!(report.document_names(), vec!["guide.docx".to_string()]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].name, "notes.txt");
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].name, "broken.pdf");
    }

    #[test]
    fn test_normalize() {
        let loader = DocumentLoader::new().unwrap();
        let text = "Title  \r\n\r\n\r\n\r\nBody\t\nend\n\n";
        assert_eq!(loader.normalize(text), "Title\n\nBody\nend");
    }
}
