//! Common types used across the DocQA system

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::Error;

/// Which backend family serves embedding and generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Hosted API (embeddings and chat completions over HTTPS)
    Hosted,
    /// On-device embedding model plus a locally running model server
    Local,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Hosted => "hosted",
            Mode::Local => "local",
        }
    }

    /// Get the display name for this mode
    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Hosted => "Hosted API",
            Mode::Local => "Local models",
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hosted" | "online" | "openai" => Ok(Mode::Hosted),
            "local" | "offline" => Ok(Mode::Local),
            other => Err(Error::Configuration(format!(
                "unknown mode '{}', expected 'hosted' or 'local'",
                other
            ))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Docx,
}

impl FileKind {
    /// Detect the kind from a file name extension, case-insensitively
    pub fn from_filename(name: &str) -> Option<FileKind> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "docx" => Some(FileKind::Docx),
            _ => None,
        }
    }
}

/// A file as handed over by the presentation layer
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn kind(&self) -> Option<FileKind> {
        FileKind::from_filename(&self.name)
    }
}

/// An uploaded file together with its extracted text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub name: String,
    pub kind: FileKind,
    /// Extracted text per page (PDF) or a single section (DOCX)
    pub pages: Vec<String>,
    /// All pages joined with newlines
    pub text: String,
}

impl Document {
    pub fn new(name: impl Into<String>, kind: FileKind, pages: Vec<String>) -> Self {
        let text = pages.join("\n");
        Self {
            name: name.into(),
            kind,
            pages,
            text,
        }
    }

    /// Length of the full text in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A contiguous slice of a document's text
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub document: Arc<Document>,
    /// Position of this chunk within its document
    pub ordinal: usize,
    /// Character offset of the first character in the document text
    pub start: usize,
    pub text: String,
}

impl Chunk {
    pub fn source(&self) -> &str {
        &self.document.name
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A chunk returned from the index with its cosine distance to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Source reference attached to an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub rank: usize,
    pub document: String,
    pub chunk: usize,
    pub distance: f32,
    pub excerpt: String,
}

impl Citation {
    const EXCERPT_CHARS: usize = 160;

    pub fn from_scored(rank: usize, scored: &ScoredChunk) -> Self {
        let flat = scored.chunk.text.split_whitespace().collect::<Vec<_>>().join(" ");
        let excerpt = if flat.chars().count() > Self::EXCERPT_CHARS {
            let cut: String = flat.chars().take(Self::EXCERPT_CHARS).collect();
            format!("{}...", cut.trim_end())
        } else {
            flat
        };

        Self {
            rank,
            document: scored.chunk.source().to_string(),
            chunk: scored.chunk.ordinal,
            distance: scored.distance,
            excerpt,
        }
    }
}

/// A generated answer and the context it was conditioned on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub text: String,
    pub model_id: String,
    pub citations: Vec<Citation>,
    /// Whether retrieved context was cut to fit the prompt budget
    pub context_truncated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("hosted".parse::<Mode>().unwrap(), Mode::Hosted);
        assert_eq!("LOCAL".parse::<Mode>().unwrap(), Mode::Local);
        assert_eq!("offline".parse::<Mode>().unwrap(), Mode::Local);
        assert_eq!("openai".parse::<Mode>().unwrap(), Mode::Hosted);
        assert!("cloud".parse::<Mode>().is_err());
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Hosted.to_string(), "hosted");
        assert_eq!(Mode::Local.display_name(), "Local models");
    }

    #[test]
    fn test_file_kind_detection() {
        assert_eq!(FileKind::from_filename("report.pdf"), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_filename("Notes.DOCX"), Some(FileKind::Docx));
        assert_eq!(FileKind::from_filename("slides.pptx"), None);
        assert_eq!(FileKind::from_filename("README"), None);
    }

    #[test]
    fn test_document_joins_pages() {
        let doc = Document::new(
            "a.pdf",
            FileKind::Pdf,
            vec!["page one".to_string(), "page two".to_string()],
        );
        assert_eq!(doc.text, "page one\npage two");
        assert_eq!(doc.char_len(), 17);
    }

    #[test]
    fn test_citation_excerpt_is_shortened() {
        let doc = Arc::new(Document::new("long.docx", FileKind::Docx, vec!["x".repeat(400)]));
        let scored = ScoredChunk {
            chunk: Chunk {
                document: doc,
                ordinal: 2,
                start: 0,
                text: "word ".repeat(100),
            },
            distance: 0.25,
        };

        let citation = Citation::from_scored(1, &scored);
        assert_eq!(citation.document, "long.docx");
        assert_eq!(citation.chunk, 2);
        assert!(citation.excerpt.ends_with("..."));
        assert!(citation.excerpt.chars().count() <= 163);
    }
}
