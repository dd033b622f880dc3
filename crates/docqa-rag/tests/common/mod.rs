//! Shared fixtures for the pipeline integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Object, Stream, dictionary};
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use zip::write::SimpleFileOptions;

use docqa_local::HashingEmbedder;
use docqa_rag::{
    Embedder, Error, GenerationResult, Generator, Mode, ModelProvider, RagConfig, Result,
    UploadedFile,
};

/// Build a PDF with one page per entry in `pages`
pub fn pdf_bytes(pages: &[&str]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 10.into()]),
                Operation::new("Td", vec![40.into(), 800.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Build a minimal DOCX whose body has one paragraph per entry
pub fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

fn repeat_sentence(sentence: &str, min_chars: usize) -> String {
    let mut text = String::new();
    while text.len() < min_chars {
        text.push_str(sentence);
        text.push(' ');
    }
    text.trim_end().to_string()
}

/// A three-page homestead manual, each page about one topic
pub fn homestead_manual() -> UploadedFile {
    let bees = repeat_sentence("Bees build their hive from wax and store honey for winter.", 1200);
    let potatoes = repeat_sentence("Potatoes keep for months in a cool dark cellar.", 1200);
    let goats = repeat_sentence("Goats give milk that can be turned into cheese.", 1200);
    UploadedFile::new("manual.pdf", pdf_bytes(&[&bees, &potatoes, &goats]))
}

pub fn notes_docx() -> UploadedFile {
    UploadedFile::new(
        "notes.docx",
        docx_bytes(&[
            "Chickens need a dry coop and fresh water every day.",
            "Collect eggs each morning.",
        ]),
    )
}

/// Replies with the prompt it was given, so answers contain the context
pub struct EchoGenerator;

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, prompt: &str) -> Result<GenerationResult> {
        Ok(GenerationResult {
            text: prompt.to_string(),
            model_id: "echo".to_string(),
        })
    }

    fn model_id(&self) -> &str {
        "echo"
    }

    fn context_window(&self) -> usize {
        4096
    }

    fn max_new_tokens(&self) -> usize {
        256
    }
}

/// Fails every call the way a hosted API rejects a bad key
pub struct RejectingGenerator;

#[async_trait]
impl Generator for RejectingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<GenerationResult> {
        Err(Error::Authentication(
            "OpenAI API returned 401 Unauthorized: Incorrect API key provided".to_string(),
        ))
    }

    fn model_id(&self) -> &str {
        "gpt-3.5-turbo"
    }

    fn context_window(&self) -> usize {
        4096
    }

    fn max_new_tokens(&self) -> usize {
        256
    }
}

/// Embedder that rejects its credentials
pub struct RejectingEmbedder;

#[async_trait]
impl Embedder for RejectingEmbedder {
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::Authentication(
            "OpenAI API returned 401 Unauthorized: Incorrect API key provided".to_string(),
        ))
    }

    fn dimensions(&self) -> usize {
        1536
    }

    fn model_id(&self) -> &str {
        "text-embedding-3-small"
    }
}

/// Sleeps far longer than any sensible timeout
pub struct StalledGenerator;

#[async_trait]
impl Generator for StalledGenerator {
    async fn generate(&self, _prompt: &str) -> Result<GenerationResult> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(GenerationResult {
            text: "too late".to_string(),
            model_id: "stalled".to_string(),
        })
    }

    fn model_id(&self) -> &str {
        "stalled"
    }

    fn context_window(&self) -> usize {
        2048
    }

    fn max_new_tokens(&self) -> usize {
        256
    }
}

/// Waits until released, then answers
pub struct GatedGenerator {
    pub release: Arc<Notify>,
}

#[async_trait]
impl Generator for GatedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<GenerationResult> {
        self.release.notified().await;
        Ok(GenerationResult {
            text: "released".to_string(),
            model_id: "gated".to_string(),
        })
    }

    fn model_id(&self) -> &str {
        "gated"
    }

    fn context_window(&self) -> usize {
        2048
    }

    fn max_new_tokens(&self) -> usize {
        256
    }
}

pub fn provider(mode: Mode, dimensions: usize, generator: Arc<dyn Generator>) -> ModelProvider {
    ModelProvider::new(mode, Arc::new(HashingEmbedder::new(dimensions)), generator)
}

pub fn echo_provider(mode: Mode, dimensions: usize) -> ModelProvider {
    provider(mode, dimensions, Arc::new(EchoGenerator))
}

pub fn config() -> RagConfig {
    RagConfig {
        chunk_size: 1000,
        chunk_overlap: 100,
        top_k: 4,
        ..RagConfig::default()
    }
}
