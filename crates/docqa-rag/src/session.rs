//! Session orchestrator: documents, index and the active model provider

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, MutexGuard, broadcast};
use tracing::{debug, error, info, warn};

use docqa_core::{
    Answer, Chunk, Citation, Document, Embedder, Error, Generator, Mode, RagConfig, Result,
    UploadedFile, check_embeddings,
};

use crate::chunker::Chunker;
use crate::generation::generate_within;
use crate::index::VectorIndex;
use crate::loader::{DocumentLoader, FailedFile, LoadReport, SkippedFile};
use crate::prompt::assemble;
use crate::summarizer::{Summary, summarize_chunks};

/// The embedder and generator serving one mode
#[derive(Clone)]
pub struct ModelProvider {
    pub mode: Mode,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
}

impl ModelProvider {
    pub fn new(mode: Mode, embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> Self {
        Self {
            mode,
            embedder,
            generator,
        }
    }
}

impl fmt::Debug for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelProvider")
            .field("mode", &self.mode)
            .field("embedder", &self.embedder.model_id())
            .field("generator", &self.generator.model_id())
            .finish()
    }
}

/// Lifecycle of a question-answering session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    DocumentsLoaded,
    Indexed,
    Answering,
    AnswerReady,
    /// Transient; reported, then rolled back to the recovery state
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::DocumentsLoaded => "documents loaded",
            SessionState::Indexed => "indexed",
            SessionState::Answering => "answering",
            SessionState::AnswerReady => "answer ready",
            SessionState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    StateChanged { from: SessionState, to: SessionState },
    FileSkipped { file: String, reason: String },
    FileFailed { file: String, error: String },
    EmbeddingProgress { embedded: usize, total: usize },
    ProviderSwitched { mode: Mode },
    OperationFailed { operation: String, error: String },
}

/// Outcome of [`Orchestrator::ingest`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub documents: Vec<String>,
    pub chunks: usize,
    pub skipped: Vec<SkippedFile>,
    pub failed: Vec<FailedFile>,
}

struct Status {
    state: SessionState,
    documents: Vec<Arc<Document>>,
    provider: ModelProvider,
    last_answer: Option<Answer>,
}

/// Drives loading, indexing and answering for one user session
///
/// Operations are not reentrant: while one runs, any other mutating call
/// fails fast with [`Error::Busy`]. Accessors never block on a running
/// operation.
pub struct Orchestrator {
    config: RagConfig,
    chunker: Chunker,
    loader: Arc<DocumentLoader>,
    index: VectorIndex,
    status: RwLock<Status>,
    op_lock: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

const EVENT_CAPACITY: usize = 64;

impl Orchestrator {
    pub fn new(config: RagConfig, provider: ModelProvider) -> Result<Self> {
        config.validate()?;
        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        info!(mode = %provider.mode, "session created");
        Ok(Self {
            config,
            chunker,
            loader: Arc::new(DocumentLoader::new()?),
            index: VectorIndex::new(),
            status: RwLock::new(Status {
                state: SessionState::Idle,
                documents: Vec::new(),
                provider,
                last_answer: None,
            }),
            op_lock: Mutex::new(()),
            events,
        })
    }

    /// Receive session notifications from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.read_status(|s| s.state)
    }

    pub fn documents(&self) -> Vec<Arc<Document>> {
        self.read_status(|s| s.documents.clone())
    }

    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    /// Vector size of the current index, if one is built
    pub fn index_dimensions(&self) -> Option<usize> {
        self.index.dimensions()
    }

    pub fn mode(&self) -> Mode {
        self.read_status(|s| s.provider.mode)
    }

    pub fn provider(&self) -> ModelProvider {
        self.read_status(|s| s.provider.clone())
    }

    pub fn last_answer(&self) -> Option<Answer> {
        self.read_status(|s| s.last_answer.clone())
    }

    /// Load a batch of files, replacing the session documents if any loaded
    pub async fn load(&self, files: Vec<UploadedFile>) -> Result<LoadReport> {
        let _guard = self.begin("load")?;
        self.load_locked(files).await
    }

    /// Chunk, embed and index the loaded documents
    pub async fn build_index(&self) -> Result<usize> {
        let _guard = self.begin("build_index")?;
        self.build_index_locked().await
    }

    /// Load files and index them in one step
    pub async fn ingest(&self, files: Vec<UploadedFile>) -> Result<IngestReport> {
        let _guard = self.begin("ingest")?;
        let report = self.load_locked(files).await?;

        let chunks = if report.documents.is_empty() {
            0
        } else {
            self.build_index_locked().await?
        };

        Ok(IngestReport {
            documents: report.document_names(),
            chunks,
            skipped: report.skipped,
            failed: report.failed,
        })
    }

    /// Answer a question from the indexed documents
    pub async fn query(&self, question: &str) -> Result<Answer> {
        let _guard = self.begin("query")?;

        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question must not be empty".to_string()));
        }
        let state = self.state();
        if !matches!(state, SessionState::Indexed | SessionState::AnswerReady) {
            return Err(Error::InvalidState(format!(
                "cannot answer questions while {}; load documents first",
                state
            )));
        }

        self.transition(SessionState::Answering);
        let mut rollback = AnswerRollback::new(self);
        match self.answer(question).await {
            Ok(answer) => {
                rollback.disarm();
                self.write_status(|s| s.last_answer = Some(answer.clone()));
                self.transition(SessionState::AnswerReady);
                Ok(answer)
            }
            Err(e) => {
                rollback.disarm();
                self.fail("query", &e, SessionState::Indexed);
                Err(e)
            }
        }
    }

    /// Install a different provider and re-embed the loaded documents with it
    pub async fn switch_provider(&self, provider: ModelProvider) -> Result<()> {
        let _guard = self.begin("switch_provider")?;

        let mode = provider.mode;
        let has_documents = self.write_status(|s| {
            s.provider = provider;
            s.last_answer = None;
            !s.documents.is_empty()
        });
        self.index.clear();
        self.emit(SessionEvent::ProviderSwitched { mode });
        info!(%mode, "model provider switched");

        if has_documents {
            self.transition(SessionState::DocumentsLoaded);
            self.build_index_locked().await?;
        }
        Ok(())
    }

    /// Summarize the first chunks of the loaded documents
    pub async fn summarize(&self) -> Result<Summary> {
        let _guard = self.begin("summarize")?;

        let documents = self.documents();
        if documents.is_empty() {
            return Err(Error::InvalidState("no documents loaded".to_string()));
        }

        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|doc| self.chunker.chunks(doc))
            .take(self.config.summary_chunks)
            .collect();
        let generator = self.provider().generator;

        summarize_chunks(&chunks, generator.as_ref(), self.config.generation_timeout, &self.config.retry)
            .await
            .inspect_err(|e| {
                error!(error = %e, "summary failed");
                self.emit(SessionEvent::OperationFailed {
                    operation: "summarize".to_string(),
                    error: e.to_string(),
                });
            })
    }

    async fn load_locked(&self, files: Vec<UploadedFile>) -> Result<LoadReport> {
        let loader = self.loader.clone();
        let report = tokio::task::spawn_blocking(move || loader.load_batch(&files)).await?;

        for skipped in &report.skipped {
            self.emit(SessionEvent::FileSkipped {
                file: skipped.name.clone(),
                reason: skipped.reason.clone(),
            });
        }
        for failed in &report.failed {
            self.emit(SessionEvent::FileFailed {
                file: failed.name.clone(),
                error: failed.error.clone(),
            });
        }

        if report.documents.is_empty() {
            warn!("no documents could be loaded; keeping the current session");
            return Ok(report);
        }

        let documents = report.documents.clone();
        self.write_status(|s| {
            s.documents = documents;
            s.last_answer = None;
        });
        self.index.clear();
        self.transition(SessionState::DocumentsLoaded);
        Ok(report)
    }

    async fn build_index_locked(&self) -> Result<usize> {
        let documents = self.documents();
        if documents.is_empty() {
            return Err(Error::InvalidState("no documents loaded".to_string()));
        }

        match self.embed_and_index(&documents).await {
            Ok(count) => {
                self.transition(SessionState::Indexed);
                Ok(count)
            }
            Err(e) => {
                self.index.clear();
                self.fail("build_index", &e, SessionState::DocumentsLoaded);
                Err(e)
            }
        }
    }

    async fn embed_and_index(&self, documents: &[Arc<Document>]) -> Result<usize> {
        let embedder = self.provider().embedder;
        let chunks = self.chunker.chunk_all(documents);
        if chunks.is_empty() {
            return Err(Error::InvalidState("loaded documents produced no chunks".to_string()));
        }

        let total = chunks.len();
        let mut vectors = Vec::with_capacity(total);
        for batch in chunks.chunks(self.config.embed_batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = self
                .config
                .retry
                .run("embed", || embedder.embed_batch(&texts))
                .await?;
            check_embeddings(&embedded, texts.len(), embedder.dimensions())?;
            vectors.extend(embedded);

            debug!(embedded = vectors.len(), total, "embedding progress");
            self.emit(SessionEvent::EmbeddingProgress {
                embedded: vectors.len(),
                total,
            });
        }

        self.index.build(chunks, vectors)?;
        info!(
            chunks = total,
            model = %embedder.model_id(),
            dimensions = embedder.dimensions(),
            "documents indexed"
        );
        Ok(total)
    }

    async fn answer(&self, question: &str) -> Result<Answer> {
        let provider = self.provider();

        let query_vector = self
            .config
            .retry
            .run("embed", || provider.embedder.embed_one(question))
            .await?;
        let ranked = self.index.query(&query_vector, self.config.top_k)?;
        let prompt = assemble(question, &ranked, provider.generator.prompt_budget());
        if prompt.truncated {
            debug!(
                retrieved = ranked.len(),
                used = prompt.chunks_used,
                "context cut to fit the prompt budget"
            );
        }

        let result = generate_within(
            provider.generator.as_ref(),
            &prompt.text,
            self.config.generation_timeout,
            &self.config.retry,
        )
        .await?;

        let citations = ranked
            .iter()
            .take(prompt.chunks_used)
            .enumerate()
            .map(|(i, scored)| Citation::from_scored(i + 1, scored))
            .collect();

        Ok(Answer {
            question: question.to_string(),
            text: result.text,
            model_id: result.model_id,
            citations,
            context_truncated: prompt.truncated,
        })
    }

    fn begin(&self, operation: &str) -> Result<MutexGuard<'_, ()>> {
        self.op_lock.try_lock().map_err(|_| {
            debug!(operation, "rejected while another operation is running");
            Error::Busy(format!(
                "cannot {} while another operation is in progress",
                operation.replace('_', " ")
            ))
        })
    }

    fn read_status<T>(&self, f: impl FnOnce(&Status) -> T) -> T {
        match self.status.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn write_status<T>(&self, f: impl FnOnce(&mut Status) -> T) -> T {
        match self.status.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn transition(&self, to: SessionState) {
        let from = self.write_status(|s| std::mem::replace(&mut s.state, to));
        if from != to {
            info!(%from, %to, "session state changed");
            self.emit(SessionEvent::StateChanged { from, to });
        }
    }

    /// Report a failure through the error state, then roll back
    fn fail(&self, operation: &str, e: &Error, recovery: SessionState) {
        error!(operation, error = %e, "operation failed");
        self.transition(SessionState::Error);
        self.emit(SessionEvent::OperationFailed {
            operation: operation.to_string(),
            error: e.to_string(),
        });
        self.transition(recovery);
    }
}

/// Returns the session to `Indexed` if a query future is dropped mid-answer
struct AnswerRollback<'a> {
    session: &'a Orchestrator,
    armed: bool,
}

impl<'a> AnswerRollback<'a> {
    fn new(session: &'a Orchestrator) -> Self {
        Self { session, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AnswerRollback<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("query cancelled before an answer was produced");
            self.session.transition(SessionState::Indexed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docqa_core::GenerationResult;
    use docqa_local::HashingEmbedder;

    struct Echo;

    #[async_trait]
    impl Generator for Echo {
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

    fn orchestrator() -> Orchestrator {
        let provider = ModelProvider::new(Mode::Local, Arc::new(HashingEmbedder::new(64)), Arc::new(Echo));
        Orchestrator::new(RagConfig::default(), provider).unwrap()
    }

    #[tokio::test]
    async fn test_starts_idle() {
        let session = orchestrator();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.index_len(), 0);
        assert_eq!(session.mode(), Mode::Local);
        assert!(session.documents().is_empty());
    }

    #[tokio::test]
    async fn test_query_requires_index() {
        let session = orchestrator();
        let err = session.query("what is this?").await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected() {
        let session = orchestrator();
        let err = session.query("   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_build_index_without_documents() {
        let session = orchestrator();
        assert!(matches!(session.build_index().await, Err(Error::InvalidState(_))));
        assert!(matches!(session.summarize().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_unsupported_files_leave_session_untouched() {
        let session = orchestrator();
        let mut events = session.subscribe();

        let report = session
            .ingest(vec![UploadedFile::new("slides.pptx", vec![1, 2, 3])])
            .await
            .unwrap();

        assert!(report.documents.is_empty());
        assert_eq!(report.chunks, 0);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(matches!(
            events.try_recv().unwrap(),
            SessionEvent::FileSkipped { ref file, .. } if file == "slides.pptx"
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let provider = ModelProvider::new(Mode::Local, Arc::new(HashingEmbedder::new(8)), Arc::new(Echo));
        let config = RagConfig {
            chunk_size: 10,
            chunk_overlap: 10,
            ..RagConfig::default()
        };
        assert!(matches!(
            Orchestrator::new(config, provider),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_event_serialization() {
        let event = SessionEvent::StateChanged {
            from: SessionState::DocumentsLoaded,
            to: SessionState::Indexed,
        };
        insta::assert_json_snapshot!(event, @r#"
        {
          "event": "state_changed",
          "from": "DocumentsLoaded",
          "to": "Indexed"
        }
        "#);
    }
}
