use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;
use std::io::IsTerminal;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use docqa_cli::{
    ReplCommand, display_banner, handle_input_with_history, print_answer, print_error,
    print_help, print_ingest_report, print_status, print_summary, read_uploads,
};
use docqa_core::Mode;
use docqa_rag::{Orchestrator, SessionEvent};

mod providers;
mod settings;

use providers::build_provider;
use settings::{Overrides, Settings};

const DOCQA_CRATES: [&str; 6] = [
    "docqa",
    "docqa_core",
    "docqa_openai",
    "docqa_local",
    "docqa_rag",
    "docqa_cli",
];

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "Ask questions about your PDF and DOCX files", long_about = None)]
struct Cli {
    /// PDF or DOCX files to load at startup
    files: Vec<PathBuf>,

    /// Backend family: hosted or local (default from DOCQA_MODE)
    #[arg(short, long)]
    mode: Option<Mode>,

    /// Ask one question, print the answer and exit
    #[arg(short, long)]
    question: Option<String>,

    /// Summarize the beginning of the documents after loading
    #[arg(short, long)]
    summarize: bool,

    #[arg(long)]
    chunk_size: Option<usize>,

    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Number of chunks retrieved per question
    #[arg(long)]
    top_k: Option<usize>,

    /// Ceiling on one generation call, in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Log more to stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            mode: self.mode,
            summarize: self.summarize,
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            top_k: self.top_k,
            timeout_secs: self.timeout_secs,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => None,
        1 => Some("info"),
        _ => Some("debug"),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut directives = vec!["warn".to_string()];
        if let Some(level) = level {
            directives.extend(DOCQA_CRATES.iter().map(|name| format!("{}={}", name, level)));
        }
        EnvFilter::new(directives.join(","))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Print embedding progress while an index is being built
fn watch_progress(session: &Orchestrator) {
    if !std::io::stderr().is_terminal() {
        return;
    }
    let mut events = session.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::EmbeddingProgress { embedded, total }) => {
                    eprint!("\r{}", format!("embedding {}/{} chunks", embedded, total).dimmed());
                    if embedded == total {
                        eprintln!();
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn load_files(session: &Orchestrator, paths: &[PathBuf]) {
    let (uploads, unreadable) = read_uploads(paths);
    for error in &unreadable {
        print_error(error);
    }
    if uploads.is_empty() {
        return;
    }

    match session.ingest(uploads).await {
        Ok(report) => print_ingest_report(&report),
        Err(e) => print_error(&e),
    }
}

async fn ask(session: &Orchestrator, question: &str) {
    match session.query(question).await {
        Ok(answer) => print_answer(&answer),
        Err(e) => print_error(&e),
    }
}

async fn summarize(session: &Orchestrator) {
    match session.summarize().await {
        Ok(summary) => print_summary(&summary),
        Err(e) => print_error(&e),
    }
}

async fn switch_mode(session: &Orchestrator, mode: Mode) {
    if session.mode() == mode {
        println!("Already using {}.", mode.display_name());
        return;
    }
    let provider = match build_provider(mode) {
        Ok(provider) => provider,
        Err(e) => {
            print_error(&e);
            return;
        }
    };
    match session.switch_provider(provider).await {
        Ok(()) => println!(
            "{} Switched to {} ({} chunk(s) indexed)",
            "🔁".green(),
            mode.display_name(),
            session.index_len()
        ),
        Err(e) => print_error(&e),
    }
}

async fn run_repl(session: &Orchestrator) -> Result<()> {
    display_banner(session.mode());

    let mut history = Vec::new();
    loop {
        let Some(line) = handle_input_with_history(&mut history)? else {
            break;
        };

        let command = match ReplCommand::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                print_error(&e);
                continue;
            }
        };

        match command {
            ReplCommand::Empty => continue,
            ReplCommand::Exit => break,
            ReplCommand::Help => print_help(),
            ReplCommand::Status => {
                let documents: Vec<String> =
                    session.documents().iter().map(|d| d.name.clone()).collect();
                print_status(session.state(), session.mode(), &documents, session.index_len());
            }
            ReplCommand::Load(paths) => load_files(session, &paths).await,
            ReplCommand::SwitchMode(mode) => switch_mode(session, mode).await,
            ReplCommand::Summary => summarize(session).await,
            ReplCommand::Ask(question) => ask(session, &question).await,
        }
    }

    println!("{}", "👋 Goodbye!".green());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::from_env(&cli.overrides()).map_err(|e| {
        print_error(&e);
        anyhow!("invalid configuration")
    })?;
    let provider = build_provider(settings.mode).map_err(|e| {
        print_error(&e);
        anyhow!("could not start in {} mode", settings.mode)
    })?;

    let session = Orchestrator::new(settings.rag, provider)?;
    watch_progress(&session);

    if !cli.files.is_empty() {
        load_files(&session, &cli.files).await;
        if settings.summarize {
            summarize(&session).await;
        }
    }

    if let Some(question) = cli.question {
        ask(&session, &question).await;
        return Ok(());
    }

    run_repl(&session).await
}
