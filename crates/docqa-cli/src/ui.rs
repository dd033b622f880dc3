//! UI utilities for the CLI

use colored::*;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, size},
};
use std::fmt::Write as _;
use std::io::{self, IsTerminal, Write};

use docqa_core::{Answer, Error, Mode, Result};
use docqa_rag::{IngestReport, SessionState, Summary};

const PROMPT: &str = "docqa>";

/// Display startup banner
pub fn display_banner(mode: Mode) {
    let terminal_width = size().map(|(w, _)| w as usize).unwrap_or(80);
    let banner_width = std::cmp::min(60, terminal_width.saturating_sub(4)).max(40);

    let top_border = format!("┌{}┐", "─".repeat(banner_width - 2));
    let bottom_border = format!("└{}┘", "─".repeat(banner_width - 2));
    let empty_line = format!("│{}│", " ".repeat(banner_width - 2));

    println!();
    println!("{}", top_border.blue());
    println!("{}", empty_line.blue());

    let title = "DocQA - ask your documents";
    println!(
        "{}{}{}{}",
        "│  ".blue(),
        title.blue().bold(),
        " ".repeat(banner_width - title.chars().count() - 4),
        " │".blue()
    );
    println!("{}", empty_line.blue());

    let mode_line = format!("Mode: {}", mode.display_name());
    let lines = [
        "PDF and DOCX files, answered with cited sources",
        "",
        mode_line.as_str(),
    ];
    for line in lines {
        let padding = banner_width.saturating_sub(line.chars().count() + 4);
        println!("{}", format!("│  {}{}│", line, " ".repeat(padding)).blue());
    }

    println!("{}", empty_line.blue());
    println!("{}", bottom_border.blue());
    println!();
    println!(
        "{}",
        "💡 Tip: load files with ':load <files>', then type a question, or 'help' for commands".dimmed()
    );
    println!();
}

/// Read one line with ↑/↓ history navigation
pub fn handle_input_with_history(history: &mut Vec<String>) -> Result<Option<String>> {
    // Piped input: plain line reads, None at end of input
    if !io::stdin().is_terminal() {
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        let input = input.trim().to_string();
        if !input.is_empty() {
            history.push(input.clone());
        }
        return Ok(Some(input));
    }

    enable_raw_mode()?;
    let result = read_line_raw(history);
    disable_raw_mode()?;
    println!();
    result
}

fn redraw(input: &str) -> Result<()> {
    print!("\r{} {}\x1b[K", PROMPT.green().bold(), input);
    io::stdout().flush()?;
    Ok(())
}

fn read_line_raw(history: &mut Vec<String>) -> Result<Option<String>> {
    let mut input = String::new();
    let mut history_index: Option<usize> = None;

    redraw(&input)?;
    loop {
        let Event::Key(key_event) = event::read()? else {
            continue;
        };
        match key_event.code {
            KeyCode::Enter => {
                let line = input.trim().to_string();
                if !line.is_empty() {
                    history.push(line.clone());
                }
                return Ok(Some(line));
            }
            KeyCode::Char('c') | KeyCode::Char('d')
                if key_event.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                return Ok(None);
            }
            KeyCode::Char(c) => {
                input.push(c);
                redraw(&input)?;
            }
            KeyCode::Backspace => {
                input.pop();
                redraw(&input)?;
            }
            KeyCode::Up if !history.is_empty() => {
                let new_index = match history_index {
                    None => history.len() - 1,
                    Some(idx) => idx.saturating_sub(1),
                };
                history_index = Some(new_index);
                input = history[new_index].clone();
                redraw(&input)?;
            }
            KeyCode::Down => {
                if let Some(idx) = history_index {
                    if idx + 1 < history.len() {
                        history_index = Some(idx + 1);
                        input = history[idx + 1].clone();
                    } else {
                        history_index = None;
                        input.clear();
                    }
                    redraw(&input)?;
                }
            }
            KeyCode::Esc => {
                input.clear();
                history_index = None;
                redraw(&input)?;
            }
            _ => {}
        }
    }
}

/// Display help message
pub fn print_help() {
    println!("{}", "Available commands:".bold());
    println!("  {} - Ask a question about the loaded documents", "<question>".green());
    println!("  {} - Load and index PDF or DOCX files", ":load <files>".green());
    println!("  {} - Switch between hosted and local models", ":mode hosted|local".green());
    println!("  {} - Summarize the beginning of the documents", ":summary".green());
    println!("  {} - Show session status", ":status".green());
    println!("  {} - Show this help message", "help".green());
    println!("  {} - Exit the application", "exit/quit".green());
    println!();
    println!("{}", "Examples:".bold());
    println!("  :load handbook.pdf notes.docx");
    println!("  What is the refund policy?");
    println!("  :mode local");
}

/// Plain-text rendering of an answer and its sources
pub fn render_answer(answer: &Answer) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", answer.text.trim());

    if !answer.citations.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Sources:");
        for citation in &answer.citations {
            let _ = writeln!(
                out,
                "  [{}] {} (chunk {}, distance {:.3})",
                citation.rank, citation.document, citation.chunk, citation.distance
            );
            let _ = writeln!(out, "      {}", citation.excerpt);
        }
    }
    if answer.context_truncated {
        let _ = writeln!(out, "(context was shortened to fit the model)");
    }
    out
}

pub fn print_answer(answer: &Answer) {
    println!("{} {}", "💬".cyan(), format!("Answer ({})", answer.model_id).bold());
    print!("{}", render_answer(answer));
    println!();
}

/// Plain-text rendering of an ingestion outcome
pub fn render_ingest_report(report: &IngestReport) -> String {
    let mut out = String::new();
    if report.documents.is_empty() {
        let _ = writeln!(out, "No documents loaded.");
    } else {
        let _ = writeln!(
            out,
            "Indexed {} document(s) into {} chunk(s): {}",
            report.documents.len(),
            report.chunks,
            report.documents.join(", ")
        );
    }
    for skipped in &report.skipped {
        let _ = writeln!(out, "Skipped {}: {}", skipped.name, skipped.reason);
    }
    for failed in &report.failed {
        let _ = writeln!(out, "Failed {}: {}", failed.name, failed.error);
    }
    out
}

pub fn print_ingest_report(report: &IngestReport) {
    let icon = if report.documents.is_empty() {
        "⚠️".yellow()
    } else {
        "📚".green()
    };
    for (i, line) in render_ingest_report(report).lines().enumerate() {
        if i == 0 {
            println!("{} {}", icon, line);
        } else {
            println!("   {}", line.yellow());
        }
    }
}

pub fn print_summary(summary: &Summary) {
    println!(
        "{} {}",
        "📝".cyan(),
        format!("Summary of the first {} chunk(s)", summary.chunks_summarized).bold()
    );
    println!("{}", summary.text);
    println!();
}

pub fn print_status(state: SessionState, mode: Mode, documents: &[String], chunks: usize) {
    println!("{} {}", "Mode:".bold(), mode.display_name());
    println!("{} {}", "State:".bold(), state);
    if documents.is_empty() {
        println!("{} none", "Documents:".bold());
    } else {
        println!("{} {}", "Documents:".bold(), documents.join(", "));
    }
    println!("{} {}", "Chunks indexed:".bold(), chunks);
}

/// Plain-text rendering of an error with its remediation hint
pub fn render_error(error: &Error) -> String {
    match error.hint() {
        Some(hint) => format!("{}\n  hint: {}", error, hint),
        None => error.to_string(),
    }
}

pub fn print_error(error: &Error) {
    let rendered = render_error(error);
    let mut lines = rendered.lines();
    if let Some(first) = lines.next() {
        eprintln!("{} {}", "❌".red(), first.red());
    }
    for line in lines {
        eprintln!("{}", line.dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::Citation;
    use docqa_rag::{FailedFile, SkippedFile};

    #[test]
    fn test_render_answer() {
        let answer = Answer {
            question: "How long do potatoes keep?".to_string(),
            text: "Several months in a cool, dark cellar.\n".to_string(),
            model_id: "gpt-3.5-turbo".to_string(),
            citations: vec![Citation {
                rank: 1,
                document: "manual.pdf".to_string(),
                chunk: 3,
                distance: 0.1234,
                excerpt: "Potatoes keep for months in a cool dark cellar.".to_string(),
            }],
            context_truncated: true,
        };

        insta::assert_snapshot!(render_answer(&answer), @r"
        Several months in a cool, dark cellar.

        Sources:
          [1] manual.pdf (chunk 3, distance 0.123)
              Potatoes keep for months in a cool dark cellar.
        (context was shortened to fit the model)
        ");
    }

    #[test]
    fn test_render_ingest_report() {
        let report = IngestReport {
            documents: vec!["manual.pdf".to_string(), "notes.docx".to_string()],
            chunks: 7,
            skipped: vec![SkippedFile {
                name: "slides.pptx".to_string(),
                reason: "unsupported file type (expected .pdf or .docx)".to_string(),
            }],
            failed: vec![FailedFile {
                name: "scan.pdf".to_string(),
                error: "Failed to load scan.pdf: no extractable text".to_string(),
            }],
        };

        insta::assert_snapshot!(render_ingest_report(&report), @r"
        Indexed 2 document(s) into 7 chunk(s): manual.pdf, notes.docx
        Skipped slides.pptx: unsupported file type (expected .pdf or .docx)
        Failed scan.pdf: Failed to load scan.pdf: no extractable text
        ");
    }

    #[test]
    fn test_render_error_with_hint() {
        let err = Error::Authentication("OpenAI API returned 401 Unauthorized".to_string());
        assert_eq!(
            render_error(&err),
            "Authentication error: OpenAI API returned 401 Unauthorized\n  hint: Check OPENAI_API_KEY or switch to local mode with `:mode local`."
        );
        assert_eq!(
            render_error(&Error::Provider("boom".to_string())),
            "Provider error: boom"
        );
    }
}
