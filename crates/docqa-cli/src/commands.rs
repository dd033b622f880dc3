//! REPL command parsing

use std::path::PathBuf;

use docqa_core::{Error, Mode, Result};

/// One line of REPL input
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    /// Plain text is a question about the loaded documents
    Ask(String),
    Load(Vec<PathBuf>),
    SwitchMode(Mode),
    Summary,
    Status,
    Help,
    Exit,
    Empty,
}

impl ReplCommand {
    /// Parse a line; commands start with `:`, anything else is a question
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(ReplCommand::Empty);
        }

        match line.to_lowercase().as_str() {
            "help" | "?" => return Ok(ReplCommand::Help),
            "exit" | "quit" => return Ok(ReplCommand::Exit),
            _ => {}
        }

        let Some(command) = line.strip_prefix(':') else {
            return Ok(ReplCommand::Ask(line.to_string()));
        };

        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default().to_lowercase();
        let args: Vec<&str> = parts.collect();

        match name.as_str() {
            "load" | "l" => {
                if args.is_empty() {
                    return Err(Error::InvalidInput("usage: :load <file> [file ...]".to_string()));
                }
                Ok(ReplCommand::Load(args.into_iter().map(PathBuf::from).collect()))
            }
            "mode" | "m" => match args.as_slice() {
                [mode] => Ok(ReplCommand::SwitchMode(mode.parse()?)),
                _ => Err(Error::InvalidInput("usage: :mode hosted|local".to_string())),
            },
            "summary" | "summarize" | "s" => Ok(ReplCommand::Summary),
            "status" => Ok(ReplCommand::Status),
            "help" | "h" => Ok(ReplCommand::Help),
            "exit" | "quit" | "q" => Ok(ReplCommand::Exit),
            other => Err(Error::InvalidInput(format!(
                "unknown command ':{}', type 'help' for a list",
                other
            ))),
        }
    }
}
