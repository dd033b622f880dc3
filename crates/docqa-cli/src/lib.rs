//! CLI interface for DocQA

mod commands;
mod files;
mod ui;

pub use commands::ReplCommand;
pub use files::{read_upload, read_uploads};
pub use ui::{
    display_banner, handle_input_with_history, print_answer, print_error, print_help,
    print_ingest_report, print_status, print_summary, render_answer, render_error,
    render_ingest_report,
};

// Re-export core types
pub use docqa_core::{Error, Result};
