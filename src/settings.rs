//! Startup settings: environment first, command-line flags on top

use std::time::Duration;

use docqa_core::{Mode, RagConfig, Result, env_lookup, parse_flag, parse_var};

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub mode: Mode,
    pub summarize: bool,
    pub rag: RagConfig,
}

/// Values given on the command line, `None` when the flag was absent
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mode: Option<Mode>,
    pub summarize: bool,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub top_k: Option<usize>,
    pub timeout_secs: Option<u64>,
}

impl Settings {
    pub fn from_env(overrides: &Overrides) -> Result<Self> {
        Self::from_lookup(env_lookup, overrides)
    }

    pub fn from_lookup<F>(lookup: F, overrides: &Overrides) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut rag = RagConfig::parse_lookup(&lookup)?;
        if let Some(size) = overrides.chunk_size {
            rag.chunk_size = size;
        }
        if let Some(overlap) = overrides.chunk_overlap {
            rag.chunk_overlap = overlap;
        }
        if let Some(k) = overrides.top_k {
            rag.top_k = k;
        }
        if let Some(secs) = overrides.timeout_secs {
            rag.generation_timeout = Duration::from_secs(secs);
        }
        rag.validate()?;

        let mode = match overrides.mode {
            Some(mode) => mode,
            None => parse_var(&lookup, "DOCQA_MODE", Mode::Hosted)?,
        };
        let summarize = overrides.summarize || parse_flag(&lookup, "DOCQA_SUMMARIZE", false)?;

        Ok(Self { mode, summarize, rag })
    }
}
