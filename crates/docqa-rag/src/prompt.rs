//! Prompt assembly under a character budget

use docqa_core::ScoredChunk;

const PREAMBLE: &str = "Answer the question based on the context:\n\nContext:\n";
const SEPARATOR: &str = "\n\n";

/// A prompt ready for the generator, plus what made it in
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub text: String,
    /// Number of ranked chunks (from the top) included, fully or partially
    pub chunks_used: usize,
    /// Whether any retrieved context was dropped or cut
    pub truncated: bool,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn chunk_header(rank: usize, source: &str) -> String {
    format!("[{}] {}\n", rank, source)
}

fn question_block(question: &str) -> String {
    format!("{}Question: {}\n\nAnswer:", SEPARATOR, question)
}

/// Build the answer prompt from ranked chunks within `budget` characters
///
/// Lower-ranked chunks are dropped first. Only when not even the top chunk
/// fits is it cut to the space left. The question is always kept whole.
pub fn assemble(question: &str, ranked: &[ScoredChunk], budget: usize) -> AssembledPrompt {
    let tail = question_block(question);
    let mut remaining = budget.saturating_sub(char_len(PREAMBLE) + char_len(&tail));

    let mut blocks: Vec<String> = Vec::new();
    for (i, scored) in ranked.iter().enumerate() {
        let block = format!("{}{}", chunk_header(i + 1, scored.chunk.source()), scored.chunk.text);
        let cost = char_len(&block) + if blocks.is_empty() { 0 } else { char_len(SEPARATOR) };
        if cost > remaining {
            break;
        }
        remaining -= cost;
        blocks.push(block);
    }

    let mut truncated = blocks.len() < ranked.len();

    if blocks.is_empty() {
        if let Some(top) = ranked.first() {
            let header = chunk_header(1, top.chunk.source());
            let room = remaining.saturating_sub(char_len(&header));
            if room > 0 {
                let cut: String = top.chunk.text.chars().take(room).collect();
                blocks.push(format!("{}{}", header, cut));
                truncated = true;
            }
        }
    }

    let chunks_used = blocks.len();
    let text = format!("{}{}{}", PREAMBLE, blocks.join(SEPARATOR), tail);

    AssembledPrompt {
        text,
        chunks_used,
        truncated,
    }
}

/// Prompt asking for a short summary of one passage, cut to `budget` characters
pub fn summary_prompt(passage: &str, budget: usize) -> String {
    const HEAD: &str = "Summarize the following text in a few sentences:\n\n";
    const TAIL: &str = "\n\nSummary:";

    let room = budget.saturating_sub(char_len(HEAD) + char_len(TAIL));
    let body: String = passage.chars().take(room).collect();
    format!("{}{}{}", HEAD, body, TAIL)
}
