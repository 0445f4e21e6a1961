//! Instruction-tuning pairs derived from discussion threads.
//!
//! The first pair of a thread asks the discussion's title and body; every
//! later pair asks the previous response, with a bounded window of earlier
//! responses as context.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::models::{Discussion, InstructionPair};

/// Default number of earlier responses included as context.
pub const DEFAULT_CONTEXT_WINDOW: usize = 50;

/// Derive the pairs of one discussion.
///
/// Comments are paired last-posted first: the thread is reversed before
/// pairing, so the most recent comment answers the title and body. A
/// discussion without comments yields no pairs.
#[must_use]
pub fn derive_pairs(discussion: &Discussion, window: usize) -> Vec<InstructionPair> {
    if discussion.comments.is_empty() {
        return Vec::new();
    }

    let responses: Vec<&str> = discussion
        .comments
        .iter()
        .rev()
        .map(|comment| comment.comment_text.as_str())
        .collect();
    let head = format!("{}\n{}", discussion.title(), discussion.description());

    pair_thread(&head, &responses, window)
}

/// Pair an already ordered list of responses.
///
/// Pair `i > 0` uses response `i - 1` as instruction and the newline-joined
/// responses of the last `min(i, window)` pairs as context.
#[must_use]
pub fn pair_thread(head: &str, responses: &[&str], window: usize) -> Vec<InstructionPair> {
    let mut pairs: Vec<InstructionPair> = Vec::with_capacity(responses.len());

    for (i, response) in responses.iter().enumerate() {
        let pair = match pairs.last() {
            None => InstructionPair {
                instruction: head.to_string(),
                context: String::new(),
                response: (*response).to_string(),
            },
            Some(previous) => {
                let lookback = i.min(window);
                let context = pairs[i - lookback..]
                    .iter()
                    .map(|pair| pair.response.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                InstructionPair {
                    instruction: previous.response.clone(),
                    context,
                    response: (*response).to_string(),
                }
            }
        };
        pairs.push(pair);
    }

    pairs
}

/// Pairs of every discussion, in corpus order.
#[must_use]
pub fn derive_dataset(corpus: &[Discussion], window: usize) -> Vec<InstructionPair> {
    corpus
        .iter()
        .flat_map(|discussion| derive_pairs(discussion, window))
        .collect()
}

/// Prompt text for a pair, without the response.
#[must_use]
pub fn render_prompt(pair: &InstructionPair) -> String {
    if pair.context.is_empty() {
        format!(
            "Below is an instruction that describes a task. \
             Write a response that appropriately completes the request.\n\n\
             ### Instruction:\n{}\n\n### Response:",
            pair.instruction
        )
    } else {
        format!(
            "Below is an instruction that describes a task, paired with an input that provides further context. \
             Write a response that appropriately completes the request.\n\n\
             ### Instruction:\n{}\n\n### Input:\n{}\n\n### Response:",
            pair.instruction, pair.context
        )
    }
}

/// Prompt followed by the response, as fed to a tokenizer for training.
#[must_use]
pub fn render_training_text(pair: &InstructionPair) -> String {
    let mut text = render_prompt(pair);
    text.push_str(&pair.response);
    text
}

#[derive(Serialize)]
struct PromptedPair<'a> {
    #[serde(flatten)]
    pair: &'a InstructionPair,
    prompt: String,
}

/// Read a persisted corpus.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a corpus.
pub async fn load_corpus(path: &Path) -> Result<Vec<Discussion>> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read corpus: {}", path.display()))?;
    serde_json::from_slice(&data)
        .with_context(|| format!("Failed to parse corpus: {}", path.display()))
}

/// Write pairs as JSON Lines, optionally with the rendered prompt.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub async fn write_pairs_jsonl(
    path: &Path,
    pairs: &[InstructionPair],
    with_prompts: bool,
) -> Result<()> {
    let mut out = String::new();
    for pair in pairs {
        let line = if with_prompts {
            serde_json::to_string(&PromptedPair {
                pair,
                prompt: render_prompt(pair),
            })
        } else {
            serde_json::to_string(pair)
        }
        .context("Failed to serialize pair")?;
        out.push_str(&line);
        out.push('\n');
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    tokio::fs::write(path, out)
        .await
        .with_context(|| format!("Failed to write pairs: {}", path.display()))?;

    info!(path = %path.display(), pairs = pairs.len(), "Wrote instruction pairs");
    Ok(())
}
