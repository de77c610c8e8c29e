use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{EngineFault, Error};
use crate::token::Token;

/// One submission to the engine's forward pass: a run of tokens starting at
/// `start_position`, with logits requested only for the final position when
/// `logits_for_last_only` is set. Prefill sends the whole prompt as one of
/// these; every decode step sends a single token.
#[derive(Debug, Clone, Copy)]
pub struct TokenBatch<'a> {
    pub tokens: &'a [Token],
    pub start_position: i32,
    pub logits_for_last_only: bool,
}

impl<'a> TokenBatch<'a> {
    /// Prompt batch at positions `0..tokens.len()`, logits for the last
    /// position only.
    #[inline]
    pub fn prefill(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            start_position: 0,
            logits_for_last_only: true,
        }
    }

    /// Single-token decode step at `position`.
    #[inline]
    pub fn step(token: &'a [Token; 1], position: i32) -> Self {
        Self {
            tokens: token,
            start_position: position,
            logits_for_last_only: true,
        }
    }
}

/// Engine-agnostic interface the chat core drives. Implementations own
/// their native model/context handles and release them exactly once in
/// `Drop`, on every exit path; the core never sees a raw handle and there
/// is no process-wide engine instance.
pub trait InferenceEngine {
    /// Turn text into token IDs. `add_leading_marker` requests the engine's
    /// sequence-start token; `parse_markup` lets special-token text in the
    /// prompt tokenize to its control tokens. A negative count from the
    /// engine must surface as [`Error::Tokenization`].
    fn tokenize(
        &self,
        text: &str,
        add_leading_marker: bool,
        parse_markup: bool,
    ) -> Result<Vec<Token>, Error>;

    /// Run the forward pass over one batch. Nonzero engine status surfaces
    /// as an [`EngineFault`]; the core tags it with the phase.
    fn forward(&mut self, batch: TokenBatch<'_>) -> Result<(), EngineFault>;

    /// Logits at the last position of the most recent `forward`.
    /// Length == vocabulary size.
    fn last_logits(&self) -> &[f32];

    /// Decode a single token to a text fragment. May be empty (byte-pair
    /// continuation tokens, control tokens the engine elides).
    fn detokenize_fragment(&self, token: Token) -> String;

    /// True if `token` is in the engine's end-of-generation set.
    fn is_end_of_generation(&self, token: Token) -> bool;

    /// Active context window (n_ctx) if known.
    fn context_window_hint(&self) -> Option<usize> {
        None
    }
}

/// Host-supplied engine knobs, passed through to the adapter unchanged.
/// The core never interprets these beyond handing them over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub model_path: PathBuf,
    pub n_ctx: u32,
    pub n_batch: u32,
    pub n_threads: i32,
}

impl EngineConfig {
    pub fn new<P: Into<PathBuf>>(model_path: P) -> Self {
        Self {
            model_path: model_path.into(),
            n_ctx: 4096,
            n_batch: 512,
            n_threads: num_cpus::get_physical() as i32,
        }
    }
}
