//! Error taxonomy for a generation call.
//!
//! Every failure names the phase it happened in (tokenize / prefill /
//! decode) so hosts can decide on retry policy themselves; the core never
//! retries anything.

use thiserror::Error;

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Raw failure reported by an engine adapter (nonzero status, bad pointer,
/// whatever the backend surfaced). The core tags it with the phase it
/// occurred in before handing it to the caller.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct EngineFault(pub String);

#[derive(Debug, Error)]
pub enum Error {
    /// Engine could not tokenize the input (reported a negative count).
    /// Surfaced before anything is streamed; no session state is mutated.
    #[error("tokenization failed: {0}")]
    Tokenization(String),

    /// Forward pass failed while evaluating the prompt batch. Nothing has
    /// been streamed yet, so there is no partial output to salvage.
    #[error("prefill failed: {0}")]
    Prefill(#[source] EngineFault),

    /// Forward pass failed mid-decode. `partial` preserves the text already
    /// streamed to the caller; the fragment callback receives nothing more.
    #[error("decode failed: {source}")]
    Decode {
        #[source]
        source: EngineFault,
        partial: String,
    },

    /// Invalid sampling configuration, rejected before any engine call.
    #[error("invalid sampling config: {0}")]
    Config(String),
}

impl Error {
    /// Text streamed before the failure, if any survived.
    pub fn partial_output(&self) -> Option<&str> {
        match self {
            Error::Decode { partial, .. } => Some(partial.as_str()),
            _ => None,
        }
    }
}
