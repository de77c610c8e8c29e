use colloquy_abi::{Error, InferenceEngine, Token, TokenBatch};

use super::ChatSession;

impl<E: InferenceEngine> ChatSession<E> {
    /// Evaluate the whole prompt as one batch at positions `0..n`, logits
    /// for the final position only. Returns the position cursor (`n_past`).
    /// Failure here is fatal for the call; nothing has been streamed yet.
    pub(super) fn prefill(&mut self, prompt_tokens: &[Token]) -> Result<i32, Error> {
        println!("⚙️ [prefill] Evaluating prompt batch ({} tokens)", prompt_tokens.len());
        self.engine
            .forward(TokenBatch::prefill(prompt_tokens))
            .map_err(Error::Prefill)?;
        println!("✅ [prefill] Done ({} tokens)", prompt_tokens.len());
        Ok(prompt_tokens.len() as i32)
    }
}
