use std::sync::atomic::Ordering;

use colloquy_abi::{Error, InferenceEngine, SamplingConfig, TokenBatch};

use super::{ChatSession, FinishReason, Reply};
use crate::debug::trace_fragment;
use crate::format::FormattedPrompt;
use crate::sampling::Sampler;
use crate::stop::StopScanner;

impl<E: InferenceEngine> ChatSession<E> {
    /// The generation core: tokenize → prefill → decode loop.
    ///
    /// `on_fragment` is synchronous; the loop does not take the next decode
    /// step until it returns, so a slow consumer backpressures generation.
    /// After an error nothing more reaches the callback; text streamed
    /// before a decode failure rides along in [`Error::Decode`].
    pub(super) fn generate_formatted<F>(
        &mut self,
        formatted: &FormattedPrompt,
        config: &SamplingConfig,
        mut on_fragment: F,
    ) -> Result<Reply, Error>
    where
        F: FnMut(&str),
    {
        config.validate()?;
        self.clear_stop();

        println!("🧠 [generate] Starting inference");

        // Tokenize full prompt. Fails fast; no state has been touched.
        let prompt_tokens = self
            .engine
            .tokenize(&formatted.text, false, true)?;
        println!("🔤 [generate] Tokenized prompt ({} tokens)", prompt_tokens.len());

        let budget = self.position_budget(config);

        // Prefill: one batch, logits at the last position.
        let mut n_past = self.prefill(&prompt_tokens)?;

        let mut scanner = StopScanner::new(
            self.merged_stop_markers(formatted),
            self.template.special_fragments(),
            self.scan_suppressed,
        );
        let mut sampler = Sampler::new(config);
        let mut history = prompt_tokens;
        let mut generated = 0usize;
        let mut finish = FinishReason::TokenBudget;

        // Decode loop (STOP-aware).
        while (n_past as usize) < budget {
            if self.stop_flag.load(Ordering::Relaxed) {
                println!("⏹️ [generate] STOP requested. Ending.");
                finish = FinishReason::Cancelled;
                break;
            }

            let token = sampler.select(self.engine.last_logits(), &history, config);

            if self.engine.is_end_of_generation(token) {
                println!("🏁 [generate] Reached end-of-generation token.");
                finish = FinishReason::EndOfGeneration;
                break;
            }

            // Feed the sampled token back as a one-token batch.
            let step = [token];
            self.engine
                .forward(TokenBatch::step(&step, n_past))
                .map_err(|fault| Error::Decode {
                    source: fault,
                    partial: scanner.emitted_text().to_string(),
                })?;
            history.push(token);
            n_past += 1;
            generated += 1;

            let fragment = self.engine.detokenize_fragment(token);
            if fragment.is_empty() {
                continue;
            }
            trace_fragment("decode", &fragment);

            let scan = scanner.scan(&fragment);
            if let Some(delta) = scan.emit {
                on_fragment(&delta);
            }
            if scan.stop {
                println!("🛑 [generate] Stop marker hit. Ending.");
                finish = FinishReason::StopMarker;
                break;
            }
        }

        // Held-back text never completed a marker; it is ordinary output.
        if let Some(tail) = scanner.flush() {
            on_fragment(&tail);
        }

        let text = scanner.emitted_text().to_string();
        println!("✅ [generate] Complete ({generated} tokens, {} chars)", text.len());
        Ok(Reply {
            text,
            finish,
            tokens: generated,
        })
    }
}
