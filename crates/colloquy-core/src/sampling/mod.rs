//! Token selection: raw logits → one sampled token.
//!
//! Stage order follows the classic llama.cpp chain: penalties, top-k,
//! top-p, temperature, stochastic draw. Each stage is disabled by its
//! neutral value, and the neutral configuration reduces to plain
//! softmax sampling over the unmodified logits.

mod pipeline;

use colloquy_abi::{SamplingConfig, Token};
use rand::SeedableRng;
use rand::rngs::StdRng;

use pipeline::{Candidate, apply_penalties, cut_top_k, cut_top_p, draw};

/// Owns the RNG for one generation call so a fixed seed reproduces the
/// whole token sequence.
pub struct Sampler {
    rng: StdRng,
}

impl Sampler {
    /// Seeded from the config when `seed` is set, from entropy otherwise.
    pub fn new(config: &SamplingConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Run the pipeline over one logit vector. `history` is the full token
    /// history of the call; only the trailing `penalty_window` of it feeds
    /// the penalty stage.
    pub fn select(
        &mut self,
        logits: &[f32],
        history: &[Token],
        config: &SamplingConfig,
    ) -> Token {
        let mut candidates: Vec<Candidate> = logits
            .iter()
            .enumerate()
            .map(|(id, &logit)| Candidate {
                token: id as i32,
                score: logit,
            })
            .collect();

        let window_start = history.len().saturating_sub(config.penalty_window);
        apply_penalties(&mut candidates, &history[window_start..], config);
        cut_top_k(&mut candidates, config.top_k as usize);
        cut_top_p(&mut candidates, config.top_p);

        Token(draw(&mut self.rng, &candidates, config))
    }
}
