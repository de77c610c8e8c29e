//! The candidate-set transform stages behind [`super::Sampler`].

use std::collections::HashMap;

use colloquy_abi::{SamplingConfig, Token};
use rand::Rng;
use rand::rngs::StdRng;

#[derive(Debug, Clone, Copy)]
pub(super) struct Candidate {
    pub token: i32,
    pub score: f32,
}

/// Sign-aware repetition penalty plus frequency/presence penalties over the
/// trailing history window. A repeat penalty of exactly 1.0 with zero
/// frequency/presence weights leaves every score numerically unchanged.
pub(super) fn apply_penalties(
    candidates: &mut [Candidate],
    window: &[Token],
    config: &SamplingConfig,
) {
    if window.is_empty() {
        return;
    }

    let mut counts: HashMap<i32, u32> = HashMap::with_capacity(window.len());
    for tok in window {
        *counts.entry(tok.0).or_insert(0) += 1;
    }

    for cand in candidates.iter_mut() {
        let Some(&count) = counts.get(&cand.token) else {
            continue;
        };
        // Attenuate positive logits, amplify negative ones, so the penalty
        // always pushes the token away from being picked.
        if cand.score <= 0.0 {
            cand.score *= config.repeat_penalty;
        } else {
            cand.score /= config.repeat_penalty;
        }
        cand.score -=
            count as f32 * config.frequency_penalty + config.presence_penalty;
    }
}

/// Keep the `k` highest-scoring candidates; `k = 0` keeps all.
pub(super) fn cut_top_k(candidates: &mut Vec<Candidate>, k: usize) {
    if k == 0 || k >= candidates.len() {
        return;
    }
    candidates.sort_unstable_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(k.max(1));
}

/// Nucleus cut: keep the smallest score-descending prefix whose cumulative
/// softmax mass reaches `p`. `p >= 1.0` keeps all; at least one candidate
/// always survives.
pub(super) fn cut_top_p(candidates: &mut Vec<Candidate>, p: f32) {
    if p >= 1.0 || candidates.len() <= 1 {
        return;
    }
    candidates.sort_unstable_by(|a, b| b.score.total_cmp(&a.score));

    let probs = softmax(candidates);
    let mut cumulative = 0.0f32;
    let mut keep = candidates.len();
    for (i, prob) in probs.iter().enumerate() {
        cumulative += prob;
        if cumulative >= p {
            keep = i + 1;
            break;
        }
    }
    candidates.truncate(keep.max(1));
}

/// Final stage: temperature scaling, normalization, and the stochastic
/// draw. Greedy configs short-circuit to argmax.
pub(super) fn draw(
    rng: &mut StdRng,
    candidates: &[Candidate],
    config: &SamplingConfig,
) -> i32 {
    if config.is_greedy() {
        return argmax(candidates);
    }

    let scaled: Vec<Candidate> = candidates
        .iter()
        .map(|c| Candidate {
            token: c.token,
            score: c.score / config.temperature,
        })
        .collect();
    let probs = softmax(&scaled);

    let point: f32 = rng.gen_range(0.0..1.0);
    let mut cumulative = 0.0f32;
    for (cand, prob) in scaled.iter().zip(&probs) {
        cumulative += prob;
        if point < cumulative {
            return cand.token;
        }
    }
    // Rounding left the cursor past the last bucket; fall back to the mode.
    argmax(candidates)
}

fn argmax(candidates: &[Candidate]) -> i32 {
    candidates
        .iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|c| c.token)
        .unwrap_or(0)
}

/// Max-subtracted softmax; tokens at -inf get exactly zero mass.
fn softmax(candidates: &[Candidate]) -> Vec<f32> {
    let max = candidates
        .iter()
        .map(|c| c.score)
        .fold(f32::NEG_INFINITY, f32::max);
    let weights: Vec<f32> = candidates
        .iter()
        .map(|c| (c.score - max).exp())
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}
