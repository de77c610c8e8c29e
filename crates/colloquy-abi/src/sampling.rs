use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Per-call sampling knobs. Immutable once a generation starts; each stage
/// is independently toggleable by its neutral value (top_k = 0 keeps all,
/// top_p = 1.0 keeps all, penalties at 1.0 / 0.0 leave scores untouched).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Position budget for the whole call: prompt tokens + decode steps.
    pub max_tokens: usize,
    /// > 0. Values at or below ~1e-4 select greedily.
    pub temperature: f32,
    /// Keep the k highest-scoring candidates; 0 disables the filter.
    pub top_k: u32,
    /// Nucleus mass in (0, 1]; 1.0 disables the filter.
    pub top_p: f32,
    /// Multiplicative, sign-aware penalty on repeated tokens; 1.0 is a no-op.
    pub repeat_penalty: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    /// Trailing token-history length the penalties look at; 0 disables them.
    pub penalty_window: usize,
    /// Fixed seed for a reproducible draw; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.8,
            top_k: 45,
            top_p: 0.95,
            repeat_penalty: 1.1,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            penalty_window: 64,
            seed: None,
        }
    }
}

impl SamplingConfig {
    /// Reject invalid knobs before any engine call is made.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(Error::Config(format!(
                "temperature must be a non-negative finite number, got {}",
                self.temperature
            )));
        }
        if !self.top_p.is_finite() || self.top_p <= 0.0 || self.top_p > 1.0 {
            return Err(Error::Config(format!(
                "top_p must lie in (0, 1], got {}",
                self.top_p
            )));
        }
        if !self.repeat_penalty.is_finite() || self.repeat_penalty <= 0.0 {
            return Err(Error::Config(format!(
                "repeat_penalty must be positive, got {}",
                self.repeat_penalty
            )));
        }
        if !self.frequency_penalty.is_finite() || !self.presence_penalty.is_finite() {
            return Err(Error::Config(
                "frequency/presence penalties must be finite".into(),
            ));
        }
        Ok(())
    }

    /// Greedy cutoff: dividing by temperatures this small is numerically
    /// meaningless, so the pipeline short-circuits to argmax.
    pub fn is_greedy(&self) -> bool {
        self.temperature <= 1e-4
    }
}
