//! Colloquy core engine: chat-session orchestration around an inference
//! engine.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use colloquy_abi::{Error, InferenceEngine, SamplingConfig};
use serde::Serialize;

use crate::format::{FormattedPrompt, PromptTemplate, TemplateKind};
use crate::memory::Conversation;

// Child modules (private to this crate). They can access private fields here.
mod decode;
mod prefill;

/// Why a generation ended. All four are clean terminals, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FinishReason {
    /// The sampled token was in the engine's end-of-generation set.
    EndOfGeneration,
    /// The position cursor reached the `max_tokens` budget.
    TokenBudget,
    /// A configured stop marker appeared in the output.
    StopMarker,
    /// The host flipped the stop handle.
    Cancelled,
}

/// Result of one generation call.
#[derive(Debug, Clone)]
pub struct Reply {
    /// Accumulated visible text (post-truncation, post-suppression).
    pub text: String,
    pub finish: FinishReason,
    /// Decode steps taken (generated tokens, prompt excluded).
    pub tokens: usize,
}

/// Session = {engine context} + {prompt template} + {rolling dialog}.
/// One `ChatSession` is one logical chat session; every generating call
/// takes `&mut self`, so one engine context never runs two generations
/// at once.
pub struct ChatSession<E: InferenceEngine> {
    engine: E,
    template: PromptTemplate,
    conversation: Conversation,

    /// Soft cap for the *prompt* token count. Kept below n_ctx to leave
    /// room for output.
    prompt_token_budget: usize,

    /// Extra caller-configured stop markers, merged with the template's.
    stop_markers: Vec<String>,

    /// Whether stop-marker scanning sees suppressed control text.
    scan_suppressed: bool,

    /// STOP flag (flipped by the host/UI to cancel mid-generation).
    stop_flag: Arc<AtomicBool>,
}

impl<E: InferenceEngine> ChatSession<E> {
    /// Construct around a loaded engine context. The prompt token budget is
    /// ~75% of the engine's context window when it reports one.
    pub fn new(engine: E, template: TemplateKind) -> Self {
        let prompt_token_budget = match engine.context_window_hint() {
            Some(n_ctx) => ((n_ctx as f32) * 0.75) as usize,
            None => 3072,
        };
        Self {
            engine,
            template: PromptTemplate::new(template),
            conversation: Conversation::new(),
            prompt_token_budget: prompt_token_budget.max(1),
            stop_markers: Vec::new(),
            scan_suppressed: true,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Clear the dialog and seed a single system turn.
    pub fn set_system_prompt<S: Into<String>>(&mut self, system: S) {
        self.conversation.set_system_prompt(system);
    }

    /// Drop all turns, the system turn included.
    pub fn reset(&mut self) {
        self.conversation.clear();
    }

    /// Read-only view of the dialog (oldest → newest).
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Mutable access for hosts restoring persisted history. Generating
    /// calls take `&mut self`, so the dialog can only change between calls.
    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    /// Caller-defined stop markers on top of the template's defaults.
    pub fn set_stop_markers(&mut self, markers: Vec<String>) {
        self.stop_markers = markers;
    }

    /// Whether suppressed control text stays visible to stop-marker
    /// scanning (default true).
    pub fn set_scan_suppressed(&mut self, scan_suppressed: bool) {
        self.scan_suppressed = scan_suppressed;
    }

    /// Override the pre-generation prompt token budget.
    pub fn set_prompt_token_budget(&mut self, budget: usize) {
        self.prompt_token_budget = budget.max(1);
    }

    /// Handle you can keep and flip to cancel decoding (`store(true)`).
    /// Checked once per decode step; cancellation is a clean terminal.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    #[inline]
    fn clear_stop(&self) {
        self.stop_flag.store(false, Ordering::Relaxed);
    }

    // ─────────────────────────────────────────────
    // Public inference APIs (thin wrappers)
    // ─────────────────────────────────────────────

    /// Stateful streaming turn: appends the user turn, prunes to budget,
    /// generates, and commits the assistant turn on any clean terminal.
    /// On a tokenize/prefill/decode failure the conversation is rolled back
    /// to exactly its pre-call contents, so a retry replays the same prompt.
    pub fn prompt<F>(
        &mut self,
        user_input: &str,
        config: &SamplingConfig,
        on_fragment: F,
    ) -> Result<Reply, Error>
    where
        F: FnMut(&str),
    {
        config.validate()?;

        // Budget pruning may drop turns from the front of the dialog, so a
        // failed call restores this snapshot wholesale.
        let snapshot = self.conversation.clone();
        self.conversation.push_user(user_input);

        let result = self
            .prune_to_budget()
            .and_then(|formatted| self.generate_formatted(&formatted, config, on_fragment));

        match result {
            Ok(reply) => {
                self.conversation.push_assistant(reply.text.clone());
                Ok(reply)
            }
            Err(err) => {
                self.conversation = snapshot;
                Err(err)
            }
        }
    }

    /// Non-streaming twin of [`Self::prompt`].
    pub fn ask(&mut self, user_input: &str, config: &SamplingConfig) -> Result<Reply, Error> {
        self.prompt(user_input, config, |_| {})
    }

    /// Stateless generation over caller-rendered prompt text. Does not
    /// touch the conversation; session stop markers and the template's
    /// suppression list still apply.
    pub fn generate<F>(
        &mut self,
        prompt_text: &str,
        config: &SamplingConfig,
        on_fragment: F,
    ) -> Result<Reply, Error>
    where
        F: FnMut(&str),
    {
        let formatted = FormattedPrompt::new(prompt_text);
        self.generate_formatted(&formatted, config, on_fragment)
    }

    // ─────────────────────────────────────────────
    // Local helpers kept in the parent (format/budget/limits)
    // ─────────────────────────────────────────────

    /// Position budget for one call: the config's `max_tokens`, clamped to
    /// the engine's context window when it reports one.
    fn position_budget(&self, config: &SamplingConfig) -> usize {
        match self.engine.context_window_hint() {
            Some(n_ctx) => config.max_tokens.min(n_ctx),
            None => config.max_tokens,
        }
    }

    /// Render the dialog, trimming oldest (user, assistant) pairs until the
    /// prompt fits the token budget.
    fn prune_to_budget(&mut self) -> Result<FormattedPrompt, Error> {
        loop {
            let formatted = self.template.render(self.conversation.turns());
            let tokens = self
                .engine
                .tokenize(&formatted.text, false, true)?;
            if tokens.len() <= self.prompt_token_budget {
                return Ok(formatted);
            }
            if !self.conversation.drop_oldest_pair() {
                // Can't drop more; proceed anyway with the current prompt.
                return Ok(formatted);
            }
        }
    }

    /// Stop markers for this call: the template's defaults plus the
    /// session's extras.
    fn merged_stop_markers(&self, formatted: &FormattedPrompt) -> Vec<String> {
        let mut markers = formatted.stop_markers.clone();
        for m in &self.stop_markers {
            if !markers.contains(m) {
                markers.push(m.clone());
            }
        }
        markers
    }
}

// NOTE: the heavy lifting lives in child modules as `impl ChatSession<E>`
// with `pub(super)` methods called above:
//
// - prefill.rs: prefill(...)
// - decode.rs:  generate_formatted(...)
