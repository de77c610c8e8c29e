use colloquy_abi::Role;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Role-delimiter vocabulary for one model family. Any whitespace that
/// belongs between a role header and the turn content lives in
/// `header_close`, so header/content separation is per-family data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMarkers {
    /// Emitted once at the very start of the rendered prompt.
    pub sequence_prefix: String,
    /// Opens a role header.
    pub header_open: String,
    /// Closes a role header (including any separator before the content).
    pub header_close: String,
    /// Terminates a completed turn.
    pub turn_end: String,
    pub role_system: String,
    pub role_user: String,
    pub role_assistant: String,
    /// Control-token renderings beyond the four markers above that must
    /// never reach the caller's fragment stream.
    pub extra_special: Vec<String>,
    /// Textual stop sentinels for engines whose end-of-turn token decodes
    /// to visible text instead of terminating on its own.
    pub stop_markers: Vec<String>,
}

impl PromptMarkers {
    pub fn role_name(&self, role: Role) -> &str {
        match role {
            Role::System => &self.role_system,
            Role::User => &self.role_user,
            Role::Assistant => &self.role_assistant,
        }
    }

    /// Marker strings the stop scanner suppresses from the emit stream:
    /// every non-blank delimiter this family renders.
    pub fn special_fragments(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let candidates = [
            self.sequence_prefix.as_str(),
            self.header_open.as_str(),
            self.header_close.as_str(),
            self.turn_end.as_str(),
        ];
        for m in candidates
            .into_iter()
            .chain(self.extra_special.iter().map(String::as_str))
        {
            if !m.trim().is_empty() && !out.iter().any(|s| s == m) {
                out.push(m.to_string());
            }
        }
        out
    }
}

/// Llama-3 instruct headers.
static LLAMA3: Lazy<PromptMarkers> = Lazy::new(|| PromptMarkers {
    sequence_prefix: "<|begin_of_text|>".into(),
    header_open: "<|start_header_id|>".into(),
    header_close: "<|end_header_id|>".into(),
    turn_end: "<|eot_id|>".into(),
    role_system: "system".into(),
    role_user: "user".into(),
    role_assistant: "assistant".into(),
    extra_special: vec!["<|end_of_text|>".into()],
    stop_markers: Vec::new(),
});

/// ChatML (`<|im_start|>role\n…<|im_end|>`).
static CHATML: Lazy<PromptMarkers> = Lazy::new(|| PromptMarkers {
    sequence_prefix: String::new(),
    header_open: "<|im_start|>".into(),
    header_close: "\n".into(),
    turn_end: "<|im_end|>\n".into(),
    role_system: "system".into(),
    role_user: "user".into(),
    role_assistant: "assistant".into(),
    extra_special: vec!["<|im_end|>".into()],
    stop_markers: vec!["<|im_start|>".into()],
});

/// Generic, model-agnostic template kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateKind {
    Llama3,
    ChatMl,
    /// Caller-supplied marker table for families we don't ship.
    Custom(PromptMarkers),
}

impl TemplateKind {
    pub fn markers(&self) -> PromptMarkers {
        match self {
            TemplateKind::Llama3 => LLAMA3.clone(),
            TemplateKind::ChatMl => CHATML.clone(),
            TemplateKind::Custom(m) => m.clone(),
        }
    }
}
