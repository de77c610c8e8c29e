//! Colloquy core: conversational session orchestration over an
//! autoregressive inference engine.
//!
//! The engine itself (tokenizer + forward pass) sits behind
//! [`colloquy_abi::InferenceEngine`]; this crate owns everything around it:
//! the conversation log, prompt rendering, the sampling pipeline, stop
//! detection across streaming fragments, and the prefill/decode loop.

pub mod debug;
pub mod engine;
pub mod format;
pub mod memory;
pub mod sampling;
pub mod stop;

pub use engine::{ChatSession, FinishReason, Reply};
pub use format::{FormattedPrompt, PromptMarkers, PromptTemplate, TemplateKind};
pub use memory::Conversation;
pub use sampling::Sampler;
pub use stop::{StopScan, StopScanner};
