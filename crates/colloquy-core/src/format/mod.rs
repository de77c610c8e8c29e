//! Prompt rendering: conversation turns → a single engine-ready string.
//!
//! Marker vocabularies are data ([`PromptMarkers`]), not code: a new model
//! family is a new table, and the stop scanner derives its suppression list
//! from the same table the renderer uses.

mod format;
mod markers;
mod template;

pub use format::FormattedPrompt;
pub use markers::{PromptMarkers, TemplateKind};
pub use template::PromptTemplate;
