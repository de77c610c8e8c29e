use colloquy_abi::{ChatTurn, Role};

use super::format::FormattedPrompt;
use super::markers::{PromptMarkers, TemplateKind};

/// Renders a conversation with one marker table. Always succeeds; an empty
/// conversation renders to just the sequence prefix plus the open assistant
/// header, so the engine's continuation becomes the assistant's reply.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    markers: PromptMarkers,
}

impl PromptTemplate {
    pub fn new(kind: TemplateKind) -> Self {
        Self {
            markers: kind.markers(),
        }
    }

    #[inline]
    pub fn markers(&self) -> &PromptMarkers {
        &self.markers
    }

    /// Concatenate every turn in order, then leave an assistant header open.
    pub fn render(&self, turns: &[ChatTurn]) -> FormattedPrompt {
        let m = &self.markers;
        let mut text = String::with_capacity(self.estimate_len(turns));
        text.push_str(&m.sequence_prefix);
        for turn in turns {
            text.push_str(&m.header_open);
            text.push_str(m.role_name(turn.role));
            text.push_str(&m.header_close);
            text.push_str(&turn.content);
            text.push_str(&m.turn_end);
        }
        text.push_str(&m.header_open);
        text.push_str(m.role_name(Role::Assistant));
        text.push_str(&m.header_close);

        FormattedPrompt {
            text,
            stop_markers: m.stop_markers.clone(),
        }
    }

    /// Control-text fragments the stop scanner must keep out of the caller's
    /// stream.
    pub fn special_fragments(&self) -> Vec<String> {
        self.markers.special_fragments()
    }

    fn estimate_len(&self, turns: &[ChatTurn]) -> usize {
        let m = &self.markers;
        let per_turn =
            m.header_open.len() + m.header_close.len() + m.turn_end.len() + 16;
        m.sequence_prefix.len()
            + turns
                .iter()
                .map(|t| t.content.len() + per_turn)
                .sum::<usize>()
            + per_turn
    }
}
