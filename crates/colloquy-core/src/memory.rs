//! Ordered per-session log of chat turns. Insertion order is the dialogue
//! order and is never shuffled; at most one system turn exists and it is
//! always first.

use colloquy_abi::{ChatTurn, Role};

#[derive(Default, Debug, Clone)]
pub struct Conversation {
    turns: Vec<ChatTurn>,
}

impl Conversation {
    #[inline]
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Start with a seeded system turn.
    pub fn with_system<S: Into<String>>(system: S) -> Self {
        Self {
            turns: vec![ChatTurn::system(system)],
        }
    }

    /// All stored turns (oldest → newest).
    #[inline]
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drop everything and seed a single system turn. Mid-conversation this
    /// discards all prior user/assistant turns.
    pub fn set_system_prompt<S: Into<String>>(&mut self, system: S) {
        self.turns.clear();
        self.turns.push(ChatTurn::system(system));
    }

    /// Push a new user turn. Empty content is permitted.
    #[inline]
    pub fn push_user<S: Into<String>>(&mut self, s: S) {
        self.turns.push(ChatTurn::user(s));
    }

    /// Push a new assistant turn.
    #[inline]
    pub fn push_assistant<S: Into<String>>(&mut self, s: S) {
        self.turns.push(ChatTurn::assistant(s));
    }

    /// Remove all history, the system turn included.
    #[inline]
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Drop the oldest non-system turn(s) to make room.
    /// If the oldest is a (User, Assistant) pair, remove them together
    /// to keep dialog coherent. Returns true if something was removed.
    pub fn drop_oldest_pair(&mut self) -> bool {
        if self.turns.is_empty() {
            return false;
        }

        // Find first non-system turn.
        let Some(i) = self
            .turns
            .iter()
            .position(|t| !matches!(t.role, Role::System))
        else {
            return false;
        };

        // Prefer dropping a coherent (User, Assistant) pair if present.
        if i + 1 < self.turns.len()
            && matches!(self.turns[i].role, Role::User)
            && matches!(self.turns[i + 1].role, Role::Assistant)
        {
            self.turns.drain(i..=i + 1);
        } else {
            self.turns.remove(i);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_system_prompt_mid_conversation_leaves_one_turn() {
        let mut conv = Conversation::new();
        conv.push_user("hi");
        conv.push_assistant("hello");
        conv.push_user("more");
        conv.set_system_prompt("You are terse.");

        assert_eq!(conv.turns().len(), 1);
        assert_eq!(conv.turns()[0].role, Role::System);
        assert_eq!(conv.turns()[0].content, "You are terse.");
    }

    #[test]
    fn drop_oldest_pair_spares_the_system_turn() {
        let mut conv = Conversation::with_system("sys");
        conv.push_user("q1");
        conv.push_assistant("a1");
        conv.push_user("q2");

        assert!(conv.drop_oldest_pair());
        assert_eq!(conv.turns().len(), 2);
        assert_eq!(conv.turns()[0].role, Role::System);
        assert_eq!(conv.turns()[1].content, "q2");

        // Only the unpaired user turn is left after the system turn.
        assert!(conv.drop_oldest_pair());
        assert_eq!(conv.turns().len(), 1);
        assert!(!conv.drop_oldest_pair());
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut conv = Conversation::with_system("sys");
        conv.push_user("q");
        conv.push_assistant("a");
        let roles: Vec<Role> = conv.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    }

    #[test]
    fn empty_content_is_a_valid_turn() {
        let mut conv = Conversation::new();
        conv.push_user("");
        assert_eq!(conv.turns().len(), 1);
        assert_eq!(conv.turns()[0].content, "");
    }
}
