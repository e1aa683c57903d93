use serde::{Deserialize, Serialize};

/// Number of progress flags carried by a [`DialogueState`].
pub const STATE_FLAG_COUNT: usize = 8;

/// Flag names in encoding order.
pub const STATE_FLAG_NAMES: [&str; STATE_FLAG_COUNT] = [
    "is_beginning",
    "agent_req_filled",
    "agent_can_lookup",
    "agent_made_partial_offer",
    "agent_should_make_offer",
    "agent_made_offer",
    "agent_offer_no_results",
    "at_terminal_state",
];

/// Turn-level snapshot of conversational progress.
///
/// Owned and advanced by the dialogue manager; read-only for encoding.
/// Missing fields deserialize as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueState {
    pub is_beginning: bool,
    pub agent_req_filled: bool,
    pub agent_can_lookup: bool,
    pub agent_made_partial_offer: bool,
    pub agent_should_make_offer: bool,
    pub agent_made_offer: bool,
    pub agent_offer_no_results: bool,
    pub at_terminal_state: bool,
}

impl DialogueState {
    /// State at the first turn of a conversation.
    #[must_use]
    pub fn beginning() -> Self {
        Self {
            is_beginning: true,
            ..Self::default()
        }
    }

    /// Flags in the order given by [`STATE_FLAG_NAMES`].
    #[must_use]
    pub fn flags(&self) -> [bool; STATE_FLAG_COUNT] {
        [
            self.is_beginning,
            self.agent_req_filled,
            self.agent_can_lookup,
            self.agent_made_partial_offer,
            self.agent_should_make_offer,
            self.agent_made_offer,
            self.agent_offer_no_results,
            self.at_terminal_state,
        ]
    }
}
