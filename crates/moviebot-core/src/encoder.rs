//! Feature encoding of dialogue signals into fixed-length vectors.
//!
//! The layout of a combined vector is `[state flags | user intents | agent
//! intents]`. Intent blocks are multi-hot over their vocabulary and keep the
//! vocabulary's length even when no intent is present.

use serde::{Deserialize, Serialize};

use crate::error::EncodingError;
use crate::intent::IntentVocabulary;
use crate::state::{DialogueState, STATE_FLAG_COUNT};

/// Dense policy input.
pub type FeatureVector = Vec<f32>;

/// Encodes the eight state flags as `1.0`/`0.0`.
#[must_use]
pub fn encode_state(state: &DialogueState) -> FeatureVector {
    state
        .flags()
        .iter()
        .map(|&flag| if flag { 1.0 } else { 0.0 })
        .collect()
}

/// Multi-hot encoding of `intents` over `vocabulary`.
///
/// Duplicates collapse to `1.0`; an empty slice yields an all-zero vector of
/// `vocabulary.len()` elements.
///
/// # Errors
/// Returns [`EncodingError::UnknownLabel`] when an intent is not part of the
/// vocabulary.
pub fn encode_intents<S: AsRef<str>>(
    intents: &[S],
    vocabulary: &IntentVocabulary,
) -> Result<FeatureVector, EncodingError> {
    let mut vector = vec![0.0; vocabulary.len()];
    for intent in intents {
        vector[vocabulary.position(intent.as_ref())?] = 1.0;
    }
    Ok(vector)
}

/// Concatenates the state encoding with both intent encodings.
///
/// # Errors
/// Propagates [`EncodingError::UnknownLabel`] from either intent block.
pub fn encode_combined<U: AsRef<str>, A: AsRef<str>>(
    state: &DialogueState,
    user_intents: &[U],
    user_vocabulary: &IntentVocabulary,
    agent_intents: &[A],
    agent_vocabulary: &IntentVocabulary,
) -> Result<FeatureVector, EncodingError> {
    let mut vector = encode_state(state);
    vector.reserve(user_vocabulary.len() + agent_vocabulary.len());
    vector.extend(encode_intents(user_intents, user_vocabulary)?);
    vector.extend(encode_intents(agent_intents, agent_vocabulary)?);
    Ok(vector)
}

/// Encoder configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderOptions {
    /// Append multi-hot blocks for the previous user and agent intents.
    pub use_intents: bool,
}

/// Single entry point for building policy inputs.
///
/// Holds the vocabularies fixed at startup so every call of
/// [`FeatureEncoder::build_input`] returns exactly [`FeatureEncoder::input_size`]
/// elements.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    options: EncoderOptions,
    user_vocabulary: IntentVocabulary,
    agent_vocabulary: IntentVocabulary,
}

impl FeatureEncoder {
    /// Encoder over the full user and agent intent catalogs.
    #[must_use]
    pub fn new(options: EncoderOptions) -> Self {
        Self::with_vocabularies(
            options,
            IntentVocabulary::user_intents(),
            IntentVocabulary::agent_intents(),
        )
    }

    #[must_use]
    pub fn with_vocabularies(
        options: EncoderOptions,
        user_vocabulary: IntentVocabulary,
        agent_vocabulary: IntentVocabulary,
    ) -> Self {
        Self {
            options,
            user_vocabulary,
            agent_vocabulary,
        }
    }

    #[must_use]
    pub fn options(&self) -> EncoderOptions {
        self.options
    }

    #[must_use]
    pub fn user_vocabulary(&self) -> &IntentVocabulary {
        &self.user_vocabulary
    }

    #[must_use]
    pub fn agent_vocabulary(&self) -> &IntentVocabulary {
        &self.agent_vocabulary
    }

    /// Length of every vector returned by [`FeatureEncoder::build_input`].
    #[must_use]
    pub fn input_size(&self) -> usize {
        if self.options.use_intents {
            STATE_FLAG_COUNT + self.user_vocabulary.len() + self.agent_vocabulary.len()
        } else {
            STATE_FLAG_COUNT
        }
    }

    /// Builds the policy input for one turn.
    ///
    /// Intents are ignored unless [`EncoderOptions::use_intents`] is set.
    ///
    /// # Errors
    /// Returns [`EncodingError::UnknownLabel`] when intents are used and one
    /// of them is missing from its vocabulary.
    pub fn build_input<U: AsRef<str>, A: AsRef<str>>(
        &self,
        state: &DialogueState,
        user_intents: &[U],
        agent_intents: &[A],
    ) -> Result<FeatureVector, EncodingError> {
        if self.options.use_intents {
            encode_combined(
                state,
                user_intents,
                &self.user_vocabulary,
                agent_intents,
                &self.agent_vocabulary,
            )
        } else {
            Ok(encode_state(state))
        }
    }
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self::new(EncoderOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{AgentIntent, UserIntent};

    const NO_USER: &[UserIntent] = &[];
    const NO_AGENT: &[AgentIntent] = &[];

    #[test]
    fn state_encoding_has_eight_elements() {
        assert_eq!(encode_state(&DialogueState::default()), vec![0.0; 8]);
        let s = DialogueState {
            agent_can_lookup: true,
            at_terminal_state: true,
            ..DialogueState::default()
        };
        assert_eq!(
            encode_state(&s),
            vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn empty_intents_encode_to_zero_vector_of_vocabulary_length() {
        let vocab = IntentVocabulary::user_intents();
        let v = encode_intents(NO_USER, &vocab).expect("encode");
        assert_eq!(v.len(), vocab.len());
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn duplicate_intents_collapse() {
        let vocab = IntentVocabulary::new(["accept", "bye", "hi"]).expect("vocab");
        let v = encode_intents(&["hi", "hi", "accept"], &vocab).expect("encode");
        assert_eq!(v, vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn intent_encoding_is_independent_of_call_history() {
        let vocab = IntentVocabulary::agent_intents();
        let first = encode_intents(&[AgentIntent::Recommend, AgentIntent::Bye], &vocab);
        let _ = encode_intents(&[AgentIntent::Welcome], &vocab);
        let second = encode_intents(&[AgentIntent::Bye, AgentIntent::Recommend], &vocab);
        assert_eq!(first, second);
    }

    #[test]
    fn mismatched_vocabulary_is_an_error() {
        let vocab = IntentVocabulary::new(["accept"]).expect("vocab");
        let err = encode_intents(&[UserIntent::Reject], &vocab).unwrap_err();
        assert_eq!(
            err,
            EncodingError::UnknownLabel {
                label: "reject".into()
            }
        );
    }

    #[test]
    fn combined_layout_is_state_then_user_then_agent() {
        let users = IntentVocabulary::new(["accept", "reject"]).expect("vocab");
        let agents = IntentVocabulary::new(["bye", "welcome"]).expect("vocab");
        let v = encode_combined(
            &DialogueState::beginning(),
            &["reject"],
            &users,
            &["welcome"],
            &agents,
        )
        .expect("encode");
        assert_eq!(
            v,
            vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0]
        );
    }

    #[test]
    fn build_input_length_is_fixed_per_configuration() {
        let plain = FeatureEncoder::default();
        assert_eq!(plain.input_size(), 8);
        let v = plain
            .build_input(&DialogueState::beginning(), &[UserIntent::Hi], NO_AGENT)
            .expect("encode");
        assert_eq!(v.len(), plain.input_size());

        let full = FeatureEncoder::new(EncoderOptions { use_intents: true });
        assert_eq!(full.input_size(), 8 + 12 + 10);
        for (users, agents) in [
            (NO_USER, NO_AGENT),
            (&[UserIntent::Hi, UserIntent::Bye][..], &[AgentIntent::Welcome][..]),
        ] {
            let v = full
                .build_input(&DialogueState::default(), users, agents)
                .expect("encode");
            assert_eq!(v.len(), full.input_size());
        }
    }
}
