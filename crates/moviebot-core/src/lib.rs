#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Core types for the moviebot dialogue policy: intent vocabularies, the
//! dialogue state snapshot, feature encoding and the [`Policy`] contract.

pub mod encoder;
pub mod error;
pub mod intent;
pub mod policy;
pub mod state;

pub use encoder::{
    encode_combined, encode_intents, encode_state, EncoderOptions, FeatureEncoder, FeatureVector,
};
pub use error::{EncodingError, PolicyError, Result};
pub use intent::{AgentIntent, IntentVocabulary, UserIntent};
pub use policy::{argmax, Decision, Policy, PolicyConfig, PolicySnapshot};
pub use state::{DialogueState, STATE_FLAG_COUNT, STATE_FLAG_NAMES};
