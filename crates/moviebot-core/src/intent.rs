//! Intent catalogs for user and agent utterances.
//!
//! Both catalogs are closed enumerations with a stable string label. An
//! [`IntentVocabulary`] fixes the label order used for multi-hot encoding; it
//! is built once at startup and shared by reference afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EncodingError;

macro_rules! intent_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant),+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.label()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = EncodingError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    other => Err(EncodingError::UnknownLabel { label: other.to_string() }),
                }
            }
        }
    };
}

intent_enum! {
    /// Classified purpose of a user utterance.
    UserIntent {
        Unknown => "unknown",
        Reveal => "reveal",
        RemovePreference => "remove_preference",
        Inquire => "inquire",
        Reject => "reject",
        Accept => "accept",
        ContinueRecommendation => "continue_recommendation",
        Restart => "restart",
        Acknowledge => "acknowledge",
        Deny => "deny",
        Hi => "hi",
        Bye => "bye",
    }
}

intent_enum! {
    /// Classified purpose of an agent utterance.
    AgentIntent {
        Welcome => "welcome",
        Restart => "restart",
        Elicit => "elicit",
        CountResults => "count_results",
        Recommend => "recommend",
        NoResults => "no_results",
        Inform => "inform",
        ContinueRecommendation => "continue_recommendation",
        Bye => "bye",
        CantHelp => "cant_help",
    }
}

/// Ordered label set backing multi-hot encoding.
///
/// Labels are sorted and de-duplicated on construction, so position `i`
/// always refers to the `i`-th label in lexicographic order regardless of
/// the order the labels were supplied in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct IntentVocabulary {
    labels: Vec<String>,
}

impl IntentVocabulary {
    /// Builds a vocabulary from an arbitrary label collection.
    ///
    /// # Errors
    /// Returns [`EncodingError::EmptyVocabulary`] when no label is given.
    pub fn new<I, S>(labels: I) -> Result<Self, EncodingError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(EncodingError::EmptyVocabulary);
        }
        labels.sort_unstable();
        labels.dedup();
        Ok(Self { labels })
    }

    /// Vocabulary over every [`UserIntent`].
    #[must_use]
    pub fn user_intents() -> Self {
        Self::from_catalog(UserIntent::ALL.iter().map(|i| i.label()))
    }

    /// Vocabulary over every [`AgentIntent`].
    #[must_use]
    pub fn agent_intents() -> Self {
        Self::from_catalog(AgentIntent::ALL.iter().map(|i| i.label()))
    }

    // Catalogs are non-empty constants.
    fn from_catalog<'a>(labels: impl Iterator<Item = &'a str>) -> Self {
        let mut labels: Vec<String> = labels.map(str::to_string).collect();
        labels.sort_unstable();
        labels.dedup();
        Self { labels }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Position of `label` in the encoded vector.
    ///
    /// # Errors
    /// Returns [`EncodingError::UnknownLabel`] for labels outside the vocabulary.
    pub fn position(&self, label: &str) -> Result<usize, EncodingError> {
        self.labels
            .binary_search_by(|l| l.as_str().cmp(label))
            .map_err(|_| EncodingError::UnknownLabel {
                label: label.to_string(),
            })
    }
}

impl TryFrom<Vec<String>> for IntentVocabulary {
    type Error = EncodingError;

    fn try_from(labels: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(labels)
    }
}

impl From<IntentVocabulary> for Vec<String> {
    fn from(v: IntentVocabulary) -> Self {
        v.labels
    }
}
