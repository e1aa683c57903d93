#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Per-user choice history and derived tag preferences.
//!
//! The choice history is a ledger: choices are appended per item and never
//! removed or replaced. Tag preferences (e.g. how much a user likes
//! comedies) are either set explicitly or derived from that ledger by
//! looking up the matching items in an [`ItemStore`].

pub mod error;
pub mod store;

pub use error::{Result, StoreError, UserModelError};
pub use store::{ItemStore, SqliteItemStore};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// A user's reaction to a recommended item.
///
/// Unknown labels are preserved verbatim in [`Choice::Other`]. The model
/// only ever stores `Other` for labels that are not a known choice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Choice {
    Accept,
    Reject,
    DontLike,
    Inquire,
    Watched,
    Other(String),
}

impl Choice {
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Choice::Accept => "accept",
            Choice::Reject => "reject",
            Choice::DontLike => "dont_like",
            Choice::Inquire => "inquire",
            Choice::Watched => "watched",
            Choice::Other(label) => label,
        }
    }

    /// Folds an `Other` carrying a known label into its named variant.
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Choice::Other(label) => Choice::from(label),
            known => known,
        }
    }

    /// Preference expressed by this choice, in [-1, 1].
    ///
    /// Only `accept` and `reject`/`dont_like` are directional; every other
    /// choice is neutral.
    #[must_use]
    pub fn preference(&self) -> f32 {
        match self {
            Choice::Accept => 1.0,
            Choice::Reject | Choice::DontLike => -1.0,
            Choice::Inquire | Choice::Watched | Choice::Other(_) => 0.0,
        }
    }
}

impl From<String> for Choice {
    fn from(label: String) -> Self {
        match label.as_str() {
            "accept" => Choice::Accept,
            "reject" => Choice::Reject,
            "dont_like" => Choice::DontLike,
            "inquire" => Choice::Inquire,
            "watched" => Choice::Watched,
            _ => Choice::Other(label),
        }
    }
}

impl From<&str> for Choice {
    fn from(label: &str) -> Self {
        Choice::from(label.to_string())
    }
}

impl From<Choice> for String {
    fn from(choice: Choice) -> Self {
        match choice {
            Choice::Other(label) => label,
            known => known.label().to_string(),
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps a choice label to its preference value.
#[must_use]
pub fn choice_to_preference(choice: &str) -> f32 {
    Choice::from(choice).preference()
}

/// How repeated choices on the same item enter a tag preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Mean over every recorded choice event; contradictory choices on one
    /// item are averaged.
    #[default]
    Mean,
    /// Mean over items, each represented by its most recent choice.
    LatestWins,
}

/// Append-only choice history of one item id.
pub type ChoiceHistory = BTreeMap<String, Vec<Choice>>;

/// Choice ledger and tag preferences of a single user.
#[derive(Debug, Clone)]
pub struct UserModel {
    user_id: String,
    choices: ChoiceHistory,
    tag_preferences: HashMap<String, HashMap<String, f32>>,
    aggregation: Aggregation,
}

impl UserModel {
    /// Empty model for `user_id`.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self::with_history(user_id, ChoiceHistory::new())
    }

    /// Model seeded from a prior history snapshot.
    #[must_use]
    pub fn with_history(user_id: impl Into<String>, history: ChoiceHistory) -> Self {
        let choices: ChoiceHistory = history
            .into_iter()
            .map(|(item, list)| {
                let list = list.into_iter().map(Choice::normalized).collect::<Vec<_>>();
                (item, list)
            })
            .collect();
        Self {
            user_id: user_id.into(),
            choices,
            tag_preferences: HashMap::new(),
            aggregation: Aggregation::default(),
        }
    }

    /// Loads the history snapshot at `path` if one exists.
    ///
    /// A missing path starts with empty history.
    ///
    /// # Errors
    /// Returns [`UserModelError::Io`] or [`UserModelError::Json`] when an
    /// existing file cannot be read or parsed.
    pub fn load(user_id: impl Into<String>, path: Option<&Path>) -> Result<Self> {
        let user_id = user_id.into();
        let history = match path {
            Some(path) if path.exists() => {
                let file = File::open(path)?;
                let history: ChoiceHistory = serde_json::from_reader(BufReader::new(file))?;
                tracing::info!(user = %user_id, items = history.len(), "choice history loaded");
                history
            }
            Some(path) => {
                tracing::warn!(
                    user = %user_id,
                    path = %path.display(),
                    "no choice history found, starting empty"
                );
                ChoiceHistory::new()
            }
            None => ChoiceHistory::new(),
        };
        Ok(Self::with_history(user_id, history))
    }

    /// Writes the history in the shape [`UserModel::load`] reads.
    ///
    /// # Errors
    /// Returns I/O or serialization failures.
    pub fn save_history(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.choices)?;
        Ok(())
    }

    #[must_use]
    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    /// Whole ledger, keyed by item id.
    #[must_use]
    pub fn choices(&self) -> &ChoiceHistory {
        &self.choices
    }

    /// Appends `choice` to the history of `item_id`.
    pub fn record_choice(&mut self, item_id: impl Into<String>, choice: impl Into<Choice>) {
        self.choices
            .entry(item_id.into())
            .or_default()
            .push(choice.into().normalized());
    }

    /// Appends every listed choice, item by item, in the given order.
    pub fn record_choices(&mut self, choices: ChoiceHistory) {
        for (item_id, history) in choices {
            self.choices
                .entry(item_id)
                .or_default()
                .extend(history.into_iter().map(Choice::normalized));
        }
    }

    /// Recorded history of `item_id`, oldest first; empty if none.
    #[must_use]
    pub fn get_choices(&self, item_id: &str) -> &[Choice] {
        self.choices.get(item_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Derives the preference for `tag` on `slot` from the choice history.
    ///
    /// Returns `0.0` when no matching item has recorded choices.
    ///
    /// # Errors
    /// Propagates [`StoreError`]s from the item lookup.
    pub fn compute_tag_preference<S: ItemStore + ?Sized>(
        &self,
        slot: &str,
        tag: &str,
        store: &S,
    ) -> Result<f32> {
        let matching = store.matching_items(slot, tag)?;
        let mut total = 0.0_f32;
        let mut count = 0_usize;
        for (item_id, history) in &self.choices {
            if !matching.contains(item_id) {
                continue;
            }
            match self.aggregation {
                Aggregation::Mean => {
                    total += history.iter().map(Choice::preference).sum::<f32>();
                    count += history.len();
                }
                Aggregation::LatestWins => {
                    if let Some(latest) = history.last() {
                        total += latest.preference();
                        count += 1;
                    }
                }
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let preference = if count > 0 { total / count as f32 } else { 0.0 };
        tracing::debug!(
            user = %self.user_id,
            slot,
            tag,
            events = count,
            preference,
            "tag preference computed"
        );
        Ok(preference)
    }

    /// Explicitly set preference for `tag` on `slot`, or the computed one.
    ///
    /// Computed values are not cached.
    ///
    /// # Errors
    /// Propagates [`StoreError`]s when the value has to be computed.
    pub fn get_tag_preference<S: ItemStore + ?Sized>(
        &self,
        slot: &str,
        tag: &str,
        store: &S,
    ) -> Result<f32> {
        match self.cached_tag_preference(slot, tag) {
            Some(preference) => Ok(preference),
            None => self.compute_tag_preference(slot, tag, store),
        }
    }

    #[must_use]
    pub fn cached_tag_preference(&self, slot: &str, tag: &str) -> Option<f32> {
        self.tag_preferences
            .get(slot)
            .and_then(|tags| tags.get(tag))
            .copied()
    }

    /// Overwrites the cached preference; `preference` is stored as given.
    pub fn set_tag_preference(
        &mut self,
        slot: impl Into<String>,
        tag: impl Into<String>,
        preference: f32,
    ) {
        self.tag_preferences
            .entry(slot.into())
            .or_default()
            .insert(tag.into(), preference);
    }
}
