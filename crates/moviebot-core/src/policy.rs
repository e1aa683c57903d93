//! The dialogue policy contract.
//!
//! A [`Policy`] maps one encoded turn to a score per action of its catalog
//! and resolves those scores to exactly one catalog member. Implementations
//! are stateless with respect to conversation history; anything about
//! earlier turns has to be folded into the input vector by the caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::encoder::{FeatureEncoder, FeatureVector};
use crate::error::{PolicyError, Result};
use crate::state::DialogueState;

/// Shape of a policy and its ordered action catalog.
///
/// Output index `i` always refers to `actions[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    pub output_size: usize,
    pub actions: Vec<String>,
}

impl PolicyConfig {
    /// Builds and validates a configuration whose output size is the
    /// catalog length.
    ///
    /// # Errors
    /// See [`PolicyConfig::validate`].
    pub fn for_actions(
        input_size: usize,
        hidden_size: usize,
        actions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self> {
        let actions: Vec<String> = actions.into_iter().map(Into::into).collect();
        let config = Self {
            input_size,
            hidden_size,
            output_size: actions.len(),
            actions,
        };
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns [`PolicyError::Config`] for zero sizes, an empty or duplicated
    /// catalog, or an output size that differs from the catalog length.
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(PolicyError::Config("input_size must be positive".into()));
        }
        if self.hidden_size == 0 {
            return Err(PolicyError::Config("hidden_size must be positive".into()));
        }
        if self.actions.is_empty() {
            return Err(PolicyError::Config("action catalog is empty".into()));
        }
        if self.output_size != self.actions.len() {
            return Err(PolicyError::Config(format!(
                "output_size {} does not match {} catalog actions",
                self.output_size,
                self.actions.len()
            )));
        }
        let mut seen = HashSet::with_capacity(self.actions.len());
        if let Some(dup) = self.actions.iter().find(|a| !seen.insert(a.as_str())) {
            return Err(PolicyError::Config(format!("duplicate action {dup:?}")));
        }
        Ok(())
    }

    /// Catalog index of `action`.
    #[must_use]
    pub fn action_index(&self, action: &str) -> Option<usize> {
        self.actions.iter().position(|a| a == action)
    }

    /// # Errors
    /// Returns [`PolicyError::Dimension`] unless `input` has `input_size` elements.
    pub fn check_input(&self, input: &[f32]) -> Result<()> {
        if input.len() == self.input_size {
            Ok(())
        } else {
            Err(PolicyError::Dimension {
                expected: self.input_size,
                actual: input.len(),
            })
        }
    }
}

/// Selected action plus explanation data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: String,
    pub index: usize,
    /// Score of the chosen action.
    pub score: f32,
    /// Full score vector in catalog order.
    pub scores: Vec<f32>,
    pub why: String,
}

/// Index and value of the highest score; the first index wins ties.
#[must_use]
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
}

/// Persisted form shared by all policy variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub kind: String,
    pub config: PolicyConfig,
    pub params: Value,
}

impl PolicySnapshot {
    /// # Errors
    /// Returns [`PolicyError::Io`] or [`PolicyError::Snapshot`] if writing fails.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        tracing::info!(path = %path.display(), kind = %self.kind, "policy saved");
        Ok(())
    }

    /// Reads a snapshot and re-validates its configuration.
    ///
    /// # Errors
    /// Returns [`PolicyError::Io`] for unreadable files,
    /// [`PolicyError::Snapshot`] for malformed JSON and [`PolicyError::Format`]
    /// when the stored configuration is inconsistent.
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let snapshot: Self = serde_json::from_reader(BufReader::new(file))?;
        snapshot
            .config
            .validate()
            .map_err(|e| PolicyError::Format(e.to_string()))?;
        tracing::info!(path = %path.display(), kind = %snapshot.kind, "policy loaded");
        Ok(snapshot)
    }

    /// # Errors
    /// Returns [`PolicyError::Format`] if the snapshot belongs to another variant.
    pub fn expect_kind(&self, kind: &str) -> Result<()> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(PolicyError::Format(format!(
                "expected policy kind {kind:?}, found {:?}",
                self.kind
            )))
        }
    }
}

/// Decision-making strategy over a fixed action catalog.
pub trait Policy {
    /// Configuration fixed at construction.
    fn config(&self) -> &PolicyConfig;

    /// Scores every catalog action for one input vector.
    ///
    /// # Errors
    /// Returns [`PolicyError::Dimension`] for inputs of the wrong length.
    fn score(&self, input: &[f32]) -> Result<FeatureVector>;

    /// Scores a batch, preserving order and batch size.
    ///
    /// # Errors
    /// Fails on the first input [`Policy::score`] rejects.
    fn score_batch(&self, inputs: &[FeatureVector]) -> Result<Vec<FeatureVector>> {
        inputs.iter().map(|input| self.score(input)).collect()
    }

    /// Resolves an input vector to exactly one catalog action.
    ///
    /// # Errors
    /// Returns [`PolicyError::Dimension`] for inputs of the wrong length.
    fn select_action(&mut self, input: &[f32]) -> Result<Decision>;

    /// Encodes a raw turn with `encoder`, then selects.
    ///
    /// # Errors
    /// Propagates encoding errors and [`Policy::select_action`] failures.
    fn select_action_for_state<U: AsRef<str>, A: AsRef<str>>(
        &mut self,
        encoder: &FeatureEncoder,
        state: &DialogueState,
        user_intents: &[U],
        agent_intents: &[A],
    ) -> Result<Decision>
    where
        Self: Sized,
    {
        let input = encoder.build_input(state, user_intents, agent_intents)?;
        self.select_action(&input)
    }

    /// Persists everything needed to reproduce [`Policy::score`].
    ///
    /// # Errors
    /// Returns I/O or serialization failures.
    fn save(&self, path: &Path) -> Result<()>;

    /// Restores a policy written by [`Policy::save`].
    ///
    /// # Errors
    /// Returns [`PolicyError::Io`] for missing files and
    /// [`PolicyError::Snapshot`]/[`PolicyError::Format`] for corrupt ones.
    fn load(path: &Path) -> Result<Self>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_size_must_match_catalog() {
        let config = PolicyConfig {
            input_size: 8,
            hidden_size: 4,
            output_size: 3,
            actions: vec!["welcome".into(), "bye".into()],
        };
        assert!(matches!(config.validate(), Err(PolicyError::Config(_))));
    }

    #[test]
    fn duplicate_and_empty_catalogs_are_rejected() {
        assert!(PolicyConfig::for_actions(8, 4, ["bye", "bye"]).is_err());
        assert!(PolicyConfig::for_actions(8, 4, Vec::<String>::new()).is_err());
        assert!(PolicyConfig::for_actions(0, 4, ["bye"]).is_err());
    }

    #[test]
    fn check_input_reports_dimensions() {
        let config = PolicyConfig::for_actions(3, 2, ["a", "b"]).expect("config");
        assert!(config.check_input(&[0.0, 1.0, 0.0]).is_ok());
        match config.check_input(&[0.0]) {
            Err(PolicyError::Dimension { expected, actual }) => {
                assert_eq!((expected, actual), (3, 1));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.2, 0.7, 0.7]), Some((1, 0.7)));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn snapshot_read_rejects_inconsistent_config() {
        let path = std::env::temp_dir().join(format!(
            "moviebot_core_bad_snapshot_{}.json",
            std::process::id()
        ));
        std::fs::write(
            &path,
            serde_json::json!({
                "kind": "rule",
                "config": {"input_size": 8, "hidden_size": 1, "output_size": 5, "actions": ["bye"]},
                "params": null
            })
            .to_string(),
        )
        .unwrap_or_else(|e| panic!("write fixture: {e}"));
        assert!(matches!(
            PolicySnapshot::read(&path),
            Err(PolicyError::Format(_))
        ));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn snapshot_read_of_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("moviebot_core_missing_policy.json");
        assert!(matches!(
            PolicySnapshot::read(&path),
            Err(PolicyError::Io(_))
        ));
    }
}
