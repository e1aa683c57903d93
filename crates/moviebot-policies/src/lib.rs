#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Konkrete Dialog-Policies für moviebot.
//!
//! Beide Varianten implementieren das [`Policy`](moviebot_core::Policy)-Trait:
//! die [`RulePolicy`] als deterministisches Regelwerk über den Zustands-Flags,
//! die [`MlpPolicy`] als Perzeptron mit einer versteckten Schicht. Über
//! [`AnyPolicy`] wird die Variante beim Erzeugen bzw. Laden ausgewählt.

pub mod mlp;
pub mod rule;

pub use mlp::{MlpPolicy, MlpWeights};
pub use rule::{Rule, RulePolicy};

use moviebot_core::{
    Decision, FeatureVector, Policy, PolicyConfig, PolicyError, PolicySnapshot, Result,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Verfügbare Policy-Varianten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Rule,
    Mlp,
}

impl PolicyKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyKind::Rule => rule::KIND,
            PolicyKind::Mlp => mlp::KIND,
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            rule::KIND => Ok(PolicyKind::Rule),
            mlp::KIND => Ok(PolicyKind::Mlp),
            other => Err(PolicyError::Format(format!("unknown policy kind {other:?}"))),
        }
    }
}

/// Zur Laufzeit gewählte Policy-Variante.
#[derive(Debug, Clone)]
pub enum AnyPolicy {
    Rule(RulePolicy),
    Mlp(MlpPolicy),
}

impl AnyPolicy {
    #[must_use]
    pub fn kind(&self) -> PolicyKind {
        match self {
            AnyPolicy::Rule(_) => PolicyKind::Rule,
            AnyPolicy::Mlp(_) => PolicyKind::Mlp,
        }
    }

    /// Lädt einen Snapshot beliebiger Variante anhand seines `kind`-Tags.
    ///
    /// # Errors
    /// [`PolicyError::Format`] für unbekannte Varianten, sonst wie
    /// [`Policy::load`].
    pub fn from_snapshot(snapshot: PolicySnapshot) -> Result<Self> {
        match snapshot.kind.parse::<PolicyKind>()? {
            PolicyKind::Rule => RulePolicy::from_snapshot(snapshot).map(AnyPolicy::Rule),
            PolicyKind::Mlp => MlpPolicy::from_snapshot(snapshot).map(AnyPolicy::Mlp),
        }
    }
}

impl From<RulePolicy> for AnyPolicy {
    fn from(p: RulePolicy) -> Self {
        AnyPolicy::Rule(p)
    }
}

impl From<MlpPolicy> for AnyPolicy {
    fn from(p: MlpPolicy) -> Self {
        AnyPolicy::Mlp(p)
    }
}

impl Policy for AnyPolicy {
    fn config(&self) -> &PolicyConfig {
        match self {
            AnyPolicy::Rule(p) => p.config(),
            AnyPolicy::Mlp(p) => p.config(),
        }
    }

    fn score(&self, input: &[f32]) -> Result<FeatureVector> {
        match self {
            AnyPolicy::Rule(p) => p.score(input),
            AnyPolicy::Mlp(p) => p.score(input),
        }
    }

    fn select_action(&mut self, input: &[f32]) -> Result<Decision> {
        match self {
            AnyPolicy::Rule(p) => p.select_action(input),
            AnyPolicy::Mlp(p) => p.select_action(input),
        }
    }

    fn save(&self, path: &Path) -> Result<()> {
        match self {
            AnyPolicy::Rule(p) => p.save(path),
            AnyPolicy::Mlp(p) => p.save(path),
        }
    }

    fn load(path: &Path) -> Result<Self> {
        Self::from_snapshot(PolicySnapshot::read(path)?)
    }
}
