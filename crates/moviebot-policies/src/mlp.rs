//! Perzeptron-Policy mit einer versteckten Schicht.
//!
//! Vorwärtsrechnung: `softmax(W2 · tanh(W1 · x + b1) + b2)`. Die Gewichte
//! werden aus einem Seed initialisiert oder aus einem Snapshot geladen; das
//! Training findet außerhalb dieses Crates statt. Die Aktionswahl ist greedy
//! oder ε-greedy.

use moviebot_core::{
    argmax, Decision, FeatureVector, Policy, PolicyConfig, PolicyError, PolicySnapshot, Result,
};
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const KIND: &str = "mlp";

/// Gewichte in Zeilen-Layout: `w1[h][i]`, `w2[o][h]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpWeights {
    pub w1: Vec<Vec<f32>>,
    pub b1: Vec<f32>,
    pub w2: Vec<Vec<f32>>,
    pub b2: Vec<f32>,
}

impl MlpWeights {
    /// Gleichverteilte Initialisierung nach Glorot.
    #[must_use]
    pub fn seeded(config: &PolicyConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut layer = |rows: usize, cols: usize| -> Vec<Vec<f32>> {
            #[allow(clippy::cast_precision_loss)]
            let limit = (6.0 / (rows + cols) as f32).sqrt();
            (0..rows)
                .map(|_| (0..cols).map(|_| rng.gen_range(-limit..limit)).collect())
                .collect()
        };
        let w1 = layer(config.hidden_size, config.input_size);
        let w2 = layer(config.output_size, config.hidden_size);
        Self {
            w1,
            b1: vec![0.0; config.hidden_size],
            w2,
            b2: vec![0.0; config.output_size],
        }
    }

    fn check_shape(&self, config: &PolicyConfig) -> Result<()> {
        let ok = self.w1.len() == config.hidden_size
            && self.w1.iter().all(|row| row.len() == config.input_size)
            && self.b1.len() == config.hidden_size
            && self.w2.len() == config.output_size
            && self.w2.iter().all(|row| row.len() == config.hidden_size)
            && self.b2.len() == config.output_size;
        if !ok {
            return Err(PolicyError::Format(format!(
                "weights do not match {}x{}x{} network",
                config.input_size, config.hidden_size, config.output_size
            )));
        }
        let finite = self
            .w1
            .iter()
            .chain(&self.w2)
            .flatten()
            .chain(&self.b1)
            .chain(&self.b2)
            .all(|v| v.is_finite());
        if finite {
            Ok(())
        } else {
            Err(PolicyError::Format("weights contain non-finite values".to_string()))
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MlpParams {
    epsilon: f32,
    weights: MlpWeights,
}

fn affine(weights: &[Vec<f32>], bias: &[f32], input: &[f32]) -> Vec<f32> {
    weights
        .iter()
        .zip(bias)
        .map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>() + b)
        .collect()
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

fn sanitize_epsilon(epsilon: f32) -> f32 {
    if epsilon.is_finite() {
        epsilon.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
pub struct MlpPolicy {
    config: PolicyConfig,
    weights: MlpWeights,
    /// Wahrscheinlichkeit für Explorationsschritte, auf [0.0, 1.0] begrenzt.
    epsilon: f32,
}

impl MlpPolicy {
    /// Neue Policy mit Seed-initialisierten Gewichten und greedy Auswahl.
    ///
    /// # Errors
    /// [`PolicyError::Config`] für ungültige Konfigurationen.
    pub fn new(config: PolicyConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let weights = MlpWeights::seeded(&config, seed);
        Ok(Self {
            config,
            weights,
            epsilon: 0.0,
        })
    }

    /// # Errors
    /// [`PolicyError::Config`] für ungültige Konfigurationen,
    /// [`PolicyError::Format`] für Gewichte in falscher Form.
    pub fn from_weights(config: PolicyConfig, weights: MlpWeights) -> Result<Self> {
        config.validate()?;
        weights.check_shape(&config)?;
        Ok(Self {
            config,
            weights,
            epsilon: 0.0,
        })
    }

    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = sanitize_epsilon(epsilon);
        self
    }

    #[must_use]
    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    #[must_use]
    pub fn weights(&self) -> &MlpWeights {
        &self.weights
    }

    /// # Errors
    /// [`PolicyError::Format`] bei fremdem `kind` oder unpassenden Gewichten.
    pub fn from_snapshot(snapshot: PolicySnapshot) -> Result<Self> {
        snapshot.expect_kind(KIND)?;
        let params: MlpParams = serde_json::from_value(snapshot.params)?;
        params.weights.check_shape(&snapshot.config)?;
        Ok(Self {
            config: snapshot.config,
            weights: params.weights,
            epsilon: sanitize_epsilon(params.epsilon),
        })
    }
}

impl Policy for MlpPolicy {
    fn config(&self) -> &PolicyConfig {
        &self.config
    }

    fn score(&self, input: &[f32]) -> Result<FeatureVector> {
        self.config.check_input(input)?;
        let hidden: Vec<f32> = affine(&self.weights.w1, &self.weights.b1, input)
            .into_iter()
            .map(f32::tanh)
            .collect();
        Ok(softmax(&affine(&self.weights.w2, &self.weights.b2, &hidden)))
    }

    /// Wählt per ε-greedy: mit Wahrscheinlichkeit `epsilon` eine zufällige
    /// Katalog-Aktion, sonst die mit der höchsten Wahrscheinlichkeit.
    fn select_action(&mut self, input: &[f32]) -> Result<Decision> {
        let scores = self.score(input)?;
        let mut rng = thread_rng();
        let explore = self.epsilon > 0.0 && rng.gen::<f32>() < self.epsilon;
        let index = if explore {
            rng.gen_range(0..self.config.output_size)
        } else {
            argmax(&scores).map_or(0, |(i, _)| i)
        };
        if explore {
            tracing::warn!(action = %self.config.actions[index], "exploration step");
        }
        Ok(Decision {
            action: self.config.actions[index].clone(),
            index,
            score: scores[index],
            why: if explore { "explore ε" } else { "exploit argmax" }.into(),
            scores,
        })
    }

    fn save(&self, path: &Path) -> Result<()> {
        let params = MlpParams {
            epsilon: self.epsilon,
            weights: self.weights.clone(),
        };
        PolicySnapshot {
            kind: KIND.to_string(),
            config: self.config.clone(),
            params: serde_json::to_value(&params)?,
        }
        .write(path)
    }

    fn load(path: &Path) -> Result<Self> {
        Self::from_snapshot(PolicySnapshot::read(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PolicyConfig {
        PolicyConfig::for_actions(4, 3, ["a", "b", "c"]).unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn scores_form_a_distribution() {
        let p = MlpPolicy::new(config(), 7).unwrap_or_else(|e| panic!("{e}"));
        let scores = p.score(&[1.0, 0.0, 0.5, 0.0]).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(scores.len(), 3);
        assert!((scores.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn same_seed_same_weights() {
        let a = MlpPolicy::new(config(), 42).unwrap_or_else(|e| panic!("{e}"));
        let b = MlpPolicy::new(config(), 42).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(a.weights(), b.weights());
    }

    #[test]
    fn greedy_selection_takes_argmax() {
        let weights = MlpWeights {
            w1: vec![vec![1.0, 0.0, 0.0, 0.0]; 3],
            b1: vec![0.0; 3],
            w2: vec![vec![0.0; 3], vec![1.0, 1.0, 1.0], vec![-1.0, 0.0, 0.0]],
            b2: vec![0.0; 3],
        };
        let mut p = MlpPolicy::from_weights(config(), weights).unwrap_or_else(|e| panic!("{e}"));
        let d = p.select_action(&[1.0, 0.0, 0.0, 0.0]).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(d.action, "b");
        assert_eq!(d.index, 1);
        assert_eq!(d.why, "exploit argmax");
    }

    #[test]
    fn exploration_stays_inside_catalog() {
        let mut p = MlpPolicy::new(config(), 1)
            .unwrap_or_else(|e| panic!("{e}"))
            .with_epsilon(1.0);
        for _ in 0..50 {
            let d = p.select_action(&[0.0; 4]).unwrap_or_else(|e| panic!("{e}"));
            assert!(["a", "b", "c"].contains(&d.action.as_str()));
            assert_eq!(d.why, "explore ε");
        }
    }

    #[test]
    fn epsilon_is_clamped() {
        let p = MlpPolicy::new(config(), 1).unwrap_or_else(|e| panic!("{e}"));
        assert!((p.clone().with_epsilon(3.0).epsilon() - 1.0).abs() < f32::EPSILON);
        assert!(p.with_epsilon(f32::NAN).epsilon().abs() < f32::EPSILON);
    }

    #[test]
    fn misshapen_weights_are_rejected() {
        let mut weights = MlpWeights::seeded(&config(), 3);
        weights.w2.pop();
        assert!(matches!(
            MlpPolicy::from_weights(config(), weights),
            Err(PolicyError::Format(_))
        ));
    }

    #[test]
    fn non_finite_weights_are_rejected() {
        let mut weights = MlpWeights::seeded(&config(), 3);
        weights.w1[0][0] = f32::NAN;
        assert!(matches!(
            MlpPolicy::from_weights(config(), weights),
            Err(PolicyError::Format(_))
        ));

        let mut weights = MlpWeights::seeded(&config(), 3);
        weights.b2[0] = f32::INFINITY;
        assert!(matches!(
            MlpPolicy::from_weights(config(), weights),
            Err(PolicyError::Format(_))
        ));
    }
}
