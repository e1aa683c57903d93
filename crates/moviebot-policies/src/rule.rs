//! Deterministische Regel-Policy.
//!
//! Die `RulePolicy` prüft eine geordnete Liste von Regeln gegen die
//! Zustands-Flags des Eingabevektors. Die erste feuernde Regel bestimmt die
//! Aktion; feuert keine, greift die Fallback-Aktion.

use moviebot_core::{
    argmax, AgentIntent, Decision, FeatureVector, Policy, PolicyConfig, PolicyError,
    PolicySnapshot, Result, STATE_FLAG_COUNT, STATE_FLAG_NAMES,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const KIND: &str = "rule";

/// Eingabewerte oberhalb dieser Schwelle gelten als gesetztes Flag.
const FLAG_THRESHOLD: f32 = 0.5;

/// Eine Regel: Flag an Position `flag` gesetzt → `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub flag: usize,
    pub action: String,
}

impl Rule {
    #[must_use]
    pub fn new(flag: usize, action: impl Into<String>) -> Self {
        Self {
            flag,
            action: action.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RuleParams {
    rules: Vec<Rule>,
    fallback: String,
}

#[derive(Debug, Clone)]
pub struct RulePolicy {
    config: PolicyConfig,
    params: RuleParams,
    fallback: usize,
}

impl RulePolicy {
    /// Baut eine Regel-Policy und prüft alle Regeln gegen die Konfiguration.
    ///
    /// # Errors
    /// [`PolicyError::Config`], wenn eine Regel auf ein Flag außerhalb des
    /// Eingabevektors oder auf eine Aktion außerhalb des Katalogs zeigt.
    pub fn new(
        config: PolicyConfig,
        rules: Vec<Rule>,
        fallback: impl Into<String>,
    ) -> Result<Self> {
        config.validate()?;
        let fallback = fallback.into();
        let fallback_index = config
            .action_index(&fallback)
            .ok_or_else(|| {
                PolicyError::Config(format!("fallback {fallback:?} not in catalog"))
            })?;
        for rule in &rules {
            if rule.flag >= config.input_size {
                return Err(PolicyError::Config(format!(
                    "rule flag {} outside input of size {}",
                    rule.flag, config.input_size
                )));
            }
            if config.action_index(&rule.action).is_none() {
                return Err(PolicyError::Config(format!(
                    "rule action {:?} not in catalog",
                    rule.action
                )));
            }
        }
        Ok(Self {
            config,
            params: RuleParams { rules, fallback },
            fallback: fallback_index,
        })
    }

    /// Standard-Regelwerk über den Zustands-Flags; der Katalog muss die
    /// betroffenen Agent-Intents enthalten.
    ///
    /// # Errors
    /// Wie [`RulePolicy::new`].
    pub fn with_default_rules(config: PolicyConfig) -> Result<Self> {
        let flag = |name: &str| STATE_FLAG_NAMES.iter().position(|n| *n == name).unwrap_or(0);
        let rules = vec![
            Rule::new(flag("is_beginning"), AgentIntent::Welcome.label()),
            Rule::new(flag("at_terminal_state"), AgentIntent::Bye.label()),
            Rule::new(flag("agent_offer_no_results"), AgentIntent::NoResults.label()),
            Rule::new(flag("agent_should_make_offer"), AgentIntent::Recommend.label()),
            Rule::new(
                flag("agent_made_offer"),
                AgentIntent::ContinueRecommendation.label(),
            ),
        ];
        Self::new(config, rules, AgentIntent::Elicit.label())
    }

    /// Regel-Policy über alle Agent-Intents mit dem Standard-Regelwerk.
    ///
    /// # Errors
    /// Wie [`RulePolicy::new`].
    pub fn for_agent_intents(input_size: usize) -> Result<Self> {
        let config = PolicyConfig::for_actions(
            input_size.max(STATE_FLAG_COUNT),
            1,
            AgentIntent::ALL.iter().map(|i| i.label()),
        )?;
        Self::with_default_rules(config)
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.params.rules
    }

    /// # Errors
    /// [`PolicyError::Format`] bei fremdem `kind` oder unpassenden Regeln.
    pub fn from_snapshot(snapshot: PolicySnapshot) -> Result<Self> {
        snapshot.expect_kind(KIND)?;
        let params: RuleParams = serde_json::from_value(snapshot.params)?;
        Self::new(snapshot.config, params.rules, params.fallback)
            .map_err(|e| PolicyError::Format(e.to_string()))
    }

    fn firing_rule(&self, input: &[f32]) -> Option<&Rule> {
        self.params
            .rules
            .iter()
            .find(|rule| input[rule.flag] > FLAG_THRESHOLD)
    }

    // Regelaktionen sind bei der Konstruktion gegen den Katalog geprüft.
    fn target(&self, input: &[f32]) -> usize {
        self.firing_rule(input)
            .and_then(|rule| self.config.action_index(&rule.action))
            .unwrap_or(self.fallback)
    }
}

impl Policy for RulePolicy {
    fn config(&self) -> &PolicyConfig {
        &self.config
    }

    fn score(&self, input: &[f32]) -> Result<FeatureVector> {
        self.config.check_input(input)?;
        let mut scores = vec![0.0; self.config.output_size];
        scores[self.target(input)] = 1.0;
        Ok(scores)
    }

    fn select_action(&mut self, input: &[f32]) -> Result<Decision> {
        let scores = self.score(input)?;
        let (index, score) = argmax(&scores).unwrap_or((self.fallback, 0.0));
        let why = match self.firing_rule(input) {
            Some(rule) => format!(
                "rule {}",
                STATE_FLAG_NAMES
                    .get(rule.flag)
                    .copied()
                    .unwrap_or("custom flag")
            ),
            None => "fallback".to_string(),
        };
        tracing::debug!(action = %self.config.actions[index], %why, "rule policy decided");
        Ok(Decision {
            action: self.config.actions[index].clone(),
            index,
            score,
            scores,
            why,
        })
    }

    fn save(&self, path: &Path) -> Result<()> {
        PolicySnapshot {
            kind: KIND.to_string(),
            config: self.config.clone(),
            params: serde_json::to_value(&self.params)?,
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
    use moviebot_core::{encode_state, DialogueState};

    fn policy() -> RulePolicy {
        RulePolicy::for_agent_intents(STATE_FLAG_COUNT).unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn beginning_is_welcomed() {
        let mut p = policy();
        let d = p
            .select_action(&encode_state(&DialogueState::beginning()))
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(d.action, "welcome");
        assert_eq!(d.why, "rule is_beginning");
        assert!((d.score - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn first_matching_rule_wins() {
        let mut p = policy();
        let state = DialogueState {
            agent_should_make_offer: true,
            at_terminal_state: true,
            ..DialogueState::default()
        };
        let d = p.select_action(&encode_state(&state)).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(d.action, "bye");
    }

    #[test]
    fn no_flag_falls_back_to_elicit() {
        let mut p = policy();
        let d = p
            .select_action(&encode_state(&DialogueState::default()))
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(d.action, "elicit");
        assert_eq!(d.why, "fallback");
    }

    #[test]
    fn rules_outside_catalog_are_rejected() {
        let config = PolicyConfig::for_actions(8, 1, ["welcome", "bye"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(RulePolicy::new(config.clone(), vec![Rule::new(0, "dance")], "bye").is_err());
        assert!(RulePolicy::new(config.clone(), vec![Rule::new(9, "bye")], "bye").is_err());
        assert!(RulePolicy::new(config, vec![], "elicit").is_err());
    }

    #[test]
    fn reloaded_rules_decide_like_the_original() {
        let path = std::env::temp_dir().join(format!(
            "moviebot-rule-reload-{}.json",
            std::process::id()
        ));
        let mut original = policy();
        original.save(&path).unwrap_or_else(|e| panic!("{e}"));
        let mut reloaded = RulePolicy::load(&path).unwrap_or_else(|e| panic!("{e}"));
        let _ = std::fs::remove_file(&path);
        assert_eq!(reloaded.rules(), original.rules());
        let state = DialogueState {
            agent_offer_no_results: true,
            ..DialogueState::default()
        };
        let input = encode_state(&state);
        let a = original.select_action(&input).unwrap_or_else(|e| panic!("{e}"));
        let b = reloaded.select_action(&input).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(a.action, "no_results");
        assert_eq!(a.action, b.action);
        assert_eq!(a.why, b.why);
    }

    #[test]
    fn wrong_input_length_is_dimension_error() {
        let p = policy();
        assert!(matches!(
            p.score(&[1.0, 0.0]),
            Err(PolicyError::Dimension { expected: 8, actual: 2 })
        ));
    }
}
