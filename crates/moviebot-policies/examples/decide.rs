//! Reads a dialogue state as JSON from stdin and prints a decision record.
//!
//! Run with: echo '{"is_beginning":true}' | cargo run -p moviebot-policies --example decide

use std::io::{self, Read};

use moviebot_core::{AgentIntent, Decision, DialogueState, FeatureEncoder, Policy, UserIntent};
use moviebot_policies::RulePolicy;
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

#[derive(Serialize)]
struct PolicyDecisionRecord {
    ts: String,
    policy: String,
    state: DialogueState,
    decision: Decision,
}

fn iso8601_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    let state = if input.trim().is_empty() {
        DialogueState::beginning()
    } else {
        serde_json::from_str::<DialogueState>(&input)?
    };

    let encoder = FeatureEncoder::default();
    let mut policy = RulePolicy::for_agent_intents(encoder.input_size())?;
    let decision =
        policy.select_action_for_state::<UserIntent, AgentIntent>(&encoder, &state, &[], &[])?;

    let record = PolicyDecisionRecord {
        ts: iso8601_now(),
        policy: "moviebot-policies/rule".to_string(),
        state,
        decision,
    };

    serde_json::to_writer_pretty(io::stdout(), &record)?;
    println!();

    Ok(())
}
