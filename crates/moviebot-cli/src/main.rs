//! CLI for moviebot.
//!
//! Provides commands for encoding dialogue turns, creating and querying
//! dialogue policies, and recording and querying user preferences. It serves
//! as the operational interface for the policy and user-model crates.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use moviebot_core::{
    AgentIntent, Decision, DialogueState, EncoderOptions, FeatureEncoder, FeatureVector, Policy,
    PolicyConfig,
};
use moviebot_policies::{AnyPolicy, MlpPolicy, PolicyKind, RulePolicy};
use moviebot_usermodel::{store, Aggregation, Choice, SqliteItemStore, UserModel};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Optional JSON config with encoder and item-store defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a dialogue turn into the policy input vector
    Encode {
        #[command(flatten)]
        turn: TurnArgs,
    },
    /// Create a policy over the agent-intent catalog and save it
    InitPolicy {
        /// Policy variant
        #[arg(long, value_enum, default_value = "rule")]
        kind: KindArg,

        /// Output path of the policy file
        #[arg(long)]
        out: PathBuf,

        /// Hidden layer size (mlp only)
        #[arg(long, default_value = "16")]
        hidden: usize,

        /// Weight initialisation seed (mlp only)
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Exploration rate (mlp only)
        #[arg(long, default_value = "0.0")]
        epsilon: f32,

        /// Size the input for state plus intent encoding
        #[arg(long)]
        use_intents: bool,
    },
    /// Load a policy and select the action for one turn
    Decide {
        /// Path to the policy file
        #[arg(long)]
        policy: PathBuf,

        #[command(flatten)]
        turn: TurnArgs,
    },
    /// Append a choice to a user's history file
    RecordChoice {
        /// Path to the choice history file
        #[arg(long)]
        history: PathBuf,

        /// User id
        #[arg(long, default_value = "default")]
        user: String,

        /// Item id
        #[arg(long)]
        item: String,

        /// Choice label (accept, reject, dont_like, inquire, watched, ...)
        #[arg(long)]
        choice: String,
    },
    /// Compute a user's preference for a tag
    Preference {
        /// Path to the choice history file
        #[arg(long)]
        history: Option<PathBuf>,

        /// User id
        #[arg(long, default_value = "default")]
        user: String,

        /// Path to the SQLite item database
        #[arg(long)]
        db: PathBuf,

        /// Slot (column) to match the tag against
        #[arg(long)]
        slot: String,

        /// Tag to look up
        #[arg(long)]
        tag: String,

        /// How repeated choices on one item are combined
        #[arg(long, value_enum, default_value = "mean")]
        aggregation: AggregationArg,
    },
}

#[derive(Args)]
struct TurnArgs {
    /// Dialogue state JSON file ("-" reads stdin)
    #[arg(long)]
    state: PathBuf,

    /// Append previous user and agent intents to the encoding
    #[arg(long)]
    use_intents: bool,

    /// Previous user intent label (repeatable)
    #[arg(long = "user-intent")]
    user_intents: Vec<String>,

    /// Previous agent intent label (repeatable)
    #[arg(long = "agent-intent")]
    agent_intents: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Rule,
    Mlp,
}

impl From<KindArg> for PolicyKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Rule => PolicyKind::Rule,
            KindArg::Mlp => PolicyKind::Mlp,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum AggregationArg {
    Mean,
    Latest,
}

impl From<AggregationArg> for Aggregation {
    fn from(arg: AggregationArg) -> Self {
        match arg {
            AggregationArg::Mean => Aggregation::Mean,
            AggregationArg::Latest => Aggregation::LatestWins,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
struct AppConfig {
    encoder: EncoderOptions,
    table: String,
    id_column: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderOptions::default(),
            table: store::DEFAULT_TABLE.to_string(),
            id_column: store::DEFAULT_ID_COLUMN.to_string(),
        }
    }
}

impl AppConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let file = File::open(path)
            .with_context(|| format!("Failed to open config {}", path.display()))?;
        serde_json::from_reader(file)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    fn encoder(&self, use_intents: bool) -> FeatureEncoder {
        FeatureEncoder::new(EncoderOptions {
            use_intents: use_intents || self.encoder.use_intents,
        })
    }
}

#[derive(Serialize)]
struct DecisionRecord {
    ts: String,
    policy: PolicyKind,
    input: FeatureVector,
    decision: Decision,
}

fn iso8601_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

fn read_state(path: &Path) -> Result<DialogueState> {
    let mut raw = String::new();
    if path == Path::new("-") {
        io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read dialogue state from stdin")?;
    } else {
        raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dialogue state {}", path.display()))?;
    }
    serde_json::from_str(&raw).context("Dialogue state is not valid JSON")
}

fn encode_turn(encoder: &FeatureEncoder, turn: &TurnArgs) -> Result<FeatureVector> {
    let state = read_state(&turn.state)?;
    encoder
        .build_input(&state, turn.user_intents.as_slice(), turn.agent_intents.as_slice())
        .context("Failed to encode dialogue turn")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    serde_json::to_writer_pretty(io::stdout(), value).context("Failed to write output")?;
    println!();
    Ok(())
}

fn init_policy(
    encoder: &FeatureEncoder,
    kind: PolicyKind,
    hidden: usize,
    seed: u64,
    epsilon: f32,
) -> Result<AnyPolicy> {
    let actions = AgentIntent::ALL.iter().map(|i| i.label());
    let policy: AnyPolicy = match kind {
        PolicyKind::Rule => {
            let config = PolicyConfig::for_actions(encoder.input_size(), 1, actions)?;
            RulePolicy::with_default_rules(config)?.into()
        }
        PolicyKind::Mlp => {
            let config = PolicyConfig::for_actions(encoder.input_size(), hidden, actions)?;
            MlpPolicy::new(config, seed)?.with_epsilon(epsilon).into()
        }
    };
    Ok(policy)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Encode { turn } => {
            let encoder = config.encoder(turn.use_intents);
            let vector = encode_turn(&encoder, &turn)?;
            print_json(&vector)?;
        }
        Commands::InitPolicy {
            kind,
            out,
            hidden,
            seed,
            epsilon,
            use_intents,
        } => {
            let encoder = config.encoder(use_intents);
            let policy = init_policy(&encoder, kind.into(), hidden, seed, epsilon)
                .context("Failed to build policy")?;
            policy
                .save(&out)
                .with_context(|| format!("Failed to save policy to {}", out.display()))?;
            eprintln!(
                "Saved {} policy ({} inputs, {} actions) to {}",
                policy.kind(),
                policy.config().input_size,
                policy.config().output_size,
                out.display()
            );
        }
        Commands::Decide { policy, turn } => {
            let mut loaded = AnyPolicy::load(&policy)
                .with_context(|| format!("Failed to load policy {}", policy.display()))?;
            let encoder = config.encoder(turn.use_intents);
            if encoder.input_size() != loaded.config().input_size {
                anyhow::bail!(
                    "Policy expects {} inputs but the encoder produces {}; check --use-intents",
                    loaded.config().input_size,
                    encoder.input_size()
                );
            }
            let input = encode_turn(&encoder, &turn)?;
            let decision = loaded
                .select_action(&input)
                .context("Failed to select action")?;
            print_json(&DecisionRecord {
                ts: iso8601_now(),
                policy: loaded.kind(),
                input,
                decision,
            })?;
        }
        Commands::RecordChoice {
            history,
            user,
            item,
            choice,
        } => {
            let mut model = UserModel::load(user, Some(history.as_path()))
                .with_context(|| format!("Failed to load history {}", history.display()))?;
            model.record_choice(item.as_str(), Choice::from(choice));
            model
                .save_history(&history)
                .with_context(|| format!("Failed to save history {}", history.display()))?;
            println!("{}", model.get_choices(&item).len());
        }
        Commands::Preference {
            history,
            user,
            db,
            slot,
            tag,
            aggregation,
        } => {
            let model = UserModel::load(user, history.as_deref())
                .context("Failed to load choice history")?
                .with_aggregation(aggregation.into());
            let store = SqliteItemStore::open_table(&db, &config.table, &config.id_column)
                .with_context(|| format!("Failed to open item database {}", db.display()))?;
            let preference = model
                .get_tag_preference(&slot, &tag, &store)
                .context("Failed to compute tag preference")?;
            println!("{preference}");
        }
    }

    Ok(())
}
