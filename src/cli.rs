use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "beacon")]
#[command(version)]
#[command(about = "Manage Beacon teams, services and alerting from declarative config", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/beacon/beacon.toml)
    #[arg(long, global = true, env = "BEACON_CONFIG")]
    pub config: Option<PathBuf>,

    /// State file (default: ~/.local/state/beacon/state.json)
    #[arg(long, global = true, env = "BEACON_STATE")]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan(TargetArgs),

    /// Create, update and delete remote objects to match the config
    Apply(ApplyArgs),

    /// Delete every tracked object (or the targeted ones)
    Destroy(ApplyArgs),

    /// Re-read tracked objects and update the state file
    Refresh(RefreshArgs),

    /// Start tracking an existing remote object
    Import(ImportArgs),

    /// Inspect or edit the state file
    #[command(subcommand)]
    State(StateCommand),

    /// List resource kinds
    Kinds,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct TargetArgs {
    /// Limit to a kind or one instance: <kind> or <kind>.<name>
    #[arg(short, long)]
    pub target: Option<String>,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Limit to a kind or one instance: <kind> or <kind>.<name>
    #[arg(short, long)]
    pub target: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Instances applied in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Deadline for the whole run, e.g. "5m" or "90s"
    #[arg(long)]
    pub timeout: Option<scalar::Duration>,

    /// Show the plan without changing anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct RefreshArgs {
    /// Limit to a kind or one instance: <kind> or <kind>.<name>
    #[arg(short, long)]
    pub target: Option<String>,

    /// Instances read in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Deadline for the whole run
    #[arg(long)]
    pub timeout: Option<scalar::Duration>,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Address to record it under: <kind>.<name>
    pub address: String,

    /// Remote id, in the kind's import grammar
    pub id: String,

    /// Deadline for the import
    #[arg(long)]
    pub timeout: Option<scalar::Duration>,
}

#[derive(Subcommand)]
pub enum StateCommand {
    /// List tracked addresses
    List {
        /// Only this kind
        kind: Option<String>,
    },

    /// Show the recorded attributes of one instance
    Show {
        address: String,

        /// Print the raw JSON tree
        #[arg(long)]
        json: bool,
    },

    /// Stop tracking an instance without touching the remote object
    Rm { address: String },
}
