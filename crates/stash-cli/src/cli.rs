use clap::{Parser, Subcommand, ValueEnum};
use stash_store::BackendKind;

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "stash",
    about = "Reactive key-value store with optional obfuscation",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Backend to operate on; defaults to the configured default.
    #[arg(long, short, global = true, value_enum)]
    pub backend: Option<BackendArg>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    #[value(alias = "local")]
    Primary,
    #[value(alias = "session")]
    Ephemeral,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Primary => BackendKind::Primary,
            BackendArg::Ephemeral => BackendKind::Ephemeral,
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the value stored under a key.
    Get { key: String },
    /// Store a value under a key.
    Set {
        key: String,
        value: String,
        /// Parse VALUE as JSON instead of storing it as text.
        #[arg(long)]
        json: bool,
    },
    /// Check whether a raw entry exists at the literal key.
    Has { key: String },
    /// Remove a key.
    Remove { key: String },
    /// Remove every key from the backend.
    Clear,
    /// Re-emit the stored values of one or more keys and print the notifications.
    Trigger {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// List physical keys in the backend.
    Keys,
    /// Round-trip a probe value through the store.
    Health,
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
