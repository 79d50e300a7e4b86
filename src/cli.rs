use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// FLIP → RYNO token migrator: check balances, approve the migrator,
/// and convert old tokens to new ones 1:1.
#[derive(Parser)]
#[command(name = "token-migrator", version, about)]
pub struct Cli {
    /// Path to a JSON config file (defaults to the POA core deployment)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the JSON-RPC endpoint from the config
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Output the JSON schema for the config file
    ConfigSchema,

    /// Connect and show balances, approval and the next action
    Status,

    /// Approve the migrator to spend the old token (unlimited)
    Approve,

    /// Convert the full old-token balance to the new token
    Migrate,

    /// Stay connected and print every state change until Ctrl-C
    Watch,
}
