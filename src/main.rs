use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod schema;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = commands::ChainCommand::from_cli(cli.command) else {
        return schema::run();
    };
    let settings = commands::Settings::from_cli(cli.config, cli.rpc_url)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(commands::run(command, settings))
}
