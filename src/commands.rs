use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::U256;
use anyhow::{Context, Result, bail};

use token_migrator::chain::evm::{EvmChainClient, short_addr};
use token_migrator::config::PRIVATE_KEY_ENV;
use token_migrator::view::format_amount;
use token_migrator::{
    ActionOutcome, MigrationController, MigratorConfig, NextAction, ProviderEvent, ViewState,
};

use crate::cli::Command;

/// The commands that connect to the chain.
pub enum ChainCommand {
    Status,
    Approve,
    Migrate,
    Watch,
}

impl ChainCommand {
    /// `None` for commands that run without a wallet.
    pub fn from_cli(command: Command) -> Option<Self> {
        match command {
            Command::ConfigSchema => None,
            Command::Status => Some(ChainCommand::Status),
            Command::Approve => Some(ChainCommand::Approve),
            Command::Migrate => Some(ChainCommand::Migrate),
            Command::Watch => Some(ChainCommand::Watch),
        }
    }
}

/// Resolved config plus the signing key from the environment.
pub struct Settings {
    pub config: MigratorConfig,
    pub private_key: String,
}

impl Settings {
    pub fn from_cli(config_path: Option<PathBuf>, rpc_url: Option<String>) -> Result<Self> {
        let mut config = MigratorConfig::load(config_path.as_deref()).with_context(|| {
            match &config_path {
                Some(path) => format!("loading config {}", path.display()),
                None => "validating default config".to_string(),
            }
        })?;
        if let Some(url) = rpc_url {
            config.rpc_url = url;
        }

        let private_key = std::env::var(PRIVATE_KEY_ENV).map_err(|_| {
            anyhow::anyhow!(
                "{PRIVATE_KEY_ENV} env var not set. \
                 Set it to the hex private key of the wallet holding the old token."
            )
        })?;

        Ok(Settings {
            config,
            private_key,
        })
    }
}

/// Entry point for every command that talks to the chain.
pub async fn run(command: ChainCommand, settings: Settings) -> Result<()> {
    let Settings {
        config,
        private_key,
    } = settings;

    let client = Arc::new(EvmChainClient::new(&config, &private_key)?);
    let controller = MigrationController::new(client.clone(), &config);

    println!("=== token-migrator ===");
    println!(
        "Migrating {} → {} via {} on chain {}",
        config.old_token.symbol,
        config.new_token.symbol,
        short_addr(&config.migrator),
        config.chain_id,
    );
    println!();

    controller.connect().await.context("connecting wallet")?;

    match command {
        ChainCommand::Status => render(&controller.view(), &config),
        ChainCommand::Approve => approve(&controller, &config).await?,
        ChainCommand::Migrate => migrate(&controller, &config).await?,
        ChainCommand::Watch => watch(&controller, &client, &config).await?,
    }
    Ok(())
}

async fn approve(controller: &MigrationController, config: &MigratorConfig) -> Result<()> {
    let view = controller.view();
    match view.next_action {
        NextAction::Approve => {}
        NextAction::Migrate => {
            println!("{} already approved.", config.old_token.symbol);
            render(&view, config);
            return Ok(());
        }
        other => bail!("cannot approve right now (next action: {other:?})"),
    }

    println!("Approving {}...", config.old_token.symbol);
    let outcome = controller.approve().await.context("approve")?;
    report(&outcome);

    let view = controller.view();
    if !view.session.approved {
        println!(
            "WARNING: approve mined but the allowance is not unlimited. Run `approve` again."
        );
    }
    render(&view, config);
    Ok(())
}

async fn migrate(controller: &MigrationController, config: &MigratorConfig) -> Result<()> {
    let view = controller.view();
    match view.next_action {
        NextAction::Migrate => {}
        NextAction::Approve => bail!(
            "{} is not approved yet. Run `token-migrator approve` first.",
            config.old_token.symbol
        ),
        other => bail!("cannot migrate right now (next action: {other:?})"),
    }
    if view.session.flip_balance == Some(U256::ZERO) {
        println!(
            "WARNING: {} balance is 0, sending migrate anyway.",
            config.old_token.symbol
        );
    }

    println!(
        "Converting {} {} to {}...",
        format_amount(view.session.flip_balance.unwrap_or_default(), config.old_token.decimals),
        config.old_token.symbol,
        config.new_token.symbol,
    );
    let outcome = controller.migrate().await.context("migrate")?;
    report(&outcome);
    render(&controller.view(), config);
    Ok(())
}

async fn watch(
    controller: &MigrationController,
    client: &EvmChainClient,
    config: &MigratorConfig,
) -> Result<()> {
    let mut views = controller.subscribe_view();
    render(&views.borrow_and_update(), config);

    let print_changes = async {
        while views.changed().await.is_ok() {
            println!();
            render(&views.borrow_and_update(), config);
        }
    };

    tokio::select! {
        _ = controller.run_events() => {
            println!("Wallet disconnected.");
        }
        _ = print_changes => {}
        res = tokio::signal::ctrl_c() => {
            res.context("listening for Ctrl-C")?;
            client.disconnect();
            controller.handle_provider_event(ProviderEvent::Disconnect).await?;
            println!("\nDisconnected.");
        }
    }
    Ok(())
}

fn report(outcome: &ActionOutcome) {
    match outcome {
        ActionOutcome::Confirmed(receipt) => println!(
            "  tx {} mined (block {}, gas used {})",
            receipt.tx_hash,
            receipt
                .block_number
                .map(|b| b.to_string())
                .unwrap_or_else(|| "?".into()),
            receipt.gas_used,
        ),
        ActionOutcome::Completed => {}
        ActionOutcome::Ignored => println!("  nothing to do"),
        ActionOutcome::Superseded => println!("  wallet changed while waiting, result discarded"),
    }
}

fn render(view: &ViewState, config: &MigratorConfig) {
    match view.session.account {
        Some(account) => println!("Account:  {account}"),
        None => println!("Account:  (not connected)"),
    }
    if let Some((flip, ryno)) = view.balances() {
        println!(
            "          {} {}",
            format_amount(flip, config.old_token.decimals),
            config.old_token.symbol
        );
        println!(
            "          {} {}",
            format_amount(ryno, config.new_token.decimals),
            config.new_token.symbol
        );
    }
    println!("State:    {}", view.state);
    println!("Next:     {}", describe(view.next_action, config));
    if let Some(err) = &view.last_error {
        println!("Error:    {err}");
    }

    if view.session.ryno_balance.is_some_and(|b| !b.is_zero()) {
        println!();
        println!("Add {} to your wallet:", config.new_token.symbol);
        println!("  Contract: {}", config.new_token.address);
        println!("  Decimals: {}", config.new_token.decimals);
    }
}

fn describe(action: NextAction, config: &MigratorConfig) -> String {
    match action {
        NextAction::Connect => "connect wallet".into(),
        NextAction::Approve => format!("approve {}", config.old_token.symbol),
        NextAction::Migrate => format!(
            "convert {} to {}",
            config.old_token.symbol, config.new_token.symbol
        ),
        NextAction::Refresh => "refresh (last read failed)".into(),
        NextAction::Wait => "wait".into(),
    }
}
