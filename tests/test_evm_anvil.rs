
use std::sync::Arc;

use alloy::primitives::U256;

use token_migrator::chain::evm::EvmChainClient;
use token_migrator::chain::{ChainClient, ChainError, ProviderEvent, ReadCall};
use token_migrator::{
    ActionOutcome, ControllerState, MigrationController, MigratorConfig, NextAction,
};

use anvil_common::*;

const POA_CORE_RPC: &str = "https://core.poa.network";
const POA_CORE_CHAIN_ID: u64 = 99;

#[tokio::test]
#[ignore] // Requires Anvil
async fn test_connect_reports_signer_account() {
    let ctx = spawn_local();
    let client = EvmChainClient::new(&make_config(&ctx), &ctx.private_key).unwrap();

    let handle = client.connect().await.unwrap();
    assert!(handle.connected);
    assert_eq!(client.accounts().await.unwrap(), vec![ctx.wallet_address]);
    assert_eq!(client.address(), ctx.wallet_address);
}

#[tokio::test]
#[ignore] // Requires Anvil
async fn test_connect_rejects_wrong_chain() {
    let ctx = spawn_local();
    let config = MigratorConfig {
        rpc_url: ctx.rpc_url.clone(),
        ..MigratorConfig::default()
    };
    let client = EvmChainClient::new(&config, &ctx.private_key).unwrap();

    let err = client.connect().await.unwrap_err();
    assert_eq!(
        err,
        ChainError::WrongChain {
            expected: 99,
            actual: ctx.chain_id,
        }
    );
}

#[tokio::test]
#[ignore] // Requires Anvil
async fn test_read_without_contract_fails() {
    let ctx = spawn_local();
    let config = make_config(&ctx);
    let client = EvmChainClient::new(&config, &ctx.private_key).unwrap();
    client.connect().await.unwrap();

    let err = client
        .read(ReadCall::BalanceOf {
            token: config.old_token.address,
            owner: ctx.wallet_address,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ChainError::CallFailed {
            method: "balanceOf",
            ..
        }
    ));
}

#[tokio::test]
#[ignore] // Requires Anvil
async fn test_disconnect_reaches_event_stream() {
    let ctx = spawn_local();
    let client = EvmChainClient::new(&make_config(&ctx), &ctx.private_key).unwrap();
    let mut handle = client.connect().await.unwrap();

    client.disconnect();
    assert_eq!(handle.events.recv().await, Some(ProviderEvent::Disconnect));
    assert_eq!(handle.events.recv().await, None);
}

#[tokio::test]
#[ignore] // Requires Anvil + network access
async fn test_controller_loads_real_tokens_on_fork() {
    let ctx = spawn_fork(POA_CORE_RPC, POA_CORE_CHAIN_ID);
    fund_native(
        &ctx.rpc_url,
        ctx.wallet_address,
        U256::from(10u128 * 10u128.pow(18)),
    )
    .await;

    let config = make_config(&ctx);
    let client = Arc::new(EvmChainClient::new(&config, &ctx.private_key).unwrap());
    let controller = MigrationController::new(client, &config);

    assert_eq!(controller.connect().await, Ok(ActionOutcome::Completed));

    // A fresh dev account holds nothing and has approved nothing.
    let view = controller.view();
    assert_eq!(view.session.account, Some(ctx.wallet_address));
    assert_eq!(view.session.flip_balance, Some(U256::ZERO));
    assert_eq!(view.session.ryno_balance, Some(U256::ZERO));
    assert_eq!(view.session.allowance, Some(U256::ZERO));
    assert_eq!(view.state, ControllerState::Ready { approved: false });
    assert_eq!(view.next_action, NextAction::Approve);

    let outcome = controller.approve().await.unwrap();
    assert!(matches!(outcome, ActionOutcome::Confirmed(_)));
    assert!(controller.view().session.approved);
    assert_eq!(controller.view().next_action, NextAction::Migrate);
}
