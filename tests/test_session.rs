
use token_migrator::MigrationError;
use token_migrator::chain::{ChainError, ProviderEvent};
use token_migrator::session::SessionManager;

use fake_chain::*;

#[tokio::test]
async fn test_establish_picks_first_account() {
    let chain = FakeChain::new(&[BOB, ALICE]);
    let connection = SessionManager::establish(chain.as_ref()).await.unwrap();
    assert_eq!(connection.account, BOB);
    assert_eq!(chain.connect_attempts(), 1);
}

#[tokio::test]
async fn test_establish_retries_while_not_connected() {
    let chain = FakeChain::new(&[ALICE]);
    chain.not_ready_for(5);
    let connection = SessionManager::establish(chain.as_ref()).await.unwrap();
    assert_eq!(connection.account, ALICE);
    assert_eq!(chain.connect_attempts(), 6);
}

#[tokio::test]
async fn test_establish_stops_on_connect_error() {
    let chain = FakeChain::new(&[ALICE]);
    let err = ChainError::WrongChain {
        expected: 99,
        actual: 1,
    };
    chain.fail_connect(Some(err.clone()));

    let result = SessionManager::establish(chain.as_ref()).await;
    assert_eq!(result.unwrap_err(), MigrationError::ConnectionFailed(err));
    assert_eq!(chain.connect_attempts(), 1);
}

#[tokio::test]
async fn test_establish_without_accounts() {
    let chain = FakeChain::new(&[]);
    let result = SessionManager::establish(chain.as_ref()).await;
    assert_eq!(
        result.unwrap_err(),
        MigrationError::ConnectionFailed(ChainError::NoAccounts)
    );
}

#[tokio::test]
async fn test_connection_carries_provider_events() {
    let chain = FakeChain::new(&[ALICE]);
    let mut connection = SessionManager::establish(chain.as_ref()).await.unwrap();

    chain.emit(ProviderEvent::AccountsChanged(vec![BOB]));
    chain.emit(ProviderEvent::Disconnect);
    assert_eq!(
        connection.events.recv().await,
        Some(ProviderEvent::AccountsChanged(vec![BOB]))
    );
    assert_eq!(connection.events.recv().await, Some(ProviderEvent::Disconnect));

    chain.drop_events();
    assert_eq!(connection.events.recv().await, None);
}
