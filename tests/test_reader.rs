
use alloy::primitives::U256;

use token_migrator::MigrationError;
use token_migrator::chain::{ChainError, ReadCall};
use token_migrator::model::Balances;
use token_migrator::reader::BalanceReader;

use fake_chain::*;

#[tokio::test]
async fn test_reads_both_tokens_for_account() {
    let chain = FakeChain::new(&[ALICE]);
    chain.fund(ALICE, wei(2 * ONE), wei(ONE), U256::ZERO);
    let reader = BalanceReader::new(chain.clone(), &config());

    let balances = reader.refresh_balances(ALICE).await.unwrap();
    assert_eq!(
        balances,
        Balances {
            flip: wei(2 * ONE),
            ryno: wei(ONE),
        }
    );

    let reads = chain.reads();
    assert_eq!(reads.len(), 2);
    assert!(reads.contains(&ReadCall::BalanceOf {
        token: flip(),
        owner: ALICE,
    }));
    assert!(reads.contains(&ReadCall::BalanceOf {
        token: ryno(),
        owner: ALICE,
    }));
}

#[tokio::test]
async fn test_one_failed_balance_fails_the_refresh() {
    let chain = FakeChain::new(&[ALICE]);
    chain.fund(ALICE, wei(ONE), wei(ONE), U256::ZERO);
    chain.fail_contract(flip());
    let reader = BalanceReader::new(chain.clone(), &config());

    let err = reader.refresh_balances(ALICE).await.unwrap_err();
    assert_eq!(
        err,
        MigrationError::ReadFailed(ChainError::CallFailed {
            method: "balanceOf",
            reason: "execution reverted".into(),
        })
    );
}

#[tokio::test]
async fn test_allowance_is_returned_exactly() {
    let chain = FakeChain::new(&[ALICE]);
    let almost = U256::MAX - U256::from(1);
    chain.fund(ALICE, U256::ZERO, U256::ZERO, almost);
    let reader = BalanceReader::new(chain.clone(), &config());

    let allowance = reader.refresh_allowance(ALICE, migrator()).await.unwrap();
    assert_eq!(allowance, almost);
    assert_eq!(
        chain.reads(),
        vec![ReadCall::Allowance {
            token: flip(),
            owner: ALICE,
            spender: migrator(),
        }]
    );
}

#[tokio::test]
async fn test_unknown_account_reads_zero() {
    let chain = FakeChain::new(&[ALICE]);
    let reader = BalanceReader::new(chain.clone(), &config());

    let balances = reader.refresh_balances(CAROL).await.unwrap();
    assert_eq!(balances.flip, U256::ZERO);
    assert_eq!(balances.ryno, U256::ZERO);
    assert_eq!(
        reader.refresh_allowance(CAROL, migrator()).await,
        Ok(U256::ZERO)
    );
}
