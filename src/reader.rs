use std::sync::Arc;

use alloy::primitives::{Address, U256};
use tracing::debug;

use crate::chain::{ChainClient, ReadCall};
use crate::config::MigratorConfig;
use crate::error::MigrationError;
use crate::model::Balances;

/// Reads token balances and the migrator's allowance for an account.
///
/// The reader never touches session state; the controller decides whether a
/// result is still wanted when it arrives.
#[derive(Clone)]
pub struct BalanceReader {
    client: Arc<dyn ChainClient>,
    old_token: Address,
    new_token: Address,
}

impl BalanceReader {
    pub fn new(client: Arc<dyn ChainClient>, config: &MigratorConfig) -> Self {
        BalanceReader {
            client,
            old_token: config.old_token.address,
            new_token: config.new_token.address,
        }
    }

    /// Read both balances concurrently. Either both come back or the whole
    /// refresh fails.
    pub async fn refresh_balances(&self, account: Address) -> Result<Balances, MigrationError> {
        let (flip, ryno) = tokio::try_join!(
            self.client.read(ReadCall::BalanceOf {
                token: self.old_token,
                owner: account,
            }),
            self.client.read(ReadCall::BalanceOf {
                token: self.new_token,
                owner: account,
            }),
        )
        .map_err(MigrationError::ReadFailed)?;

        debug!(%account, %flip, %ryno, "balances read");
        Ok(Balances { flip, ryno })
    }

    /// Allowance of `spender` over the old token.
    pub async fn refresh_allowance(
        &self,
        account: Address,
        spender: Address,
    ) -> Result<U256, MigrationError> {
        let allowance = self
            .client
            .read(ReadCall::Allowance {
                token: self.old_token,
                owner: account,
                spender,
            })
            .await
            .map_err(MigrationError::ReadFailed)?;

        debug!(%account, %spender, %allowance, "allowance read");
        Ok(allowance)
    }
}
