pub mod evm;

use std::fmt;

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

// ── Transport errors ────────────────────────────────────────────────

/// Failures reported by a [`ChainClient`]. The controller folds these into
/// its own [`MigrationError`](crate::error::MigrationError) taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("wrong chain: expected chain id {expected}, provider reports {actual}")]
    WrongChain { expected: u64, actual: u64 },

    #[error("provider exposes no accounts")]
    NoAccounts,

    #[error("call to {method} reverted: {reason}")]
    CallFailed { method: &'static str, reason: String },

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: TxHash },
}

// ── Provider events ─────────────────────────────────────────────────

/// Events a connected wallet provider pushes for the lifetime of the
/// connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The wallet switched accounts. An empty list means the wallet locked.
    AccountsChanged(Vec<Address>),
    Disconnect,
}

pub type ProviderEvents = mpsc::UnboundedReceiver<ProviderEvent>;

/// Result of a connect attempt.
///
/// Some providers finish the handshake before they are actually usable and
/// report `connected == false`; callers retry in that case.
pub struct ProviderHandle {
    pub connected: bool,
    pub events: ProviderEvents,
}

impl ProviderHandle {
    pub fn new(connected: bool, events: ProviderEvents) -> Self {
        Self { connected, events }
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("connected", &self.connected)
            .finish_non_exhaustive()
    }
}

// ── Contract calls ──────────────────────────────────────────────────

/// View calls the migrator needs. Results are raw `uint256` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCall {
    BalanceOf { token: Address, owner: Address },
    Allowance { token: Address, owner: Address, spender: Address },
}

impl ReadCall {
    pub fn contract(&self) -> Address {
        match self {
            ReadCall::BalanceOf { token, .. } | ReadCall::Allowance { token, .. } => *token,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            ReadCall::BalanceOf { .. } => "balanceOf",
            ReadCall::Allowance { .. } => "allowance",
        }
    }
}

/// State-changing calls the migrator sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCall {
    /// `ERC20.approve(spender, amount)` on `token`.
    Approve { token: Address, spender: Address, amount: U256 },
    /// `Migrator.migrate(amount)`.
    Migrate { migrator: Address, amount: U256 },
}

impl WriteCall {
    pub fn contract(&self) -> Address {
        match self {
            WriteCall::Approve { token, .. } => *token,
            WriteCall::Migrate { migrator, .. } => *migrator,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            WriteCall::Approve { .. } => "approve",
            WriteCall::Migrate { .. } => "migrate",
        }
    }
}

/// Flat transaction parameters. Gas is never estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxParams {
    pub from: Address,
    pub gas: u64,
    pub gas_price: u128,
}

/// Mined transaction summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

// ── ChainClient capability ──────────────────────────────────────────

/// Everything the migration core needs from a wallet + chain connection.
///
/// The live implementation is [`evm::EvmChainClient`]; tests substitute an
/// in-memory fake.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Establish the wallet connection. The returned handle carries the
    /// provider's event subscription.
    async fn connect(&self) -> Result<ProviderHandle, ChainError>;

    /// Accounts exposed by the connected wallet, preferred account first.
    async fn accounts(&self) -> Result<Vec<Address>, ChainError>;

    async fn read(&self, call: ReadCall) -> Result<U256, ChainError>;

    /// Send a transaction and wait for it to be mined. A reverted
    /// transaction is an error.
    async fn write(&self, call: WriteCall, params: TxParams) -> Result<TxReceipt, ChainError>;
}
