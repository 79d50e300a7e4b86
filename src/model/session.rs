use alloy::primitives::{Address, U256};

use crate::config::UNLIMITED_ALLOWANCE;

/// Both token balances of one account, read together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balances {
    /// Old-token (FLIP) balance.
    pub flip: U256,
    /// New-token (RYNO) balance.
    pub ryno: U256,
}

/// Snapshot of everything known about the active wallet.
///
/// `None` balances mean "not read yet for this account", never zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MigrationSession {
    pub account: Option<Address>,
    pub flip_balance: Option<U256>,
    pub ryno_balance: Option<U256>,
    /// Last allowance of the migrator over the old token.
    pub allowance: Option<U256>,
    /// True iff `allowance` is the unlimited sentinel.
    pub approved: bool,
    pub busy: bool,
}

impl MigrationSession {
    /// Both balances and the allowance have been read for this account.
    pub fn is_loaded(&self) -> bool {
        self.account.is_some()
            && self.flip_balance.is_some()
            && self.ryno_balance.is_some()
            && self.allowance.is_some()
    }

    pub fn set_balances(&mut self, balances: Balances) {
        self.flip_balance = Some(balances.flip);
        self.ryno_balance = Some(balances.ryno);
    }

    /// Record a fresh allowance read. `approved` is derived from it and never
    /// set on its own.
    pub fn set_allowance(&mut self, allowance: U256) {
        self.allowance = Some(allowance);
        self.approved = is_unlimited(allowance);
    }

    /// Forget all per-account data, keeping `account` and `busy`.
    pub fn clear_data(&mut self) {
        self.flip_balance = None;
        self.ryno_balance = None;
        self.allowance = None;
        self.approved = false;
    }
}

/// Exact comparison against the unlimited sentinel. A large-but-finite
/// allowance does not count as approved.
pub fn is_unlimited(allowance: U256) -> bool {
    allowance == UNLIMITED_ALLOWANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_is_exact() {
        assert!(is_unlimited(U256::MAX));
        assert!(!is_unlimited(U256::MAX - U256::from(1)));
        assert!(!is_unlimited(U256::ZERO));
    }

    #[test]
    fn test_approved_follows_allowance() {
        let mut session = MigrationSession::default();
        session.set_allowance(U256::MAX);
        assert!(session.approved);
        session.set_allowance(U256::from(10u64));
        assert!(!session.approved);
        assert_eq!(session.allowance, Some(U256::from(10u64)));
    }

    #[test]
    fn test_clear_data_keeps_identity() {
        let account = Address::repeat_byte(0xaa);
        let mut session = MigrationSession {
            account: Some(account),
            busy: true,
            ..Default::default()
        };
        session.set_balances(Balances {
            flip: U256::from(1u64),
            ryno: U256::from(2u64),
        });
        session.set_allowance(U256::MAX);
        assert!(session.is_loaded());

        session.clear_data();
        assert_eq!(session.account, Some(account));
        assert!(session.busy);
        assert_eq!(session.flip_balance, None);
        assert_eq!(session.ryno_balance, None);
        assert!(!session.approved);
        assert!(!session.is_loaded());
    }
}
