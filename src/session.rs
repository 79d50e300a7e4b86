//! Wallet connection lifecycle and account identity.

use alloy::primitives::Address;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::chain::{ChainClient, ChainError, ProviderEvent, ProviderEvents};
use crate::error::MigrationError;

/// "Session changed" notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// `account` became the active account.
    Activated { account: Address, generation: u64 },
    /// No account is active any more.
    Cleared { generation: u64 },
}

/// Identity captured when an operation starts. Results are only applied if
/// the ticket is still current when the operation completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub account: Address,
    pub generation: u64,
}

/// A freshly established wallet connection.
#[derive(Debug)]
pub struct Connection {
    pub account: Address,
    pub events: ProviderEvents,
}

/// Tracks which account is active.
///
/// Every identity change bumps `generation`, so an A → B → A switch still
/// invalidates work started for the first A.
pub struct SessionManager {
    account: Option<Address>,
    generation: u64,
    notifier: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(notifier: broadcast::Sender<SessionEvent>) -> Self {
        SessionManager {
            account: None,
            generation: 0,
            notifier,
        }
    }

    /// Run the wallet handshake and pick the first account.
    ///
    /// A provider that comes back not-yet-connected is asked again right
    /// away; only a hard connect error or an empty account list fails.
    pub async fn establish(client: &dyn ChainClient) -> Result<Connection, MigrationError> {
        let mut attempt = 1u32;
        let handle = loop {
            let handle = client
                .connect()
                .await
                .map_err(MigrationError::ConnectionFailed)?;
            if handle.connected {
                break handle;
            }
            debug!(attempt, "provider not connected yet, retrying");
            attempt += 1;
            tokio::task::yield_now().await;
        };

        let accounts = client
            .accounts()
            .await
            .map_err(MigrationError::ConnectionFailed)?;
        let account = accounts
            .first()
            .copied()
            .ok_or(MigrationError::ConnectionFailed(ChainError::NoAccounts))?;

        info!(%account, attempts = attempt, "wallet connected");
        Ok(Connection {
            account,
            events: handle.events,
        })
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ticket(&self) -> Option<Ticket> {
        self.account.map(|account| Ticket {
            account,
            generation: self.generation,
        })
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.generation == ticket.generation && self.account == Some(ticket.account)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.notifier.subscribe()
    }

    /// Make `account` the active account.
    pub fn activate(&mut self, account: Address) -> SessionEvent {
        self.generation += 1;
        self.account = Some(account);
        self.notify(SessionEvent::Activated {
            account,
            generation: self.generation,
        })
    }

    /// Drop the active account.
    pub fn clear(&mut self) -> SessionEvent {
        self.generation += 1;
        self.account = None;
        self.notify(SessionEvent::Cleared {
            generation: self.generation,
        })
    }

    /// Apply a provider event. An empty account list is treated like a
    /// disconnect.
    pub fn apply(&mut self, event: ProviderEvent) -> SessionEvent {
        match event {
            ProviderEvent::AccountsChanged(accounts) => match accounts.first() {
                Some(&account) => {
                    info!(%account, "wallet switched account");
                    self.activate(account)
                }
                None => {
                    info!("wallet reported no accounts");
                    self.clear()
                }
            },
            ProviderEvent::Disconnect => {
                info!("wallet disconnected");
                self.clear()
            }
        }
    }

    fn notify(&self, event: SessionEvent) -> SessionEvent {
        // No subscribers is fine.
        let _ = self.notifier.send(event.clone());
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        let (tx, _) = broadcast::channel(16);
        SessionManager::new(tx)
    }

    #[test]
    fn test_generation_bumps_on_every_change() {
        let mut sessions = manager();
        let a = Address::repeat_byte(0xaa);
        let b = Address::repeat_byte(0xbb);

        sessions.activate(a);
        let first = sessions.ticket().unwrap();
        sessions.apply(ProviderEvent::AccountsChanged(vec![b]));
        sessions.apply(ProviderEvent::AccountsChanged(vec![a]));

        assert_eq!(sessions.account(), Some(a));
        assert!(!sessions.is_current(&first));
        assert!(sessions.is_current(&sessions.ticket().unwrap()));
    }

    #[test]
    fn test_empty_accounts_clears() {
        let mut sessions = manager();
        sessions.activate(Address::repeat_byte(0xaa));
        let event = sessions.apply(ProviderEvent::AccountsChanged(vec![]));
        assert_eq!(event, SessionEvent::Cleared { generation: 2 });
        assert_eq!(sessions.account(), None);
        assert!(sessions.ticket().is_none());
    }

    #[test]
    fn test_subscribers_see_events() {
        let mut sessions = manager();
        let mut rx = sessions.subscribe();
        let a = Address::repeat_byte(0xaa);
        sessions.activate(a);
        sessions.apply(ProviderEvent::Disconnect);

        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::Activated {
                account: a,
                generation: 1
            }
        );
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::Cleared { generation: 2 });
    }
}
