//! Approve → migrate flow.
//!
//! All mutable state sits behind one async mutex that is never held across a
//! chain call. `busy` is claimed under the lock before any call goes out, so a
//! second action issued while one is in flight sees it and is ignored.
//!
//! Every operation captures a [`Ticket`] when it starts. If the account
//! changed or disconnected by the time a call returns, the result is dropped
//! and the operation reports [`ActionOutcome::Superseded`].
//!
//! Provider events are tagged with the connection they arrived on. Once that
//! connection is gone (disconnect, or a newer `connect`), anything still
//! coming out of its stream is dropped.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use alloy::primitives::Address;
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, info, warn};

use crate::chain::{ChainClient, ProviderEvent, ProviderEvents, TxParams, WriteCall};
use crate::config::{MigratorConfig, UNLIMITED_ALLOWANCE};
use crate::error::MigrationError;
use crate::model::{ActionOutcome, ControllerState, MigrationSession};
use crate::reader::BalanceReader;
use crate::session::{SessionEvent, SessionManager, Ticket};
use crate::view::ViewState;

const SESSION_EVENT_CAPACITY: usize = 32;

/// Event stream of one provider connection.
struct Subscription {
    connection: u64,
    events: ProviderEvents,
}

/// What applying a pumped event did.
enum Applied {
    /// The event came from a connection that no longer exists.
    Stale,
    Cleared,
    Activated(Ticket),
}

struct Inner {
    sessions: SessionManager,
    session: MigrationSession,
    state: ControllerState,
    last_error: Option<MigrationError>,
    /// Bumped when a connection is installed and when it ends.
    connection: u64,
}

impl Inner {
    fn view(&self) -> ViewState {
        ViewState::project(&self.session, self.state, self.last_error.as_ref())
    }

    fn begin(&mut self, state: ControllerState) {
        self.state = state;
        self.session.busy = true;
        self.last_error = None;
    }

    /// Back to `Ready`, with the approval tag taken from the last allowance
    /// read rather than from whatever action just ran.
    fn settle(&mut self) {
        self.state = ControllerState::Ready {
            approved: self.session.approved,
        };
        self.session.busy = false;
    }

    fn can_approve(&self) -> bool {
        !self.session.busy
            && self.state == ControllerState::Ready { approved: false }
            && self.session.is_loaded()
    }

    fn can_migrate(&self) -> bool {
        !self.session.busy
            && self.state == ControllerState::Ready { approved: true }
            && self.session.is_loaded()
    }

    fn can_refresh(&self) -> bool {
        !self.session.busy && matches!(self.state, ControllerState::Ready { .. })
    }

    /// Wipe per-account data and move to the state matching `event`.
    /// Returns the ticket to load data under, if an account is now active.
    fn apply_session_event(&mut self, event: &SessionEvent) -> Option<Ticket> {
        self.session.clear_data();
        self.last_error = None;
        match *event {
            SessionEvent::Activated {
                account,
                generation,
            } => {
                self.session.account = Some(account);
                self.state = ControllerState::Connecting;
                self.session.busy = true;
                Some(Ticket {
                    account,
                    generation,
                })
            }
            SessionEvent::Cleared { .. } => {
                self.connection += 1;
                self.session.account = None;
                self.state = ControllerState::Disconnected;
                self.session.busy = false;
                None
            }
        }
    }
}

/// Drives one wallet session through connect, approve and migrate.
pub struct MigrationController {
    client: Arc<dyn ChainClient>,
    reader: BalanceReader,
    old_token: Address,
    migrator: Address,
    gas_limit: u64,
    gas_price: u128,
    inner: Mutex<Inner>,
    events: StdMutex<Option<Subscription>>,
    view_tx: watch::Sender<ViewState>,
    session_tx: broadcast::Sender<SessionEvent>,
}

impl MigrationController {
    pub fn new(client: Arc<dyn ChainClient>, config: &MigratorConfig) -> Self {
        let (session_tx, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        let inner = Inner {
            sessions: SessionManager::new(session_tx.clone()),
            session: MigrationSession::default(),
            state: ControllerState::Disconnected,
            last_error: None,
            connection: 0,
        };
        let (view_tx, _) = watch::channel(inner.view());

        MigrationController {
            reader: BalanceReader::new(client.clone(), config),
            client,
            old_token: config.old_token.address,
            migrator: config.migrator,
            gas_limit: config.gas_limit,
            gas_price: config.gas_price,
            inner: Mutex::new(inner),
            events: StdMutex::new(None),
            view_tx,
            session_tx,
        }
    }

    // ── Observation ─────────────────────────────────────────────────

    /// Latest published view.
    pub fn view(&self) -> ViewState {
        self.view_tx.borrow().clone()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<ViewState> {
        self.view_tx.subscribe()
    }

    /// "Session changed" notifications from the session manager.
    pub fn subscribe_session(&self) -> broadcast::Receiver<SessionEvent> {
        self.session_tx.subscribe()
    }

    fn publish(&self, inner: &Inner) {
        self.view_tx.send_replace(inner.view());
    }

    // ── Actions ─────────────────────────────────────────────────────

    /// Connect the wallet and load data for its first account.
    ///
    /// Ignored unless currently disconnected.
    pub async fn connect(&self) -> Result<ActionOutcome, MigrationError> {
        {
            let mut inner = self.inner.lock().await;
            if inner.session.busy || inner.state != ControllerState::Disconnected {
                debug!(state = %inner.state, "connect ignored");
                return Ok(ActionOutcome::Ignored);
            }
            inner.begin(ControllerState::Connecting);
            self.publish(&inner);
        }

        let connection = match SessionManager::establish(self.client.as_ref()).await {
            Ok(connection) => connection,
            Err(err) => {
                warn!(error = %err, "connect failed");
                let mut inner = self.inner.lock().await;
                inner.state = ControllerState::Disconnected;
                inner.session.busy = false;
                inner.last_error = Some(err.clone());
                self.publish(&inner);
                return Err(err);
            }
        };
        let ticket = {
            let mut inner = self.inner.lock().await;
            inner.connection += 1;
            *self.events_slot() = Some(Subscription {
                connection: inner.connection,
                events: connection.events,
            });
            let event = inner.sessions.activate(connection.account);
            let ticket = inner.apply_session_event(&event);
            self.publish(&inner);
            ticket
        };
        match ticket {
            Some(ticket) => self.load(ticket).await,
            None => Ok(ActionOutcome::Superseded),
        }
    }

    /// Approve the migrator for the unlimited amount on the old token.
    ///
    /// Only applies in `Ready(unapproved)` once data has loaded. The session
    /// is marked approved only if the allowance read after the transaction
    /// returns the unlimited sentinel.
    pub async fn approve(&self) -> Result<ActionOutcome, MigrationError> {
        let ticket = {
            let mut inner = self.inner.lock().await;
            let Some(ticket) = inner.sessions.ticket().filter(|_| inner.can_approve()) else {
                debug!(state = %inner.state, busy = inner.session.busy, "approve ignored");
                return Ok(ActionOutcome::Ignored);
            };
            inner.begin(ControllerState::Approving);
            self.publish(&inner);
            ticket
        };

        let call = WriteCall::Approve {
            token: self.old_token,
            spender: self.migrator,
            amount: UNLIMITED_ALLOWANCE,
        };
        info!(account = %ticket.account, spender = %self.migrator, "sending approve");
        let sent = self.client.write(call, self.tx_params(ticket.account)).await;

        let receipt = {
            let mut inner = self.inner.lock().await;
            if !inner.sessions.is_current(&ticket) {
                debug!("approve finished for a stale session, dropping result");
                return Ok(ActionOutcome::Superseded);
            }
            match sent {
                Ok(receipt) => receipt,
                Err(err) => return Err(self.fail(&mut inner, MigrationError::WriteFailed(err))),
            }
        };
        info!(tx = %receipt.tx_hash, "approve mined");

        let allowance = self
            .reader
            .refresh_allowance(ticket.account, self.migrator)
            .await;

        let mut inner = self.inner.lock().await;
        if !inner.sessions.is_current(&ticket) {
            return Ok(ActionOutcome::Superseded);
        }
        match allowance {
            Ok(allowance) => {
                inner.session.set_allowance(allowance);
                if !inner.session.approved {
                    warn!(%allowance, "approve mined but allowance is not unlimited");
                }
                inner.settle();
                self.publish(&inner);
                Ok(ActionOutcome::Confirmed(receipt))
            }
            Err(err) => Err(self.fail(&mut inner, err)),
        }
    }

    /// Migrate the whole old-token balance currently held in the session.
    ///
    /// The amount is the value already in session state; it is not re-read
    /// before sending. Zero is allowed.
    pub async fn migrate(&self) -> Result<ActionOutcome, MigrationError> {
        let (ticket, amount) = {
            let mut inner = self.inner.lock().await;
            let ticket = inner.sessions.ticket().filter(|_| inner.can_migrate());
            let (Some(ticket), Some(amount)) = (ticket, inner.session.flip_balance) else {
                debug!(state = %inner.state, busy = inner.session.busy, "migrate ignored");
                return Ok(ActionOutcome::Ignored);
            };
            inner.begin(ControllerState::Migrating);
            self.publish(&inner);
            (ticket, amount)
        };

        let call = WriteCall::Migrate {
            migrator: self.migrator,
            amount,
        };
        info!(account = %ticket.account, %amount, "sending migrate");
        let sent = self.client.write(call, self.tx_params(ticket.account)).await;

        let receipt = {
            let mut inner = self.inner.lock().await;
            if !inner.sessions.is_current(&ticket) {
                debug!("migrate finished for a stale session, dropping result");
                return Ok(ActionOutcome::Superseded);
            }
            match sent {
                Ok(receipt) => receipt,
                Err(err) => return Err(self.fail(&mut inner, MigrationError::WriteFailed(err))),
            }
        };
        info!(tx = %receipt.tx_hash, "migrate mined");

        let balances = self.reader.refresh_balances(ticket.account).await;

        let mut inner = self.inner.lock().await;
        if !inner.sessions.is_current(&ticket) {
            return Ok(ActionOutcome::Superseded);
        }
        match balances {
            Ok(balances) => {
                inner.session.set_balances(balances);
                inner.settle();
                self.publish(&inner);
                Ok(ActionOutcome::Confirmed(receipt))
            }
            Err(err) => Err(self.fail(&mut inner, err)),
        }
    }

    /// Re-read balances and allowance for the active account.
    pub async fn refresh(&self) -> Result<ActionOutcome, MigrationError> {
        let ticket = {
            let mut inner = self.inner.lock().await;
            let Some(ticket) = inner.sessions.ticket().filter(|_| inner.can_refresh()) else {
                debug!(state = %inner.state, busy = inner.session.busy, "refresh ignored");
                return Ok(ActionOutcome::Ignored);
            };
            inner.session.busy = true;
            inner.last_error = None;
            self.publish(&inner);
            ticket
        };
        self.load(ticket).await
    }

    // ── Provider events ─────────────────────────────────────────────

    /// Apply an account change or disconnect.
    ///
    /// Takes effect immediately, whatever is in flight. For a new account the
    /// data is then loaded under the new identity.
    pub async fn handle_provider_event(
        &self,
        event: ProviderEvent,
    ) -> Result<ActionOutcome, MigrationError> {
        let ticket = {
            let mut inner = self.inner.lock().await;
            self.apply_event(&mut inner, event)
        };
        match ticket {
            Some(ticket) => self.load(ticket).await,
            None => Ok(ActionOutcome::Completed),
        }
    }

    /// Wait for the next provider event and apply it.
    ///
    /// Returns `None` when there is no live connection. A closed event
    /// stream counts as a disconnect. While data for a new account loads,
    /// the stream is still read: a later event is applied at once and the
    /// load it supersedes is abandoned. Only one task should pump events.
    pub async fn next_event(&self) -> Option<Result<ActionOutcome, MigrationError>> {
        let mut subscription = self.events_slot().take()?;
        let mut event = subscription.events.recv().await;

        loop {
            let ticket = match self.apply_pumped(subscription.connection, event.take()).await {
                Applied::Stale => {
                    debug!(
                        connection = subscription.connection,
                        "event from a closed connection dropped"
                    );
                    return Some(Ok(ActionOutcome::Superseded));
                }
                Applied::Cleared => return Some(Ok(ActionOutcome::Completed)),
                Applied::Activated(ticket) => ticket,
            };

            let loaded = tokio::select! {
                biased;
                next = subscription.events.recv() => {
                    event = next;
                    None
                }
                result = self.load(ticket) => Some(result),
            };
            if let Some(result) = loaded {
                let inner = self.inner.lock().await;
                let mut slot = self.events_slot();
                if slot.is_none() && inner.connection == subscription.connection {
                    *slot = Some(subscription);
                }
                return Some(result);
            }
        }
    }

    /// Pump provider events until the wallet disconnects.
    pub async fn run_events(&self) {
        while let Some(result) = self.next_event().await {
            if let Err(err) = result {
                warn!(error = %err, "reload after account change failed");
            }
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    /// Session-side effects of a provider event, applied under the lock.
    /// Returns the ticket to load data under, if an account is now active.
    fn apply_event(&self, inner: &mut Inner, event: ProviderEvent) -> Option<Ticket> {
        let change = inner.sessions.apply(event);
        let ticket = inner.apply_session_event(&change);
        if ticket.is_none() {
            self.events_slot().take();
        }
        self.publish(inner);
        ticket
    }

    /// Apply an event read from the stream of `connection`. `None` is the
    /// stream closing.
    async fn apply_pumped(&self, connection: u64, event: Option<ProviderEvent>) -> Applied {
        let mut inner = self.inner.lock().await;
        if inner.connection != connection {
            return Applied::Stale;
        }
        let event = event.unwrap_or(ProviderEvent::Disconnect);
        match self.apply_event(&mut inner, event) {
            Some(ticket) => Applied::Activated(ticket),
            None => Applied::Cleared,
        }
    }

    /// Read balances, then allowance, and settle into `Ready`. Watchers see
    /// the result once both reads are in.
    async fn load(&self, ticket: Ticket) -> Result<ActionOutcome, MigrationError> {
        let balances = self.reader.refresh_balances(ticket.account).await;
        {
            let mut inner = self.inner.lock().await;
            if !inner.sessions.is_current(&ticket) {
                debug!(account = %ticket.account, "balances arrived for a stale session");
                return Ok(ActionOutcome::Superseded);
            }
            match balances {
                Ok(balances) => inner.session.set_balances(balances),
                Err(err) => return Err(self.fail(&mut inner, err)),
            }
        }

        let allowance = self
            .reader
            .refresh_allowance(ticket.account, self.migrator)
            .await;

        let mut inner = self.inner.lock().await;
        if !inner.sessions.is_current(&ticket) {
            debug!(account = %ticket.account, "allowance arrived for a stale session");
            return Ok(ActionOutcome::Superseded);
        }
        match allowance {
            Ok(allowance) => {
                inner.session.set_allowance(allowance);
                inner.settle();
                self.publish(&inner);
                Ok(ActionOutcome::Completed)
            }
            Err(err) => Err(self.fail(&mut inner, err)),
        }
    }

    /// Record `err`, clear `busy`, and fall back to `Ready` with whatever data
    /// was already known.
    fn fail(&self, inner: &mut Inner, err: MigrationError) -> MigrationError {
        warn!(error = %err, state = %inner.state, "operation failed");
        inner.settle();
        inner.last_error = Some(err.clone());
        self.publish(inner);
        err
    }

    fn tx_params(&self, from: Address) -> TxParams {
        TxParams {
            from,
            gas: self.gas_limit,
            gas_price: self.gas_price,
        }
    }

    fn events_slot(&self) -> std::sync::MutexGuard<'_, Option<Subscription>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
