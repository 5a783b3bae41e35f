//! Live-session lifecycle for streaming providers.
//!
//! A session walks `Disconnected → Connecting → Authenticated →
//! AwaitingData → DataReady | TimedOut → Disconnected`. The data wait is
//! bounded by a deadline; running out of time is not an error, it yields
//! `None`. Whatever happens, the session is closed before [`LiveSession::run`]
//! returns.

use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use crate::error::{FetchError, FetchResult};
use crate::models::RawAmount;

/// Default deadline for each phase of a live session.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticated,
    AwaitingData,
    DataReady,
    TimedOut,
}

/// One wallet line of a balance snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletRow {
    pub wallet_type: String,
    pub currency: String,
    pub balance: RawAmount,
}

/// An open, not yet authenticated streaming connection.
#[async_trait::async_trait]
pub trait WalletSession: Send {
    async fn authenticate(&mut self) -> FetchResult<()>;

    /// Wait for the next wallet snapshot. May never complete on its own.
    async fn wallet_snapshot(&mut self) -> FetchResult<Vec<WalletRow>>;

    /// Tear the connection down. Must be safe to call in any state.
    async fn close(&mut self);
}

/// Opens new sessions; one connection per fetch.
#[async_trait::async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self) -> FetchResult<Box<dyn WalletSession>>;
}

/// Drives a single session through its states.
#[derive(Debug)]
pub struct LiveSession {
    state: SessionState,
    trace: Vec<SessionState>,
    deadline: Duration,
}

impl LiveSession {
    pub fn new(deadline: Duration) -> Self {
        Self {
            state: SessionState::Disconnected,
            trace: vec![SessionState::Disconnected],
            deadline,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state visited so far, starting with `Disconnected`.
    pub fn trace(&self) -> &[SessionState] {
        &self.trace
    }

    fn enter(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "session transition");
        self.state = next;
        self.trace.push(next);
    }

    /// Connect, authenticate and wait for one snapshot.
    ///
    /// Returns `Ok(None)` when no snapshot arrived before the deadline.
    /// Connect and authentication stalls are network errors.
    pub async fn run(
        &mut self,
        connector: &dyn SessionConnector,
    ) -> FetchResult<Option<Vec<WalletRow>>> {
        self.enter(SessionState::Connecting);
        let mut session = match timeout(self.deadline, connector.connect()).await {
            Ok(Ok(session)) => session,
            Ok(Err(err)) => {
                self.enter(SessionState::Disconnected);
                return Err(err);
            }
            Err(_) => {
                self.enter(SessionState::Disconnected);
                return Err(FetchError::Network("timed out connecting".to_string()));
            }
        };

        let outcome = self.drive(session.as_mut()).await;
        session.close().await;
        self.enter(SessionState::Disconnected);
        outcome
    }

    async fn drive(
        &mut self,
        session: &mut dyn WalletSession,
    ) -> FetchResult<Option<Vec<WalletRow>>> {
        match timeout(self.deadline, session.authenticate()).await {
            Ok(result) => result?,
            Err(_) => return Err(FetchError::Network("timed out authenticating".to_string())),
        }
        self.enter(SessionState::Authenticated);

        self.enter(SessionState::AwaitingData);
        match timeout(self.deadline, session.wallet_snapshot()).await {
            Ok(Ok(rows)) => {
                self.enter(SessionState::DataReady);
                Ok(Some(rows))
            }
            Ok(Err(err)) => Err(err),
            Err(_) => {
                self.enter(SessionState::TimedOut);
                Ok(None)
            }
        }
    }
}
