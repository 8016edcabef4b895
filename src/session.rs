//! Identity of the signed-in owner and the guard protected views run through.
//!
//! `Pending` is the state between app start and the identity provider's first
//! answer. It is not an error: views wait, and no locator is built.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::codes;
use crate::route::Route;
use crate::{AppError, AppResult};

/// Stable identifier of the authenticated principal. Every path is scoped by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Rejects blank ids and ids that would add path segments.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.contains('/') {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    SignedOut,
    SignedIn(OwnerId),
}

impl SessionState {
    pub fn owner(&self) -> Option<&OwnerId> {
        match self {
            SessionState::SignedIn(owner) => Some(owner),
            _ => None,
        }
    }
}

/// What a protected view should do for the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Identity not known yet; show a spinner, build nothing.
    Wait,
    Redirect(Route),
    Allow(OwnerId),
}

pub fn guard(state: &SessionState) -> GuardOutcome {
    match state {
        SessionState::Pending => GuardOutcome::Wait,
        SessionState::SignedOut => GuardOutcome::Redirect(Route::SignIn),
        SessionState::SignedIn(owner) => GuardOutcome::Allow(owner.clone()),
    }
}

pub fn require_owner(state: &SessionState) -> AppResult<OwnerId> {
    match state {
        SessionState::SignedIn(owner) => Ok(owner.clone()),
        SessionState::Pending => Err(AppError::new(
            codes::SESSION_PENDING,
            "Still checking who you are. Try again in a moment.",
        )),
        SessionState::SignedOut => Err(AppError::new(
            codes::SESSION_SIGNED_OUT,
            "Please sign in to continue.",
        )),
    }
}

/// Shared, observable session. The identity provider drives it; views read it.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<watch::Sender<SessionState>>,
}

impl SessionHandle {
    pub fn pending() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Pending);
        Self { inner: Arc::new(tx) }
    }

    pub fn signed_in(owner: OwnerId) -> Self {
        let handle = Self::pending();
        handle.resolve(owner);
        handle
    }

    /// Called once the identity provider answers with a principal.
    pub fn resolve(&self, owner: OwnerId) {
        info!(target: "landlord", event = "session_resolved", owner_id = %owner);
        self.inner.send_replace(SessionState::SignedIn(owner));
    }

    pub fn sign_out(&self) {
        info!(target: "landlord", event = "session_signed_out");
        self.inner.send_replace(SessionState::SignedOut);
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.borrow().clone()
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.inner.borrow().owner().cloned()
    }

    pub fn guard(&self) -> GuardOutcome {
        let outcome = guard(&self.inner.borrow());
        debug!(target: "landlord", event = "session_guard", outcome = ?outcome);
        outcome
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.subscribe()
    }
}
