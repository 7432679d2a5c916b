//! Session State
//!
//! One checkout session: the mounted frame, its presenter, and the external
//! window poll timer. At most one exists per controller.

use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use futures::future::AbortHandle;
use uuid::Uuid;

use crate::presenter::Presenter;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Controller lifecycle
///
/// `Closed → Opening → Open → Closing → Closed`. Entering `Closing` is the
/// single exclusivity point for teardown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Closed,
    Opening,
    Open,
    Closing,
}

impl SessionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Closing => "closing",
        }
    }

    /// A session exists and has not started tearing down
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Opening | Self::Open)
    }
}

/// A live embedded session
pub(crate) struct Session<F, S: crate::presenter::Surface> {
    pub id: SessionId,
    pub token: String,
    pub base_url: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub frame: Option<Rc<F>>,
    pub presenter: Option<Rc<Presenter<S>>>,
    pub external_page_open: bool,
    /// Backdrop + render task started by `open`
    pub opening: Option<AbortHandle>,
    /// External window poll timer
    pub poll: Option<AbortHandle>,
}

impl<F, S: crate::presenter::Surface> Session<F, S> {
    pub fn new(token: String, base_url: Option<String>, frame: F, presenter: Presenter<S>) -> Self {
        Self {
            id: SessionId::new(),
            token,
            base_url,
            opened_at: Utc::now(),
            frame: Some(Rc::new(frame)),
            presenter: Some(Rc::new(presenter)),
            external_page_open: false,
            opening: None,
            poll: None,
        }
    }

    /// Stop the external window poll, if one is running
    pub fn cancel_poll(&mut self) -> bool {
        match self.poll.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Stop the opening task; a no-op once it has finished
    pub fn cancel_opening(&mut self) {
        if let Some(handle) = self.opening.take() {
            handle.abort();
        }
    }

    pub fn info(&self, state: SessionState) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            state,
            token: self.token.clone(),
            base_url: self.base_url.clone(),
            opened_at: self.opened_at,
            external_page_open: self.external_page_open,
            polling: self.poll.is_some(),
        }
    }
}

/// Read-only view of the current session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub state: SessionState,
    pub token: String,
    pub base_url: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub external_page_open: bool,
    pub polling: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
        assert_eq!(SessionId::new().as_str().len(), 36);
    }

    #[test]
    fn test_live_states() {
        assert!(!SessionState::Closed.is_live());
        assert!(SessionState::Opening.is_live());
        assert!(SessionState::Open.is_live());
        assert!(!SessionState::Closing.is_live());
        assert_eq!(SessionState::default(), SessionState::Closed);
    }
}
