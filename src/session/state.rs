//! Session state machine
//!
//! One state value replaces the independent blocking/saving flags. Every
//! transition is checked and applied under the same lock.

use std::sync::Arc;

use parking_lot::Mutex;

/// What the session is currently doing with its engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Saving,
    /// `close()` was called; teardown is queued or running.
    Closing,
    Rescanning,
    /// Teardown finished; the session no longer owns an engine.
    Closed,
}

impl SessionState {
    /// Closing, rescanning and closed sessions reject every mutating operation.
    pub fn is_blocking(self) -> bool {
        matches!(self, SessionState::Closing | SessionState::Rescanning | SessionState::Closed)
    }
}

#[derive(Debug)]
pub(crate) struct StateCell {
    state: Arc<Mutex<SessionState>>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self { state: Arc::new(Mutex::new(SessionState::Idle)) }
    }

    pub(crate) fn get(&self) -> SessionState {
        *self.state.lock()
    }

    /// Idle -> Saving. `None` when a save is already running or the session is blocking.
    pub(crate) fn begin_save(&self) -> Option<StateGuard> {
        let mut state = self.state.lock();
        match *state {
            SessionState::Idle => {
                *state = SessionState::Saving;
                Some(self.guard(SessionState::Saving))
            }
            _ => None,
        }
    }

    /// Idle/Saving -> Rescanning. An in-flight save finishes first on the executor.
    pub(crate) fn begin_rescan(&self) -> Result<StateGuard, SessionState> {
        let mut state = self.state.lock();
        match *state {
            SessionState::Idle | SessionState::Saving => {
                *state = SessionState::Rescanning;
                Ok(self.guard(SessionState::Rescanning))
            }
            other => Err(other),
        }
    }

    /// Idle/Saving -> Closing. Returns `false` if already blocking.
    pub(crate) fn begin_close(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            SessionState::Idle | SessionState::Saving => {
                *state = SessionState::Closing;
                true
            }
            _ => false,
        }
    }

    /// Closing -> Closed, once teardown has run.
    pub(crate) fn finish_close(&self) {
        let mut state = self.state.lock();
        if *state == SessionState::Closing {
            *state = SessionState::Closed;
        }
    }

    fn guard(&self, held: SessionState) -> StateGuard {
        StateGuard { state: self.state.clone(), held }
    }
}

/// Returns the session to `Idle` on drop, on every exit path.
///
/// Owns its handle on the state so it can travel into an executor job and
/// outlive the caller's future.
#[derive(Debug)]
pub(crate) struct StateGuard {
    state: Arc<Mutex<SessionState>>,
    held: SessionState,
}

impl Drop for StateGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        // a close issued mid-save owns the state now
        if *state == self.held {
            *state = SessionState::Idle;
        }
    }
}
