//! Session completion signal.
//!
//! A one-shot event shared by the two pumps of a session. The watch channel
//! carries the session state; the `Running → Closing` transition happens in
//! a single `send_if_modified` call, so only one caller ever wins it.

use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle state of a relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Both connections exist, pumps not started.
    Idle,
    /// Both pumps are forwarding frames.
    Running,
    /// The signal fired; pumps are unwinding.
    Closing,
    /// Both pumps have returned.
    Closed,
}

impl SessionState {
    /// True once the signal has fired.
    pub fn is_terminating(&self) -> bool {
        matches!(self, SessionState::Closing | SessionState::Closed)
    }
}

/// Exactly-once, many-waiters completion event.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    tx: Arc<watch::Sender<SessionState>>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionState::Idle);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the signal.
    ///
    /// Returns `true` only for the call that moved the session into
    /// `Closing`; every later call is a no-op returning `false`.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if state.is_terminating() {
                false
            } else {
                *state = SessionState::Closing;
                true
            }
        })
    }

    pub fn is_fired(&self) -> bool {
        self.tx.borrow().is_terminating()
    }

    /// Resolves once the signal has fired. Returns immediately if it already has.
    pub async fn fired(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(SessionState::is_terminating).await;
    }

    pub fn state(&self) -> SessionState {
        *self.tx.borrow()
    }

    /// Guard that fires the signal when dropped.
    pub fn fire_on_drop(&self) -> FireOnDrop {
        FireOnDrop {
            signal: self.clone(),
        }
    }

    pub(crate) fn mark_running(&self) {
        self.tx.send_if_modified(|state| {
            if *state == SessionState::Idle {
                *state = SessionState::Running;
                true
            } else {
                false
            }
        });
    }

    pub(crate) fn mark_closed(&self) {
        self.tx.send_modify(|state| *state = SessionState::Closed);
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Fires the owning signal on drop, so a panicking or cancelled pump still
/// releases its sibling.
#[derive(Debug)]
pub struct FireOnDrop {
    signal: CompletionSignal,
}

impl Drop for FireOnDrop {
    fn drop(&mut self) {
        self.signal.fire();
    }
}
