//! One-shot actions that wait for a condition, polled on the frame cadence.

use tracing::{info, warn};

use crate::error::{BoxError, guarded};

/// State of a [`Deferred`] action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredState {
    Pending,
    Done,
    Failed(String),
}

type Ready = Box<dyn FnMut() -> bool>;
type Action = Box<dyn FnOnce() -> Result<(), BoxError>>;

/// An action run once, on the first poll where its condition holds.
pub struct Deferred {
    name: String,
    ready: Ready,
    action: Option<Action>,
    state: DeferredState,
}

impl Deferred {
    pub fn new(
        name: impl Into<String>,
        ready: impl FnMut() -> bool + 'static,
        action: impl FnOnce() -> Result<(), BoxError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            ready: Box::new(ready),
            action: Some(Box::new(action)),
            state: DeferredState::Pending,
        }
    }

    /// Run `action` after `frames` polls.
    pub fn after_frames(
        name: impl Into<String>,
        frames: u32,
        action: impl FnOnce() -> Result<(), BoxError> + 'static,
    ) -> Self {
        let mut remaining = frames;
        Self::new(
            name,
            move || {
                if remaining == 0 {
                    return true;
                }
                remaining -= 1;
                false
            },
            action,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &DeferredState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == DeferredState::Pending
    }

    /// Check the condition and run the action if it holds.
    pub fn poll(&mut self) -> &DeferredState {
        if !self.is_pending() || !(self.ready)() {
            return &self.state;
        }
        let Some(action) = self.action.take() else {
            return &self.state;
        };

        self.state = match guarded(action) {
            Ok(()) => {
                info!(task = %self.name, "Deferred task completed");
                DeferredState::Done
            }
            Err(e) => {
                warn!(task = %self.name, error = %e, "Deferred task failed");
                DeferredState::Failed(e.to_string())
            }
        };
        &self.state
    }
}

impl std::fmt::Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("name", &self.name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
