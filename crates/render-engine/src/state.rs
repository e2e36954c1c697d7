//! Render invocation state machine.

use std::fmt;

use chronocam_common::error::{ChronocamError, ChronocamResult};
use serde::Serialize;

/// Where a render invocation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderState {
    Validating,
    Estimating,
    SinglePass,
    Batching,
    Encoding,
    Concatenating,
    Completed,
    Failed,
    Cancelled,
}

impl RenderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    fn can_move_to(&self, next: RenderState) -> bool {
        use RenderState::*;
        if self.is_terminal() {
            return false;
        }
        if matches!(next, Failed | Cancelled) {
            return true;
        }
        matches!(
            (self, next),
            (Validating, Estimating)
                | (Estimating, SinglePass)
                | (Estimating, Batching)
                | (SinglePass, Encoding)
                | (Batching, Encoding)
                | (Encoding, Concatenating)
                | (Encoding, Completed)
                | (Concatenating, Completed)
        )
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validating => "validating",
            Self::Estimating => "estimating",
            Self::SinglePass => "single pass",
            Self::Batching => "batching",
            Self::Encoding => "encoding",
            Self::Concatenating => "concatenating",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Tracks one invocation and rejects out-of-order transitions.
#[derive(Debug, Clone)]
pub struct RenderStateMachine {
    state: RenderState,
    batched: bool,
    history: Vec<RenderState>,
}

impl Default for RenderStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderStateMachine {
    pub fn new() -> Self {
        Self {
            state: RenderState::Validating,
            batched: false,
            history: vec![RenderState::Validating],
        }
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn history(&self) -> &[RenderState] {
        &self.history
    }

    pub fn transition(&mut self, next: RenderState) -> ChronocamResult<()> {
        let allowed = self.state.can_move_to(next)
            && match (self.state, next) {
                // Single-pass renders produce the output directly.
                (RenderState::Encoding, RenderState::Concatenating) => self.batched,
                (RenderState::Encoding, RenderState::Completed) => !self.batched,
                _ => true,
            };
        if !allowed {
            return Err(ChronocamError::Other(anyhow::anyhow!(
                "illegal render state transition: {} -> {}",
                self.state,
                next
            )));
        }
        if next == RenderState::Batching {
            self.batched = true;
        }
        tracing::debug!(from = %self.state, to = %next, "Render state");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to `Failed` or `Cancelled` to match `error`, if not already terminal.
    pub fn fail_with(&mut self, error: &ChronocamError) {
        if self.state.is_terminal() {
            return;
        }
        let next = if error.is_cancellation() {
            RenderState::Cancelled
        } else {
            RenderState::Failed
        };
        self.state = next;
        self.history.push(next);
    }
}
