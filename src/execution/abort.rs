//! Cooperative cancellation
//!
//! An [`AbortSignal`] is threaded by value through every async boundary:
//! interpreter, brick options, nested pipeline runs and the capability
//! router. Bricks observe it at their suspension points; nothing is
//! terminated preemptively.

use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why a signal fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Intentional cancellation (user closed the panel, Ctrl-C, ...)
    Cancelled,
    /// A derived timeout elapsed
    Timeout(Duration),
}

/// Cancellation token with a recorded reason
#[derive(Debug, Clone)]
pub struct AbortSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<AbortReason>>,
    parents: Vec<AbortSignal>,
}

impl AbortSignal {
    /// Create a signal that has not fired
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            reason: Arc::new(OnceLock::new()),
            parents: Vec::new(),
        }
    }

    /// Fire the signal as an intentional cancellation
    pub fn abort(&self) {
        self.abort_with(AbortReason::Cancelled);
    }

    /// Fire the signal with a reason; the first reason wins
    pub fn abort_with(&self, reason: AbortReason) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The reason the signal fired, inherited from whichever parent fired
    pub fn reason(&self) -> Option<AbortReason> {
        if !self.is_aborted() {
            return None;
        }
        if let Some(reason) = self.reason.get() {
            return Some(*reason);
        }
        self.parents
            .iter()
            .find_map(|parent| parent.reason())
            .or(Some(AbortReason::Cancelled))
    }

    /// True when the signal fired because a timeout elapsed
    pub fn timed_out(&self) -> bool {
        matches!(self.reason(), Some(AbortReason::Timeout(_)))
    }

    /// Wait until the signal fires
    pub async fn aborted(&self) {
        self.token.cancelled().await
    }

    /// Underlying token, for handing to remote handlers
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Derive a signal that fires when this one fires, and can also be
    /// fired on its own without affecting this one
    pub fn child(&self) -> AbortSignal {
        AbortSignal {
            token: self.token.child_token(),
            reason: Arc::new(OnceLock::new()),
            parents: vec![self.clone()],
        }
    }

    /// Signal that fires on its own after `duration`
    pub fn timeout(duration: Duration) -> AbortSignal {
        AbortSignal::new().with_timeout(duration)
    }

    /// Derive a signal that fires when this one fires or after `duration`,
    /// whichever comes first
    ///
    /// Must be called within a tokio runtime.
    pub fn with_timeout(&self, duration: Duration) -> AbortSignal {
        let child = self.child();
        let timer = child.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => timer.abort_with(AbortReason::Timeout(duration)),
                _ = timer.aborted() => {}
            }
        });
        child
    }

    /// Combine signals; the result fires when any of them fires
    ///
    /// Must be called within a tokio runtime when more than one signal is
    /// given. Watchers for the extra signals live until one of the signals
    /// fires.
    pub fn merge(signals: &[AbortSignal]) -> AbortSignal {
        let Some((first, rest)) = signals.split_first() else {
            return AbortSignal::new();
        };

        let mut merged = first.child();
        merged.parents.extend(rest.iter().cloned());

        if merged.is_aborted() || rest.iter().any(AbortSignal::is_aborted) {
            merged.token.cancel();
            return merged;
        }

        for other in rest {
            let source = other.token.clone();
            let target = merged.token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = source.cancelled() => target.cancel(),
                    _ = target.cancelled() => {}
                }
            });
        }

        merged
    }
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}
