use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::HttpError;

/// Cancellation scope governing one logical call.
///
/// Cloning shares the same token and deadline. Attempt scopes derived with
/// [`CallContext::child_with_timeout`] never outlive their parent.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Context that never expires on its own; only [`CallContext::cancel`]
    /// ends it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context driven by an existing token.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Sets the deadline, keeping the earlier one if already set.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(deadline, |own| own.min(deadline)));
        self
    }

    /// Deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Cancels this context, every clone and every attempt scope derived
    /// from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Underlying token, for wiring into other cancellation-aware code.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The error this context ends with, if it already has.
    pub fn err(&self) -> Option<HttpError> {
        if self.token.is_cancelled() {
            return Some(HttpError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(HttpError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Scope for a single attempt: cancelled with the parent, expiring no
    /// later than the parent's deadline.
    pub fn child_with_timeout(&self, timeout: Option<Duration>) -> Self {
        let child = Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        };
        match timeout {
            Some(timeout) => child.with_timeout(timeout),
            None => child,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> HttpError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => HttpError::Cancelled,
                _ = sleep_until(deadline) => HttpError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                HttpError::Cancelled
            }
        }
    }
}
