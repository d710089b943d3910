//! Per-request cancellation and deadline.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::ServiceError;

/// Why a raced call did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("request cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl From<Interrupted> for ServiceError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::Cancelled => ServiceError::Cancelled,
            Interrupted::DeadlineExceeded => ServiceError::DeadlineExceeded,
        }
    }
}

/// Cancellation token and optional deadline for one use case call.
///
/// Every repository and publisher call a use case makes is raced against
/// both; whichever fires first wins.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context that is never cancelled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline(Instant::now() + timeout)
    }

    /// A context cancelled together with `parent`.
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            deadline: None,
        }
    }

    /// Sets the deadline, keeping the earlier one if already set.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Sets the deadline to `timeout` from now, keeping an earlier one.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(Instant::now() + timeout)
    }

    /// The same deadline, detached from cancellation.
    pub fn deadline_only(&self) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: self.deadline,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Time left before the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fails fast if the context is already cancelled or expired.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.token.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(Interrupted::DeadlineExceeded);
        }
        Ok(())
    }

    /// Runs `fut` unless cancellation or the deadline comes first.
    ///
    /// An interrupted future is dropped.
    pub async fn race<F>(&self, fut: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Interrupted::Cancelled),
            _ = sleep_until(self.deadline) => Err(Interrupted::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_when_nothing_interrupts() {
        let ctx = RequestContext::new();
        assert_eq!(ctx.race(async { 7 }).await, Ok(7));
        assert!(ctx.remaining().is_none());
    }

    #[tokio::test]
    async fn cancelled_context_fails_fast() {
        let ctx = RequestContext::new();
        ctx.cancel();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.race(async { 7 }).await, Err(Interrupted::Cancelled));
    }

    #[tokio::test]
    async fn parent_cancellation_reaches_child() {
        let parent = CancellationToken::new();
        let ctx = RequestContext::child_of(&parent);

        let pending = ctx.race(std::future::pending::<()>());
        parent.cancel();
        assert_eq!(pending.await, Err(Interrupted::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_slow_calls() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(50));
        let slow = tokio::time::sleep(Duration::from_secs(10));
        assert_eq!(ctx.race(slow).await, Err(Interrupted::DeadlineExceeded));
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_only_ignores_cancellation() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(50));
        ctx.cancel();

        let detached = ctx.deadline_only();
        assert!(!detached.is_cancelled());
        assert_eq!(detached.race(async { 7 }).await, Ok(7));

        let slow = tokio::time::sleep(Duration::from_secs(10));
        assert_eq!(
            detached.race(slow).await,
            Err(Interrupted::DeadlineExceeded)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_deadline_wins() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(1))
            .timeout(Duration::from_secs(60));
        assert!(ctx.remaining().unwrap() <= Duration::from_secs(1));
    }

    #[test]
    fn interruptions_map_to_service_errors() {
        assert_eq!(
            ServiceError::from(Interrupted::Cancelled).kind(),
            "CANCELLED"
        );
        assert_eq!(
            ServiceError::from(Interrupted::DeadlineExceeded).kind(),
            "DEADLINE_EXCEEDED"
        );
    }
}
