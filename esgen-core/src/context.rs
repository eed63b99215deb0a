//! Cancellation and deadlines for runtime operations.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{sync::Notify, time::Instant};

/// Why an operation stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
    #[error("context canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Carries cancellation and an optional deadline through a call.
///
/// Clones share the cancellation signal, so canceling any clone interrupts
/// every operation running under the others.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: Arc<CancelSignal>,
    deadline: Option<Instant>,
}

#[derive(Debug, Default)]
struct CancelSignal {
    canceled: AtomicBool,
    notify: Notify,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deadline, keeping an earlier one if already set.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
        self
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.canceled.store(true, Ordering::SeqCst);
        self.cancel.notify.notify_waiters();
    }

    /// # Errors
    ///
    /// Returns why the context is no longer live.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.cancel.canceled.load(Ordering::SeqCst) {
            return Err(Interrupted::Canceled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Interrupted::DeadlineExceeded);
        }
        Ok(())
    }

    /// Resolves once the context is canceled or its deadline passes.
    pub async fn interrupted(&self) -> Interrupted {
        let canceled = async {
            loop {
                let notified = self.cancel.notify.notified();
                if self.cancel.canceled.load(Ordering::SeqCst) {
                    return Interrupted::Canceled;
                }
                notified.await;
            }
        };
        match self.deadline {
            Some(deadline) => tokio::select! {
                reason = canceled => reason,
                () = tokio::time::sleep_until(deadline) => Interrupted::DeadlineExceeded,
            },
            None => canceled.await,
        }
    }

    /// Runs `future` unless the context is interrupted first.
    ///
    /// # Errors
    ///
    /// Returns why the context was interrupted; `future` is dropped.
    pub async fn run<F: Future>(&self, future: F) -> Result<F::Output, Interrupted> {
        self.check()?;
        tokio::select! {
            biased;
            output = future => Ok(output),
            reason = self.interrupted() => Err(reason),
        }
    }
}
