//! The operator's stop signal.

use crate::errors::{BuildError, BuildResult};
use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Hook run once when a token fires.
pub type CancelCallback = Box<dyn FnOnce() + Send>;

const DEFAULT_REASON: &str = "cancellation requested";

/// A cooperative cancellation signal shared by the runner and its steps.
///
/// The first `cancel` wins: its reason is the one every later observer sees.
#[derive(Default)]
pub struct CancellationToken {
    fired: AtomicBool,
    reason: RwLock<Option<String>>,
    // Drained by the firing `cancel`; never touched again afterwards.
    hooks: Mutex<Vec<CancelCallback>>,
    wakeup: Notify,
}

impl CancellationToken {
    /// Creates a token that has not fired.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the token. Later calls are ignored.
    pub fn cancel(&self, reason: impl Into<String>) {
        {
            let mut slot = self.reason.write();
            if slot.is_some() {
                return;
            }
            let reason = reason.into();
            debug!(%reason, "cancellation token fired");
            *slot = Some(reason);
        }
        self.fired.store(true, Ordering::SeqCst);
        self.wakeup.notify_waiters();

        let hooks = std::mem::take(&mut *self.hooks.lock());
        for hook in hooks {
            run_hook(hook);
        }
    }

    /// Registers `callback` to run when the token fires, or runs it now if
    /// it already has.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut hooks = self.hooks.lock();
        if self.is_cancelled() {
            drop(hooks);
            run_hook(Box::new(callback));
        } else {
            hooks.push(Box::new(callback));
        }
    }

    /// Returns whether the token has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Returns the winning reason, if the token has fired.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Returns the winning reason, or a generic one.
    #[must_use]
    pub fn reason_or_default(&self) -> String {
        self.reason().unwrap_or_else(|| DEFAULT_REASON.to_string())
    }

    /// Resolves once the token has fired.
    pub async fn cancelled(&self) {
        loop {
            // Must exist before the flag check or a concurrent cancel is lost.
            let notified = self.wakeup.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Waits for `duration`, or fails with `Cancelled` as soon as the token
    /// fires.
    pub async fn sleep(&self, duration: Duration) -> BuildResult<()> {
        if !self.is_cancelled() {
            tokio::select! {
                () = tokio::time::sleep(duration) => return Ok(()),
                () = self.cancelled() => {}
            }
        }
        Err(BuildError::Cancelled(self.reason_or_default()))
    }
}

fn run_hook(hook: CancelCallback) {
    if catch_unwind(AssertUnwindSafe(hook)).is_err() {
        warn!("cancellation hook panicked");
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}
