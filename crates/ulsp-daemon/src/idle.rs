//! Idle Supervisor (§4.J): shuts the process down after a configured idle
//! period with zero sessions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::session::SessionRepository;

/// One-shot timer plus a cached idle timeout, armed and disarmed on every
/// session lifecycle event.
pub struct IdleSupervisor {
    idle_timeout: Duration,
    sessions: Arc<SessionRepository>,
    timer: Mutex<Option<JoinHandle<()>>>,
    full_shutdown_requested: AtomicBool,
    shutdown_tx: mpsc::Sender<()>,
}

impl IdleSupervisor {
    /// Build a supervisor over `sessions`, with no timer armed yet.
    /// `shutdown_tx` is the process root's signal to begin shutdown; its
    /// receiver is expected to live for the process lifetime.
    pub fn new(idle_timeout: Duration, sessions: Arc<SessionRepository>, shutdown_tx: mpsc::Sender<()>) -> Self {
        Self {
            idle_timeout,
            sessions,
            timer: Mutex::new(None),
            full_shutdown_requested: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    /// Called from every session lifecycle teardown (§4.I). Stops any
    /// armed timer; re-arms it only if the session count is now zero.
    pub fn refresh(self: &Arc<Self>) {
        self.stop_timer();
        if self.sessions.session_count() == 0 {
            self.arm_timer(self.idle_timeout);
        }
    }

    /// Set the sticky full-shutdown flag (`ulsp/requestFullShutdown`).
    /// Subsequent `exit` handlers should call [`IdleSupervisor::fire_now`]
    /// instead of just ending their own session.
    pub fn request_full_shutdown(&self) {
        self.full_shutdown_requested.store(true, Ordering::SeqCst);
    }

    /// Whether `request_full_shutdown` has been called.
    pub fn is_full_shutdown_requested(&self) -> bool {
        self.full_shutdown_requested.load(Ordering::SeqCst)
    }

    /// Arm the timer to fire immediately, bypassing the idle wait. Used by
    /// `exit` once full shutdown has been requested.
    pub fn fire_now(self: &Arc<Self>) {
        self.stop_timer();
        self.arm_timer(Duration::ZERO);
    }

    fn stop_timer(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
        }
    }

    fn arm_timer(self: &Arc<Self>, after: Duration) {
        let supervisor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            supervisor.fire().await;
        });
        *self.timer.lock() = Some(handle);
    }

    async fn fire(&self) {
        if self.shutdown_tx.send(()).await.is_err() {
            tracing::error!("idle shutdown signal could not be delivered; aborting process");
            std::process::exit(1);
        }
    }
}
