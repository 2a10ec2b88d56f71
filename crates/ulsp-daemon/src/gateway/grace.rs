//! User-selection grace period for `showMessageRequest` (§4.C): a progress
//! token that tracks how long the editor has been waiting on the user,
//! with an update nudge at 5s and a forced end at 2min so the token never
//! leaks if the user never answers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lsp_types::{MessageActionItem, ShowMessageRequestParams};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::IdeGateway;

const UPDATE_AFTER: Duration = Duration::from_secs(5);
const FORCED_END_AFTER: Duration = Duration::from_secs(2 * 60);

/// Done-handle for a grace-timed `showMessageRequest`. Dropping it (or
/// calling [`GraceHandle::finish`]) cancels both timers and emits the
/// progress `end` event if it hasn't already fired.
pub struct GraceHandle {
    gateway: Arc<IdeGateway>,
    session_id: Uuid,
    token: String,
    ended: Arc<AtomicBool>,
    update_timer: JoinHandle<()>,
    forced_end_timer: JoinHandle<()>,
}

impl GraceHandle {
    /// Finish the grace period normally: cancel both timers, and emit
    /// progress `end` only if the forced-end timer hasn't already fired.
    pub async fn finish(self) {
        self.update_timer.abort();
        self.forced_end_timer.abort();
        if !self.ended.swap(true, Ordering::SeqCst) {
            let _ = self.gateway.progress_end(self.session_id, self.token.clone(), None).await;
        }
    }
}

impl Drop for GraceHandle {
    fn drop(&mut self) {
        self.update_timer.abort();
        self.forced_end_timer.abort();
        if !self.ended.swap(true, Ordering::SeqCst) {
            let gateway = Arc::clone(&self.gateway);
            let session_id = self.session_id;
            let token = self.token.clone();
            tokio::spawn(async move {
                let _ = gateway.progress_end(session_id, token, None).await;
            });
        }
    }
}

/// Begin the grace period and kick off the underlying `showMessageRequest`.
pub fn begin(
    gateway: Arc<IdeGateway>,
    session_id: Uuid,
    params: ShowMessageRequestParams,
) -> (oneshot::Receiver<Option<MessageActionItem>>, GraceHandle) {
    let token = Uuid::new_v4().to_string();
    let ended = Arc::new(AtomicBool::new(false));
    let (tx, rx) = oneshot::channel();

    {
        let gateway = Arc::clone(&gateway);
        let session_id = session_id;
        let token = token.clone();
        tokio::spawn(async move {
            let _ = gateway.work_done_progress_create(session_id, token.clone()).await;
            let _ = gateway
                .progress_begin(
                    session_id,
                    token,
                    "Awaiting user input".to_string(),
                    Some("Waiting for input...".to_string()),
                    false,
                )
                .await;
        });
    }
    {
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move {
            let _ = gateway.show_message_request(session_id, params).await;
        });
    }

    let update_timer = {
        let gateway = Arc::clone(&gateway);
        let token = token.clone();
        let ended = Arc::clone(&ended);
        tokio::spawn(async move {
            tokio::time::sleep(UPDATE_AFTER).await;
            if !ended.load(Ordering::SeqCst) {
                let _ = gateway
                    .progress_report(session_id, token, Some("Still waiting for input...".to_string()))
                    .await;
            }
        })
    };

    let forced_end_timer = {
        let gateway = Arc::clone(&gateway);
        let token = token.clone();
        let ended = Arc::clone(&ended);
        tokio::spawn(async move {
            tokio::time::sleep(FORCED_END_AFTER).await;
            if !ended.swap(true, Ordering::SeqCst) {
                let _ = gateway.progress_end(session_id, token, None).await;
                let _ = tx.send(None);
            }
        })
    };

    (rx, GraceHandle { gateway, session_id, token, ended, update_timer, forced_end_timer })
}
