//! Session loop: a tokio task owning the controller. Source events, timer
//! expiries and UI requests are queued on one channel and processed strictly
//! in arrival order.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::BunnyConfig;
use crate::controller::{Collaborators, ControllerEvent, SessionController};
use crate::error::SessionError;
use crate::metrics::MetricsRegistry;
use crate::state_machine::SessionState;
use crate::target::TargetSound;

/// UI-side handle of a running session.
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<ControllerEvent>,
    state_rx: watch::Receiver<SessionState>,
    join: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Request a new listening attempt and wait for the source to come up.
    pub async fn start(&self) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ControllerEvent::Start {
                reply: Some(reply_tx),
            })
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Play the spoken prompt instead of listening right away. Listening
    /// starts when the presenter calls [`prompt_finished`](Self::prompt_finished).
    pub async fn prompt(&self) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ControllerEvent::Prompt {
                reply: Some(reply_tx),
            })
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)?
    }

    /// The prompt cue has played. Ignored unless a prompt is pending.
    pub fn prompt_finished(&self) -> Result<(), SessionError> {
        self.tx
            .send(ControllerEvent::PromptFinished)
            .map_err(|_| SessionError::Closed)
    }

    /// Wait until the session is no longer listening and return where it
    /// ended up: `Success`, `TimedOut`, or `Idle` after a fatal source error.
    pub async fn wait_settled(&self) -> SessionState {
        let mut rx = self.state_rx.clone();
        let settled = match rx.wait_for(|s| *s != SessionState::Listening).await {
            Ok(state) => *state,
            // loop gone; whatever it last published is final
            Err(_) => *self.state_rx.borrow(),
        };
        settled
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Tear the session down, releasing the source, and wait for the loop to exit.
    pub async fn shutdown(mut self) {
        let _ = self.tx.send(ControllerEvent::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.join.is_some() {
            let _ = self.tx.send(ControllerEvent::Shutdown);
        }
    }
}

/// Spawn the session loop for `target`. Must be called inside a tokio runtime.
pub fn spawn_session(
    target: TargetSound,
    config: &BunnyConfig,
    collaborators: Collaborators,
    metrics: Arc<MetricsRegistry>,
) -> SessionHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let controller = SessionController::new(target, config, collaborators, metrics, tx.clone());
    let state_rx = controller.subscribe();
    let join = tokio::spawn(run_session_loop(controller, rx));
    SessionHandle {
        tx,
        state_rx,
        join: Some(join),
    }
}

async fn run_session_loop(
    mut controller: SessionController,
    mut rx: mpsc::UnboundedReceiver<ControllerEvent>,
) {
    info!(sound = %controller.target(), "session loop started");
    while let Some(event) = rx.recv().await {
        if !controller.handle(event) {
            break;
        }
    }
    info!("session loop exiting");
}
