//! Session controller: owns one listening attempt at a time.
//!
//! Every input (UI start request, source event, timer expiry) arrives as a
//! `ControllerEvent` on one queue and is handled to completion before the
//! next, so the controller needs no locks. Timers and source events carry the
//! generation of the lane that armed them; stale ones are dropped.
//!
//! An attempt starts either directly (`Start`) or after the spoken prompt:
//! `Prompt` asks the presenter to play the "say <target>" cue and
//! `PromptFinished` opens the source once it has played.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cancellation::CancelCoordinator;
use crate::config::{BunnyConfig, SessionConfig};
use crate::error::{SessionError, SourceError};
use crate::matcher::{MatchOutcome, PatternMatcher, Strategy};
use crate::metrics::{metric_names, AttemptIds, MetricsRegistry};
use crate::presenter::{FeedbackPresenter, FeedbackSignal, Navigator};
use crate::source::{SourceEvent, UnitSink, UtteranceSource, UtteranceUnit};
use crate::state_machine::{FeedbackState, SessionState, StateMachine};
use crate::target::TargetSound;

/// Input to the controller.
#[derive(Debug)]
pub enum ControllerEvent {
    /// UI asks to start listening.
    Start {
        reply: Option<oneshot::Sender<Result<(), SessionError>>>,
    },
    /// UI asks for the spoken prompt; listening starts once it has played.
    Prompt {
        reply: Option<oneshot::Sender<Result<(), SessionError>>>,
    },
    /// The presenter finished playing the prompt cue.
    PromptFinished,
    Source {
        generation: u64,
        event: SourceEvent,
    },
    Timeout {
        generation: u64,
    },
    RewardTick {
        generation: u64,
    },
    Advance {
        generation: u64,
    },
    /// Teardown: release everything and exit the loop.
    Shutdown,
}

/// External collaborators the controller drives.
pub struct Collaborators {
    pub source: Box<dyn UtteranceSource>,
    pub presenter: Arc<dyn FeedbackPresenter>,
    pub navigator: Arc<dyn Navigator>,
}

struct Attempt {
    ids: AttemptIds,
    started_at: Instant,
}

pub struct SessionController {
    target: TargetSound,
    matcher: Strategy,
    source: Box<dyn UtteranceSource>,
    presenter: Arc<dyn FeedbackPresenter>,
    navigator: Arc<dyn Navigator>,
    config: SessionConfig,
    machine: StateMachine,
    cancel: CancelCoordinator,
    metrics: Arc<MetricsRegistry>,
    events: mpsc::UnboundedSender<ControllerEvent>,
    attempt: Option<Attempt>,
    /// Source started and not yet stopped by us.
    source_active: bool,
    /// Recording indicator currently shown.
    recording: bool,
    soft_failed: bool,
    reward_step: u8,
    reward_active: bool,
    advanced: bool,
    /// Prompt presented; the next `PromptFinished` starts an attempt.
    prompt_pending: bool,
}

impl SessionController {
    pub fn new(
        target: TargetSound,
        config: &BunnyConfig,
        collaborators: Collaborators,
        metrics: Arc<MetricsRegistry>,
        events: mpsc::UnboundedSender<ControllerEvent>,
    ) -> Self {
        let matcher = Strategy::for_target(&target, config);
        info!(sound = %target, strategy = %matcher.kind(), source = collaborators.source.name(), "controller_created");
        Self {
            target,
            matcher,
            source: collaborators.source,
            presenter: collaborators.presenter,
            navigator: collaborators.navigator,
            config: config.session.clone(),
            machine: StateMachine::new(),
            cancel: CancelCoordinator::new(),
            metrics,
            events,
            attempt: None,
            source_active: false,
            recording: false,
            soft_failed: false,
            reward_step: 0,
            reward_active: false,
            advanced: false,
            prompt_pending: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.machine.current()
    }

    pub fn feedback_state(&self) -> FeedbackState {
        FeedbackState::derive(self.machine.current(), self.soft_failed, self.reward_step)
    }

    pub fn target(&self) -> &TargetSound {
        &self.target
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.machine.subscribe()
    }

    /// Handle one event. Returns false once the controller has shut down.
    pub fn handle(&mut self, event: ControllerEvent) -> bool {
        match event {
            ControllerEvent::Start { reply } => {
                let result = self.start();
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            ControllerEvent::Prompt { reply } => {
                let result = self.prompt();
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            ControllerEvent::PromptFinished => self.on_prompt_finished(),
            ControllerEvent::Source { generation, event } => {
                if !self.cancel.listen.is_current(generation)
                    || self.machine.current() != SessionState::Listening
                {
                    debug!(generation, state = %self.machine.current(), "source_event_ignored");
                    return true;
                }
                match event {
                    SourceEvent::Unit(unit) => self.on_unit(unit),
                    SourceEvent::Error(err) => self.on_source_error(err),
                    SourceEvent::Ended => self.on_source_ended(),
                }
            }
            ControllerEvent::Timeout { generation } => self.on_timeout(generation),
            ControllerEvent::RewardTick { generation } => self.on_reward_tick(generation),
            ControllerEvent::Advance { generation } => self.on_advance(generation),
            ControllerEvent::Shutdown => {
                self.shutdown();
                return false;
            }
        }
        true
    }

    /// Begin a new attempt. At most one attempt (or reward sequence) runs at a time.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.machine.current() == SessionState::Listening || self.reward_active {
            warn!(state = %self.machine.current(), reward_active = self.reward_active, "start_rejected");
            return Err(SessionError::AttemptActive);
        }

        // Idle, Success and TimedOut all lead to Listening
        self.machine.transition(SessionState::Listening)?;

        let (timeout_token, generation) = self.cancel.listen.cancel_and_advance();
        self.cancel.reward.cancel_all();
        self.matcher.reset();
        self.soft_failed = false;
        self.reward_step = 0;
        self.advanced = false;
        self.prompt_pending = false;

        let ids = AttemptIds::new(generation);
        info!(
            attempt_id = %ids.attempt_id,
            generation,
            sound = %self.target,
            strategy = %self.matcher.kind(),
            timeout_ms = self.config.listen_timeout_ms,
            "attempt_started"
        );
        self.attempt = Some(Attempt {
            ids,
            started_at: Instant::now(),
        });

        let span = self.metrics.span(metric_names::SOURCE_START);
        let sink = UnitSink::new(generation, self.events.clone());
        if let Err(err) = self.source.start(sink) {
            // any failure to open the source is fatal to the attempt
            self.fail_fatal(err.message().to_string());
            return Err(err.into());
        }
        span.finish();
        self.source_active = true;

        self.set_recording(true);
        self.arm(
            self.config.listen_timeout(),
            ControllerEvent::Timeout { generation },
            timeout_token,
        );
        Ok(())
    }

    /// Present the spoken prompt. Refused while an attempt or reward runs,
    /// like `start`. Presenting it again before it finishes is allowed.
    pub fn prompt(&mut self) -> Result<(), SessionError> {
        if self.machine.current() == SessionState::Listening || self.reward_active {
            warn!(state = %self.machine.current(), reward_active = self.reward_active, "prompt_rejected");
            return Err(SessionError::AttemptActive);
        }
        self.prompt_pending = true;
        self.presenter.present(FeedbackSignal::Prompt {
            target: self.target.label().to_string(),
        });
        info!(sound = %self.target, "prompt_presented");
        Ok(())
    }

    /// The prompt cue has played: start listening, once.
    fn on_prompt_finished(&mut self) {
        if !self.prompt_pending {
            debug!(state = %self.machine.current(), "prompt_finished_ignored");
            return;
        }
        self.prompt_pending = false;
        if let Err(e) = self.start() {
            warn!(error = %e, "start_after_prompt_failed");
        }
    }

    fn on_unit(&mut self, unit: UtteranceUnit) {
        let span = self.metrics.span(metric_names::MATCH_EVAL);
        let outcome = self.matcher.evaluate(&unit);
        span.finish();

        match outcome {
            MatchOutcome::Matched => self.succeed(),
            MatchOutcome::Missed => self.soft_failure("no_match"),
            MatchOutcome::Inconclusive => {}
        }
    }

    /// The single guarded Listening → Success transition.
    fn succeed(&mut self) {
        if self.machine.transition(SessionState::Success).is_err() {
            return;
        }
        self.cancel.listen.cancel_all();
        self.stop_source();
        self.soft_failed = false;

        self.set_recording(false);
        self.presenter.present(FeedbackSignal::Success);
        let elapsed_ms = self.elapsed_ms();
        self.metrics.record(metric_names::ATTEMPT_SUCCESS_MS, elapsed_ms);
        info!(attempt_id = %self.attempt_id(), elapsed_ms, "attempt_succeeded");

        let (token, generation) = self.cancel.reward.cancel_and_advance();
        self.reward_active = true;
        self.arm(
            self.config.reward_step_interval(),
            ControllerEvent::RewardTick { generation },
            token,
        );
    }

    fn soft_failure(&mut self, reason: &'static str) {
        if self.machine.current() != SessionState::Listening {
            return;
        }
        self.soft_failed = true;
        self.presenter.present(FeedbackSignal::SoftFailure);
        let elapsed_ms = self.elapsed_ms();
        self.metrics.record(metric_names::SOFT_FAILURE_MS, elapsed_ms);
        debug!(attempt_id = %self.attempt_id(), reason, elapsed_ms, "soft_failure");
    }

    fn on_timeout(&mut self, generation: u64) {
        if !self.cancel.listen.is_current(generation)
            || self.machine.current() != SessionState::Listening
        {
            debug!(generation, "stale_timeout_ignored");
            return;
        }
        if self.machine.transition(SessionState::TimedOut).is_err() {
            return;
        }
        self.cancel.listen.cancel_all();
        self.stop_source();
        self.set_recording(false);
        self.soft_failed = true;
        self.presenter.present(FeedbackSignal::SoftFailure);

        let elapsed_ms = self.elapsed_ms();
        self.metrics.record(metric_names::ATTEMPT_TIMED_OUT_MS, elapsed_ms);
        info!(attempt_id = %self.attempt_id(), elapsed_ms, "attempt_timed_out");
    }

    fn on_source_error(&mut self, err: SourceError) {
        if err.is_fatal() {
            self.fail_fatal(err.message().to_string());
            return;
        }
        warn!(attempt_id = %self.attempt_id(), error = %err, "recognition_error");
        self.soft_failure("recognition_error");
    }

    /// End the attempt without success: release everything, back to Idle.
    fn fail_fatal(&mut self, message: String) {
        warn!(attempt_id = %self.attempt_id(), error = %message, "source_unavailable");
        self.cancel.listen.cancel_all();
        self.stop_source();
        self.set_recording(false);
        if let Err(e) = self.machine.transition(SessionState::Idle) {
            warn!(error = %e, "fatal_error_outside_attempt");
            self.machine.force_idle();
        }
        self.attempt = None;
        self.metrics.record(metric_names::SOURCE_UNAVAILABLE, 1.0);
        self.presenter
            .present(FeedbackSignal::SourceUnavailable { message });
    }

    /// The source finished on its own; the attempt keeps waiting for the timeout.
    fn on_source_ended(&mut self) {
        debug!(attempt_id = %self.attempt_id(), "source_ended");
        self.set_recording(false);
    }

    fn on_reward_tick(&mut self, generation: u64) {
        if !self.reward_active || !self.cancel.reward.is_current(generation) {
            return;
        }
        self.reward_step += 1;
        self.presenter.present(FeedbackSignal::RewardStep {
            step: self.reward_step,
        });
        debug!(step = self.reward_step, "reward_step");

        let token = self.cancel.reward.child_token();
        if self.reward_step < self.config.reward_steps {
            self.arm(
                self.config.reward_step_interval(),
                ControllerEvent::RewardTick { generation },
                token,
            );
        } else {
            self.presenter.present(FeedbackSignal::RewardComplete);
            self.arm(
                self.config.advance_grace(),
                ControllerEvent::Advance { generation },
                token,
            );
        }
    }

    fn on_advance(&mut self, generation: u64) {
        if self.advanced || !self.reward_active || !self.cancel.reward.is_current(generation) {
            return;
        }
        self.advanced = true;
        self.reward_active = false;
        info!(attempt_id = %self.attempt_id(), "advance");
        self.navigator.advance();
    }

    /// Release the source and every pending timer.
    pub fn shutdown(&mut self) {
        self.cancel.cancel_all();
        self.stop_source();
        self.set_recording(false);
        self.reward_active = false;
        self.prompt_pending = false;
        self.machine.force_idle();
        info!("controller_shutdown");
    }

    /// Stop the source at most once per attempt.
    fn stop_source(&mut self) {
        if self.source_active {
            self.source.stop();
            self.source_active = false;
            debug!(source = self.source.name(), "source_stopped");
        }
    }

    fn set_recording(&mut self, on: bool) {
        if self.recording == on {
            return;
        }
        self.recording = on;
        self.presenter.present(if on {
            FeedbackSignal::RecordingStarted
        } else {
            FeedbackSignal::RecordingStopped
        });
    }

    /// Deliver `event` after `after` unless `token` is cancelled first.
    fn arm(&self, after: Duration, event: ControllerEvent, token: CancellationToken) {
        let tx = self.events.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(after) => {
                    let _ = tx.send(event);
                }
            }
        });
    }

    fn elapsed_ms(&self) -> f64 {
        self.attempt
            .as_ref()
            .map(|a| a.started_at.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }

    fn attempt_id(&self) -> &str {
        self.attempt
            .as_ref()
            .map(|a| a.ids.attempt_id.as_str())
            .unwrap_or("-")
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.cancel.cancel_all();
        self.stop_source();
    }
}
