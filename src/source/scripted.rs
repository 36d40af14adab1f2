//! Scripted source: replays a timed list of events. Stands in for a speech
//! recognizer in demos and tests, and for recognizers living outside the
//! process (the UI pushes results it already has).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{SourceEvent, UnitSink, UtteranceSource, UtteranceUnit};
use crate::error::SourceError;

/// One scripted event, emitted `delay` after the previous one.
#[derive(Debug, Clone)]
pub struct ScriptStep {
    pub delay: Duration,
    pub event: SourceEvent,
}

impl ScriptStep {
    pub fn new(delay: Duration, event: SourceEvent) -> Self {
        Self { delay, event }
    }
}

pub struct ScriptedSource {
    steps: Vec<ScriptStep>,
    /// Set when the capability lookup at construction failed.
    unavailable: Option<String>,
    token: Option<CancellationToken>,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            unavailable: None,
            token: None,
            starts: Arc::new(AtomicUsize::new(0)),
            stops: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Final transcripts spaced `spacing` apart, then a natural end.
    pub fn transcripts<I, S>(texts: I, spacing: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut steps: Vec<ScriptStep> = texts
            .into_iter()
            .map(|t| ScriptStep::new(spacing, SourceEvent::Unit(UtteranceUnit::transcript(t))))
            .collect();
        steps.push(ScriptStep::new(spacing, SourceEvent::Ended));
        Self::new(steps)
    }

    /// A source whose `start` always fails, as when permission is denied.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let mut source = Self::new(Vec::new());
        source.unavailable = Some(reason.into());
        source
    }

    /// Counter of `start` calls that succeeded.
    pub fn start_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.starts)
    }

    /// Counter of every `stop` call.
    pub fn stop_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.stops)
    }

    /// Cancel the replay task if one is running.
    fn cancel_replay(&mut self) -> bool {
        match self.token.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

impl UtteranceSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn start(&mut self, sink: UnitSink) -> Result<(), SourceError> {
        if let Some(reason) = &self.unavailable {
            return Err(SourceError::Unavailable(reason.clone()));
        }
        self.cancel_replay();

        let generation = sink.generation();
        let token = CancellationToken::new();
        let child = token.child_token();
        let steps = self.steps.clone();
        self.token = Some(token);
        self.starts.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            for step in steps {
                tokio::select! {
                    _ = child.cancelled() => {
                        debug!("scripted replay cancelled");
                        return;
                    }
                    _ = tokio::time::sleep(step.delay) => {}
                }
                let event = match step.event {
                    SourceEvent::Unit(UtteranceUnit::Frame(mut frame)) => {
                        frame.captured_at = tokio::time::Instant::now().into_std();
                        SourceEvent::Unit(UtteranceUnit::Frame(frame))
                    }
                    other => other,
                };
                let ended = matches!(event, SourceEvent::Ended);
                if !sink.send(event) || ended {
                    return;
                }
            }
        });

        info!(generation, steps = self.steps.len(), "scripted_source_started");
        Ok(())
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.cancel_replay() {
            info!("scripted_source_stopped");
        }
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.cancel_replay();
    }
}
