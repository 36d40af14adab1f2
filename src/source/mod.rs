//! Utterance sources: where transcripts and analyser frames come from.
//! A source is owned by the controller for one attempt: started on `start()`,
//! stopped on success, timeout, fatal error or teardown.

pub mod scripted;
#[cfg(feature = "microphone")]
pub mod microphone;

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};

use crate::controller::ControllerEvent;
use crate::error::SourceError;

pub use scripted::{ScriptStep, ScriptedSource};
#[cfg(feature = "microphone")]
pub use microphone::MicrophoneSource;

/// One analyser tick: byte spectrum + byte waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// 0-255 scaled magnitude per frequency bin.
    pub frequency: Vec<u8>,
    /// Waveform bytes centred on 128.
    pub time_domain: Vec<u8>,
    pub captured_at: Instant,
}

/// Unit of input consumed by the matcher.
#[derive(Debug, Clone, PartialEq)]
pub enum UtteranceUnit {
    /// One recognition result; interim results have `is_final == false`.
    Transcript { text: String, is_final: bool },
    Frame(AudioFrame),
}

impl UtteranceUnit {
    /// Final transcript.
    pub fn transcript(text: impl Into<String>) -> Self {
        UtteranceUnit::Transcript {
            text: text.into(),
            is_final: true,
        }
    }

    /// Frame captured now.
    pub fn frame(frequency: Vec<u8>, time_domain: Vec<u8>) -> Self {
        UtteranceUnit::Frame(AudioFrame {
            frequency,
            time_domain,
            captured_at: Instant::now(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            UtteranceUnit::Transcript { .. } => "transcript",
            UtteranceUnit::Frame(_) => "frame",
        }
    }
}

/// What a running source reports.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Unit(UtteranceUnit),
    Error(SourceError),
    /// The source finished on its own (e.g. recognizer end of speech).
    Ended,
}

/// Channel from a running source back into the session loop. Tagged with the
/// attempt generation so late events from a stopped source are discarded.
#[derive(Clone)]
pub struct UnitSink {
    generation: u64,
    tx: mpsc::UnboundedSender<ControllerEvent>,
}

impl UnitSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<ControllerEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false once the session loop is gone.
    pub fn send(&self, event: SourceEvent) -> bool {
        self.tx
            .send(ControllerEvent::Source {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    pub fn unit(&self, unit: UtteranceUnit) -> bool {
        self.send(SourceEvent::Unit(unit))
    }

    pub fn error(&self, err: SourceError) -> bool {
        self.send(SourceEvent::Error(err))
    }

    pub fn ended(&self) -> bool {
        self.send(SourceEvent::Ended)
    }
}

/// Source adapter (recognizer, microphone, scripted replay).
pub trait UtteranceSource: Send {
    fn name(&self) -> &'static str;

    /// Begin producing units into `sink`. Fails with `SourceError::Unavailable`
    /// when permission is denied or the capability is missing; never retried.
    fn start(&mut self, sink: UnitSink) -> Result<(), SourceError>;

    /// Stop producing and release any held device. Idempotent, safe after a
    /// natural end.
    fn stop(&mut self);
}

/// Wait for a capture device opened on another thread to report readiness.
/// A dropped reporter or an expired `limit` both count as unavailable.
#[cfg_attr(not(feature = "microphone"), allow(dead_code))]
pub(crate) async fn await_device_open(
    ready: oneshot::Receiver<Result<(), String>>,
    limit: Duration,
) -> Result<(), SourceError> {
    match tokio::time::timeout(limit, ready).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(reason))) => Err(SourceError::Unavailable(reason)),
        Ok(Err(_)) => Err(SourceError::Unavailable("capture thread exited before opening".into())),
        Err(_) => Err(SourceError::Unavailable("timed out opening input device".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_device_open_reported() {
        let (tx, rx) = oneshot::channel();
        tx.send(Ok(())).unwrap();
        assert_eq!(await_device_open(rx, Duration::from_secs(5)).await, Ok(()));

        let (tx, rx) = oneshot::channel();
        tx.send(Err("permission denied".to_string())).unwrap();
        assert_eq!(
            await_device_open(rx, Duration::from_secs(5)).await,
            Err(SourceError::Unavailable("permission denied".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_open_times_out_without_blocking() {
        let (tx, rx) = oneshot::channel::<Result<(), String>>();
        let started = tokio::time::Instant::now();
        let waiting = tokio::spawn(await_device_open(rx, Duration::from_secs(5)));

        // other timers keep running while the open is pending
        tokio::time::sleep(Duration::from_millis(16)).await;
        assert_eq!(started.elapsed(), Duration::from_millis(16));
        assert!(!waiting.is_finished());

        let result = waiting.await.unwrap();
        assert!(matches!(result, Err(SourceError::Unavailable(_))));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        drop(tx);
    }

    #[tokio::test]
    async fn test_device_open_reporter_gone() {
        let (tx, rx) = oneshot::channel::<Result<(), String>>();
        drop(tx);
        assert!(matches!(
            await_device_open(rx, Duration::from_secs(5)).await,
            Err(SourceError::Unavailable(_))
        ));
    }
}
