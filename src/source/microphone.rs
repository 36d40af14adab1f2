//! Microphone source: cpal capture → ring buffer → analyser tick → frames.
//!
//! The cpal stream is created, played and dropped on a dedicated capture
//! thread, so dropping it always releases the device. `start` never waits for
//! the device: the tick task awaits the open (permission prompt included) and
//! reports a failure through the sink as `Unavailable`.

use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel as cb;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{await_device_open, UnitSink, UtteranceSource, UtteranceUnit};
use crate::audio::{Analyser, RingBuffer};
use crate::config::AnalyserConfig;
use crate::error::SourceError;

/// Longest wait for the device to open.
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

struct Running {
    /// Capacity one: a single message releases the stream.
    stop_tx: cb::Sender<()>,
    tick_token: CancellationToken,
}

pub struct MicrophoneSource {
    config: AnalyserConfig,
    /// Resolved once at construction; `None` means capture is unsupported here.
    device: Option<cpal::Device>,
    running: Option<Running>,
}

impl MicrophoneSource {
    /// Look up the default input device once.
    pub fn new(config: AnalyserConfig) -> Self {
        let host = cpal::default_host();
        let device = host.default_input_device();
        match &device {
            Some(d) => info!(device = %d.name().unwrap_or_else(|_| "?".into()), "input_device_found"),
            None => warn!("no audio input device available"),
        }
        Self {
            config,
            device,
            running: None,
        }
    }
}

impl UtteranceSource for MicrophoneSource {
    fn name(&self) -> &'static str {
        "microphone"
    }

    fn start(&mut self, sink: UnitSink) -> Result<(), SourceError> {
        self.stop();
        let device = self
            .device
            .clone()
            .ok_or_else(|| SourceError::Unavailable("no audio input device available".into()))?;

        let ring = Arc::new(Mutex::new(RingBuffer::new(self.config.fft_size * 2)));

        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel::<Result<(), String>>();
        let (stop_tx, stop_rx) = cb::bounded::<()>(1);
        let stream_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let ring_capture = Arc::clone(&ring);
        let error_sink = sink.clone();

        std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || {
                let stream = device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        // Audio callback: just write to ring buffer. No allocation, no blocking.
                        ring_capture.lock().write(data);
                    },
                    move |err| {
                        error!(error = %err, "audio capture error");
                        let mapped = match err {
                            cpal::StreamError::DeviceNotAvailable => {
                                SourceError::Unavailable("input device disconnected".into())
                            }
                            other => SourceError::Recognition(other.to_string()),
                        };
                        error_sink.error(mapped);
                    },
                    None,
                );
                let stream = match stream {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("failed to build input stream: {e}")));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(format!("failed to start audio stream: {e}")));
                    return;
                }
                let _ = ready_tx.send(Ok(()));
                // hold the stream until stopped; dropping it releases the device
                let _ = stop_rx.recv();
                drop(stream);
                info!("audio capture stream released");
            })
            .map_err(|e| SourceError::Unavailable(format!("failed to spawn capture thread: {e}")))?;

        let tick_token = CancellationToken::new();
        let child = tick_token.child_token();
        let mut analyser = Analyser::new(self.config.clone());
        let tick = self.config.tick();
        let fft_size = self.config.fft_size;
        let release = stop_tx.clone();

        tokio::spawn(async move {
            let opened = tokio::select! {
                _ = child.cancelled() => return,
                opened = await_device_open(ready_rx, OPEN_TIMEOUT) => opened,
            };
            if let Err(err) = opened {
                warn!(error = %err, "input device did not open");
                let _ = release.try_send(());
                sink.error(err);
                return;
            }
            info!("audio capture stream opened");

            let mut interval = tokio::time::interval(tick);
            let mut window = vec![0i16; fft_size];
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = interval.tick() => {
                        ring.lock().peek_last(&mut window);
                        let frame = analyser.analyse_pcm(&window, std::time::Instant::now());
                        if !sink.unit(UtteranceUnit::Frame(frame)) {
                            break;
                        }
                    }
                }
            }
        });

        self.running = Some(Running {
            stop_tx,
            tick_token,
        });
        info!(sample_rate = self.config.sample_rate, fft_size, "microphone_source_started");
        Ok(())
    }

    /// Never blocks: the capture thread drops the stream as soon as it sees
    /// the stop message, even if the device is still opening.
    fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.tick_token.cancel();
        let _ = running.stop_tx.try_send(());
        info!("microphone_source_stopped");
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.stop();
    }
}
