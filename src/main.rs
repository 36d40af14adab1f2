//! Headless demo: `bunnyhop <target> [transcript...]`
//!
//! Plays the "say <target>" prompt, then replays the transcripts 400 ms apart
//! through one session and logs the feedback. With the `microphone` feature and no transcripts, listens on the
//! default input device instead.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use bunnyhop::metrics::MetricsRegistry;
use bunnyhop::presenter::{ChannelPresenter, UiEvent};
use bunnyhop::source::{ScriptedSource, UtteranceSource};
use bunnyhop::{init_tracing, spawn_session, BunnyConfig, Collaborators, SessionState, TargetSound};

const TRANSCRIPT_SPACING: Duration = Duration::from_millis(400);
/// Stand-in for the prompt cue's playback time.
const PROMPT_PLAYBACK: Duration = Duration::from_millis(600);

#[tokio::main]
async fn main() {
    init_tracing(std::env::var("BUNNYHOP_LOG_JSON").is_ok());

    let mut args = std::env::args().skip(1);
    let Some(label) = args.next() else {
        eprintln!("usage: bunnyhop <target> [transcript...]");
        std::process::exit(2);
    };
    let transcripts: Vec<String> = args.collect();

    let config = BunnyConfig::from_env();
    let target = TargetSound::new(&label);
    let source = build_source(&config, transcripts);

    let (presenter, ui_rx) = ChannelPresenter::new();
    let presenter = Arc::new(presenter);
    let metrics = Arc::new(MetricsRegistry::new());
    let handle = spawn_session(
        target,
        &config,
        Collaborators {
            source,
            presenter: presenter.clone(),
            navigator: presenter,
        },
        Arc::clone(&metrics),
    );

    // UI thread stand-in
    let ui = std::thread::spawn(move || {
        for event in ui_rx.iter() {
            match &event {
                UiEvent::Feedback(signal) => info!(signal = ?signal, cue = ?signal.cue(), "ui_feedback"),
                UiEvent::Advance => {
                    info!("ui_advance");
                    return true;
                }
            }
        }
        false
    });

    let final_state = match handle.prompt().await {
        Ok(()) => {
            tokio::time::sleep(PROMPT_PLAYBACK).await;
            let mut state_rx = handle.subscribe();
            state_rx.borrow_and_update();
            if let Err(e) = handle.prompt_finished() {
                error!(error = %e, "session closed before listening");
            }
            // the attempt has started (or failed to) once the state moves
            let _ = state_rx.changed().await;
            handle.wait_settled().await
        }
        Err(e) => {
            error!(error = %e, "could not prompt");
            handle.state()
        }
    };
    if final_state == SessionState::Idle {
        error!("listening ended without a result");
    }

    if final_state == SessionState::Success {
        // let the reward sequence play out
        let session = &config.session;
        let reward = session.reward_step_interval() * u32::from(session.reward_steps)
            + session.advance_grace()
            + Duration::from_millis(100);
        tokio::time::sleep(reward).await;
    }
    handle.shutdown().await;

    let advanced = ui.join().unwrap_or(false);
    info!(state = %final_state, advanced, metrics = ?metrics.summary(), "demo finished");
}

fn build_source(config: &BunnyConfig, transcripts: Vec<String>) -> Box<dyn UtteranceSource> {
    #[cfg(feature = "microphone")]
    if transcripts.is_empty() {
        return Box::new(bunnyhop::source::MicrophoneSource::new(config.analyser.clone()));
    }
    #[cfg(not(feature = "microphone"))]
    let _ = config;
    Box::new(ScriptedSource::transcripts(transcripts, TRANSCRIPT_SPACING))
}
