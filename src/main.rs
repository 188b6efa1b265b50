//! speech-session-daemon: background speech session controller
//!
//! Runs the recognition loop and the capture-device monitor on a worker
//! pool and forwards accepted utterances to a decision consumer running
//! on the main task.
//!
//! Recognition input is read from stdin, one utterance per line (a blank
//! line counts as "not understood"), so any engine that prints its
//! hypotheses can be piped in.

use std::io::{self, BufReader};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use speech_session::lifecycle::ShutdownSignal;
use speech_session::{
    AsoundProbe, Config, ConsumerContext, DecisionConsumer, Dispatcher, LineSource,
    SessionEvent, SpeechController,
};

/// Decision consumer that reports what it was asked to act on
struct EchoConsumer;

impl DecisionConsumer for EchoConsumer {
    fn on_utterance(&self, text: &str) {
        info!(%text, "making decision");
        println!("{text}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first; it carries the fallback log filter
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "speech-session-daemon starting"
    );
    info!(?config, "configuration loaded");

    // Recognition loop -> consumer context (runs on this task)
    let (consumer_handle, mut consumer_context) = ConsumerContext::new();
    let dispatcher = Dispatcher::new(Arc::new(consumer_handle), Arc::new(EchoConsumer));

    let source = Arc::new(LineSource::new(BufReader::new(io::stdin())));
    let controller = SpeechController::new(
        &config,
        source,
        Arc::new(AsoundProbe::new()),
        dispatcher,
    )
    .context("failed to create speech controller")?;

    let mut event_rx = controller.subscribe();

    // Before any task runs, so an early SIGTERM is not lost
    let mut shutdown =
        ShutdownSignal::register().context("failed to register signal handlers")?;

    controller.start_resource_monitor();
    controller.start();

    info!("daemon initialized, entering main loop");

    tokio::select! {
        // Execute decision jobs in order
        _ = consumer_context.run() => {
            info!("consumer context exited");
        }

        // Lift suppression once the engine has warmed up
        _ = async {
            tokio::time::sleep(config.warmup).await;
            controller.stop_suppressing();
            std::future::pending::<()>().await
        } => {}

        // Log session events; stop when the recognition loop ends
        _ = async {
            loop {
                match event_rx.recv().await {
                    Ok(event) => {
                        if config.emit_events {
                            match serde_json::to_string(&event) {
                                Ok(json) => println!("{json}"),
                                Err(e) => warn!(?e, "failed to encode session event"),
                            }
                        }
                        info!(%event, "session event");
                        if matches!(event, SessionEvent::RecognitionExited { .. }) {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "session event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("recognition ended");
        }

        // Wait for shutdown signal
        reason = shutdown.wait() => {
            info!(%reason, "shutdown signal received");
        }
    }

    // Cleanup; a pull blocked on stdin is left behind rather than joined.
    // Decisions dispatched before the select ended still run.
    info!("shutting down...");
    controller.shutdown_and_drain(&mut consumer_context);

    info!("speech-session-daemon stopped");

    Ok(())
}
