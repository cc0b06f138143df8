use amica::integration::{AmicaConfig, OrchestratorBuilder, TurnOrchestrator};
use amica::messages::{TranscriptCursor, Utterance, UtteranceKind};
use amica::speech::VoiceCaptureAdapter;
use anyhow::{Context, Result};
use crossbeam_channel::{select, unbounded, Sender};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const QUIT_COMMAND: &str = "/quit";
const VOICE_COMMAND: &str = "/voice";

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "amica=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    info!("Starting Amica");

    let config = match std::env::args().nth(1) {
        Some(path) => AmicaConfig::load(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => AmicaConfig::default(),
    };

    let mut builder = OrchestratorBuilder::new();
    if let Some(voice) = voice_capture(&config) {
        builder = builder.with_voice_capture(voice);
    }
    let mut orchestrator = builder
        .with_config(config)
        .build()
        .context("starting the assistant")?;

    let (line_tx, line_rx) = unbounded();
    spawn_stdin_reader(line_tx)?;

    let events = orchestrator.events();
    let mut cursor = TranscriptCursor::default();
    print_new_entries(&orchestrator, &mut cursor, false);

    loop {
        // Typed user lines are already on screen; recognized speech is not
        let mut show_user_lines = false;
        select! {
            recv(line_rx) -> line => {
                let Ok(line) = line else {
                    info!("input closed");
                    break;
                };
                match line.trim() {
                    QUIT_COMMAND => break,
                    VOICE_COMMAND => {
                        if let Err(e) = orchestrator.capture_voice() {
                            warn!("voice capture unavailable: {}", e);
                            println!("{}", e.user_message());
                        }
                    }
                    text => {
                        orchestrator.submit(text);
                    }
                }
            }
            recv(events) -> event => {
                if let Ok(event) = event {
                    orchestrator.apply(event);
                    show_user_lines = true;
                }
            }
        }
        print_new_entries(&orchestrator, &mut cursor, show_user_lines);
    }

    info!("{}", orchestrator.model_latency().summary());
    Ok(())
}

fn spawn_stdin_reader(line_tx: Sender<String>) -> Result<()> {
    thread::Builder::new()
        .name("amica-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("spawning stdin reader")?;
    Ok(())
}

#[cfg(feature = "audio-io")]
fn voice_capture(config: &AmicaConfig) -> Option<Arc<dyn VoiceCaptureAdapter>> {
    match amica::speech::MicrophoneCapture::new(&config.voice) {
        Ok(capture) => Some(Arc::new(capture)),
        Err(e) => {
            warn!("voice input disabled: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "audio-io"))]
fn voice_capture(_config: &AmicaConfig) -> Option<Arc<dyn VoiceCaptureAdapter>> {
    info!("built without audio-io, voice input disabled");
    None
}

fn print_new_entries(
    orchestrator: &TurnOrchestrator,
    cursor: &mut TranscriptCursor,
    show_user_lines: bool,
) {
    let mut stdout = io::stdout().lock();
    for utterance in orchestrator.transcript().read_from(cursor) {
        if let Some(line) = render_entry(utterance, show_user_lines) {
            let _ = writeln!(stdout, "{}", line);
        }
    }
    let _ = stdout.flush();
}

/// Terminal line for one transcript entry; `None` for user lines the
/// terminal already echoed
fn render_entry(utterance: &Utterance, show_user_lines: bool) -> Option<String> {
    if utterance.is_user() {
        return show_user_lines.then(|| format!("You: {}", utterance.text));
    }
    Some(match utterance.kind {
        UtteranceKind::Message => format!("Amica: {}", utterance.text),
        UtteranceKind::Helpline => format!("Amica (helpline): {}", utterance.text),
        UtteranceKind::Status | UtteranceKind::Diagnostic => format!("  {}", utterance.text),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_user_lines_are_not_repeated() {
        assert_eq!(render_entry(&Utterance::user("hello"), false), None);
        assert_eq!(
            render_entry(&Utterance::assistant("hi"), false).as_deref(),
            Some("Amica: hi")
        );
    }

    #[test]
    fn test_recognized_speech_is_shown() {
        assert_eq!(
            render_entry(&Utterance::user("I can't sleep"), true).as_deref(),
            Some("You: I can't sleep")
        );
    }

    #[test]
    fn test_display_only_lines_are_indented() {
        assert_eq!(
            render_entry(&Utterance::status("🎤 Listening..."), true).as_deref(),
            Some("  🎤 Listening...")
        );
        assert_eq!(
            render_entry(&Utterance::helpline("Call 988."), false).as_deref(),
            Some("Amica (helpline): Call 988.")
        );
    }
}
