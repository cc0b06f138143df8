//! Turn orchestration: input -> safety check -> model -> transcript -> speech
//!
//! The orchestrator is owned by a single thread (the UI thread). Anything
//! slow runs on a detached worker thread and reports back as a
//! [`TurnEvent`] over a channel; only the owning thread applies events, so
//! the transcript and session history are never written from a worker.

use crate::integration::config::{AmicaConfig, MessageTexts};
use crate::llm::client::{ModelClient, ModelError};
use crate::llm::gemini::GeminiClient;
use crate::llm::session::{ConversationSession, PendingExchange, SessionError};
use crate::messages::{TranscriptStore, Utterance};
use crate::safety::{Classification, SafetyFilter};
use crate::speech::stt::{VoiceCaptureAdapter, VoiceCaptureError};
use crate::speech::tts::{SpeechDispatcher, SpeechSynthesizer, TranslateTtsSynthesizer};
use crate::utils::TimingTracker;
use crate::{AmicaError, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type TurnId = Uuid;

/// Where the submitted text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOrigin {
    Typed,
    Voice,
}

/// Progress of one in-flight turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Validating,
    Classifying,
    AwaitingModel,
    AwaitingSpeech,
    Done,
    Failed,
}

/// Transient record of a submitted turn; dropped once it is Done or Failed
#[derive(Debug, Clone)]
pub struct TurnState {
    pub input_text: String,
    pub origin: TurnOrigin,
    pub phase: TurnPhase,
    started: Instant,
}

impl TurnState {
    fn new(input_text: &str, origin: TurnOrigin) -> Self {
        Self {
            input_text: input_text.to_string(),
            origin,
            phase: TurnPhase::Validating,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Immediate result of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input, nothing happened
    Ignored,
    /// Crisis phrase detected; the helpline reply is already in the transcript
    Intercepted(TurnId),
    /// The model call is running; its reply arrives as a [`TurnEvent`]
    Dispatched(TurnId),
    /// Another reply is still pending; a please-wait line was shown
    Busy(TurnId),
    /// The model call could not be started; an error line was shown and no
    /// [`TurnEvent`] will follow
    Failed(TurnId),
}

impl SubmitOutcome {
    pub fn turn_id(&self) -> Option<TurnId> {
        match self {
            SubmitOutcome::Ignored => None,
            SubmitOutcome::Intercepted(id)
            | SubmitOutcome::Dispatched(id)
            | SubmitOutcome::Busy(id)
            | SubmitOutcome::Failed(id) => Some(*id),
        }
    }
}

/// Results produced by worker threads
#[derive(Debug)]
pub enum TurnEvent {
    /// A model call finished
    ModelReplied {
        turn_id: TurnId,
        exchange: PendingExchange,
        result: std::result::Result<String, ModelError>,
        elapsed: Duration,
    },

    /// A voice capture finished
    VoiceCaptured {
        result: std::result::Result<String, VoiceCaptureError>,
    },
}

/// What applying a [`TurnEvent`] changed
#[derive(Debug, Clone, PartialEq)]
pub enum TurnUpdate {
    /// The reply was appended; `spoken` tells whether speech was dispatched
    Replied { turn_id: TurnId, spoken: bool },

    /// The model call failed and an error line was appended
    ModelFailed { turn_id: TurnId, error: ModelError },

    /// Recognized speech was submitted as a turn
    VoiceSubmitted(SubmitOutcome),

    /// Voice capture failed and a diagnostic line was appended
    VoiceFailed(VoiceCaptureError),
}

/// Coordinates conversational turns for one conversation
pub struct TurnOrchestrator {
    session: Arc<ConversationSession>,
    safety: SafetyFilter,
    transcript: TranscriptStore,
    speech: SpeechDispatcher,
    voice: Option<Arc<dyn VoiceCaptureAdapter>>,
    voice_time_limit: Duration,
    texts: MessageTexts,
    event_tx: Sender<TurnEvent>,
    event_rx: Receiver<TurnEvent>,
    turns: HashMap<TurnId, TurnState>,
    model_latency: TimingTracker,
}

impl TurnOrchestrator {
    /// Create an orchestrator around an existing session.
    ///
    /// Speech and voice input start disabled; see
    /// [`with_speech`](Self::with_speech) and
    /// [`with_voice_capture`](Self::with_voice_capture).
    pub fn new(session: Arc<ConversationSession>, config: &AmicaConfig) -> Self {
        let (event_tx, event_rx) = unbounded();

        let mut transcript = TranscriptStore::new();
        if !config.messages.greeting.trim().is_empty() {
            transcript.append(Utterance::status(config.messages.greeting.clone()));
        }

        let safety = SafetyFilter::new(&config.safety);
        info!(phrases = safety.phrase_count(), "safety filter ready");

        Self {
            session,
            safety,
            transcript,
            speech: SpeechDispatcher::disabled(),
            voice: None,
            voice_time_limit: config.voice.phrase_time_limit(),
            texts: config.messages.clone(),
            event_tx,
            event_rx,
            turns: HashMap::new(),
            model_latency: TimingTracker::default(),
        }
    }

    /// Speak replies through `speech`
    pub fn with_speech(mut self, speech: SpeechDispatcher) -> Self {
        self.speech = speech;
        self
    }

    /// Enable voice input through `voice`
    pub fn with_voice_capture(mut self, voice: Arc<dyn VoiceCaptureAdapter>) -> Self {
        self.voice = Some(voice);
        self
    }

    /// Submit typed text as a new turn
    pub fn submit(&mut self, raw_text: &str) -> SubmitOutcome {
        self.submit_with_origin(raw_text, TurnOrigin::Typed)
    }

    /// Submit recognized speech as a new turn
    pub fn submit_from_voice(&mut self, text: &str) -> SubmitOutcome {
        self.submit_with_origin(text, TurnOrigin::Voice)
    }

    fn submit_with_origin(&mut self, raw_text: &str, origin: TurnOrigin) -> SubmitOutcome {
        let text = raw_text.trim();
        if text.is_empty() {
            debug!("ignoring blank submission");
            return SubmitOutcome::Ignored;
        }

        let turn_id = Uuid::new_v4();
        self.turns.insert(turn_id, TurnState::new(text, origin));

        let user = Utterance::user(text);
        self.transcript.append(user.clone());

        self.advance(turn_id, TurnPhase::Classifying);
        if self.safety.classify(text) == Classification::Flagged {
            info!(%turn_id, "crisis intercept, model not contacted");
            let helpline = Utterance::helpline(self.safety.helpline_message());
            self.transcript.append(helpline.clone());
            self.speak(turn_id, &helpline.text);
            self.finish(turn_id, TurnPhase::Done);
            return SubmitOutcome::Intercepted(turn_id);
        }

        let exchange = match self.session.begin_with(user) {
            Ok(exchange) => exchange,
            Err(e) => {
                if e != SessionError::Busy {
                    warn!(%turn_id, "could not start exchange: {}", e);
                }
                info!(%turn_id, "reply still pending, asking user to wait");
                self.transcript
                    .append(Utterance::status(self.texts.please_wait.clone()));
                self.finish(turn_id, TurnPhase::Failed);
                return SubmitOutcome::Busy(turn_id);
            }
        };

        self.advance(turn_id, TurnPhase::AwaitingModel);
        let client = self.session.client();
        let event_tx = self.event_tx.clone();

        let spawned = thread::Builder::new()
            .name("amica-turn".to_string())
            .spawn(move || {
                let started = Instant::now();
                let result = exchange.request(client.as_ref());
                let event = TurnEvent::ModelReplied {
                    turn_id,
                    exchange,
                    result,
                    elapsed: started.elapsed(),
                };
                if event_tx.send(event).is_err() {
                    warn!(%turn_id, "orchestrator gone, dropping reply");
                }
            });

        match spawned {
            Ok(_) => SubmitOutcome::Dispatched(turn_id),
            // The exchange went down with the closure, so the session is free again
            Err(e) => self.worker_unavailable(turn_id, e),
        }
    }

    fn worker_unavailable(&mut self, turn_id: TurnId, error: std::io::Error) -> SubmitOutcome {
        warn!(%turn_id, "failed to start turn worker: {}", error);
        self.transcript
            .append(Utterance::diagnostic(self.texts.model_error(&error)));
        self.finish(turn_id, TurnPhase::Failed);
        SubmitOutcome::Failed(turn_id)
    }

    /// Start a voice capture on a worker thread.
    ///
    /// The recognized text comes back as a [`TurnEvent::VoiceCaptured`] and is
    /// submitted when that event is applied.
    pub fn capture_voice(&mut self) -> Result<()> {
        let Some(voice) = self.voice.as_ref().map(Arc::clone) else {
            return Err(AmicaError::VoiceUnavailable(
                "no voice capture adapter configured".to_string(),
            ));
        };
        let event_tx = self.event_tx.clone();
        let time_limit = self.voice_time_limit;

        thread::Builder::new()
            .name("amica-voice".to_string())
            .spawn(move || {
                let result = voice.capture(time_limit);
                if event_tx.send(TurnEvent::VoiceCaptured { result }).is_err() {
                    warn!("orchestrator gone, dropping voice capture");
                }
            })
            .map_err(|e| AmicaError::VoiceUnavailable(format!("failed to start capture: {}", e)))?;

        debug!("voice capture started");
        self.transcript
            .append(Utterance::status(self.texts.listening.clone()));
        Ok(())
    }

    /// Apply one worker result. Must be called on the owning thread.
    pub fn apply(&mut self, event: TurnEvent) -> TurnUpdate {
        match event {
            TurnEvent::ModelReplied {
                turn_id,
                exchange,
                result,
                elapsed,
            } => {
                self.model_latency.record(elapsed);
                match result {
                    Ok(reply) => {
                        let utterance = self.session.complete(exchange, reply);
                        self.transcript.append(utterance.clone());
                        let spoken = self.speak(turn_id, &utterance.text);
                        self.finish(turn_id, TurnPhase::Done);
                        TurnUpdate::Replied { turn_id, spoken }
                    }
                    Err(error) => {
                        drop(exchange);
                        if error.is_transport() {
                            warn!(%turn_id, "model call failed: {}", error);
                        } else {
                            warn!(%turn_id, "model gave no usable reply: {}", error);
                        }
                        self.transcript
                            .append(Utterance::diagnostic(self.texts.model_error(&error)));
                        self.finish(turn_id, TurnPhase::Failed);
                        TurnUpdate::ModelFailed { turn_id, error }
                    }
                }
            }

            TurnEvent::VoiceCaptured { result } => match result {
                Ok(text) if !text.trim().is_empty() => {
                    debug!("voice capture recognized {} chars", text.len());
                    TurnUpdate::VoiceSubmitted(self.submit_from_voice(&text))
                }
                Ok(_) => self.voice_failed(VoiceCaptureError::NoSpeechDetected),
                Err(error) => self.voice_failed(error),
            },
        }
    }

    /// Apply every event that has already arrived, without blocking
    pub fn pump(&mut self) -> Vec<TurnUpdate> {
        let events: Vec<TurnEvent> = self.event_rx.try_iter().collect();
        events.into_iter().map(|event| self.apply(event)).collect()
    }

    /// Wait up to `timeout` for the next event and apply it
    pub fn wait_for_update(&mut self, timeout: Duration) -> Option<TurnUpdate> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Some(self.apply(event)),
            Err(RecvTimeoutError::Timeout) => None,
            // The orchestrator holds a sender, so this cannot happen while it lives
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Receiver for worker results, for use in a `select!` loop.
    /// Received events must be passed to [`apply`](Self::apply).
    pub fn events(&self) -> Receiver<TurnEvent> {
        self.event_rx.clone()
    }

    pub fn transcript(&self) -> &TranscriptStore {
        &self.transcript
    }

    pub fn session(&self) -> &Arc<ConversationSession> {
        &self.session
    }

    /// Whether a model reply is outstanding
    pub fn is_awaiting_reply(&self) -> bool {
        self.session.is_busy()
    }

    pub fn in_flight_turns(&self) -> usize {
        self.turns.len()
    }

    pub fn turn(&self, turn_id: &TurnId) -> Option<&TurnState> {
        self.turns.get(turn_id)
    }

    /// Round-trip times of recent model calls
    pub fn model_latency(&self) -> &TimingTracker {
        &self.model_latency
    }

    fn voice_failed(&mut self, error: VoiceCaptureError) -> TurnUpdate {
        let text = match &error {
            VoiceCaptureError::NoSpeechDetected => self.texts.no_speech.clone(),
            VoiceCaptureError::RecognitionError(message) => self.texts.voice_error(message),
        };
        warn!("voice capture failed: {}", error);
        self.transcript.append(Utterance::diagnostic(text));
        TurnUpdate::VoiceFailed(error)
    }

    fn speak(&mut self, turn_id: TurnId, text: &str) -> bool {
        self.advance(turn_id, TurnPhase::AwaitingSpeech);
        self.speech.dispatch(text)
    }

    fn advance(&mut self, turn_id: TurnId, phase: TurnPhase) {
        if let Some(state) = self.turns.get_mut(&turn_id) {
            debug!(%turn_id, from = ?state.phase, to = ?phase, "turn phase");
            state.phase = phase;
        }
    }

    fn finish(&mut self, turn_id: TurnId, phase: TurnPhase) {
        if let Some(state) = self.turns.remove(&turn_id) {
            debug!(
                %turn_id,
                ?phase,
                origin = ?state.origin,
                "turn finished after {}ms",
                state.elapsed().as_millis()
            );
        }
    }
}

/// Builder for creating an orchestrator
pub struct OrchestratorBuilder {
    config: AmicaConfig,
    client: Option<Arc<dyn ModelClient>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    voice: Option<Arc<dyn VoiceCaptureAdapter>>,
}

impl OrchestratorBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: AmicaConfig::default(),
            client: None,
            synthesizer: None,
            voice: None,
        }
    }

    /// Set the complete configuration
    pub fn with_config(mut self, config: AmicaConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `client` instead of the configured Gemini client
    pub fn with_model_client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Use `synthesizer` instead of the cloud TTS synthesizer
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Enable voice input
    pub fn with_voice_capture(mut self, voice: Arc<dyn VoiceCaptureAdapter>) -> Self {
        self.voice = Some(voice);
        self
    }

    /// Disable speech output
    pub fn without_speech(mut self) -> Self {
        self.config.speech.enabled = false;
        self
    }

    /// Build the orchestrator
    pub fn build(self) -> Result<TurnOrchestrator> {
        self.config.validate()?;

        let client: Arc<dyn ModelClient> = match self.client {
            Some(client) => client,
            None => Arc::new(GeminiClient::from_config(&self.config.model_config())?),
        };
        info!(model = client.model_id(), "model client ready");

        let speech = if !self.config.speech.enabled {
            SpeechDispatcher::disabled()
        } else {
            let synthesizer: Arc<dyn SpeechSynthesizer> = match self.synthesizer {
                Some(synthesizer) => synthesizer,
                None => Arc::new(TranslateTtsSynthesizer::new(&self.config.speech)?),
            };
            SpeechDispatcher::spawn(synthesizer)?
        };

        let session = Arc::new(ConversationSession::new(client));
        let mut orchestrator = TurnOrchestrator::new(session, &self.config).with_speech(speech);
        if let Some(voice) = self.voice {
            orchestrator = orchestrator.with_voice_capture(voice);
        }
        Ok(orchestrator)
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Speaker, UtteranceKind};

    struct EchoClient;

    impl ModelClient for EchoClient {
        fn send(&self, _history: &[Utterance], new_text: &str) -> std::result::Result<String, ModelError> {
            Ok(format!("echo: {}", new_text))
        }

        fn model_id(&self) -> &str {
            "echo"
        }
    }

    fn orchestrator() -> TurnOrchestrator {
        OrchestratorBuilder::new()
            .with_model_client(Arc::new(EchoClient))
            .without_speech()
            .build()
            .unwrap()
    }

    #[test]
    fn test_greeting_is_first_entry() {
        let orch = orchestrator();
        assert_eq!(orch.transcript().len(), 1);
        let greeting = orch.transcript().get(0).unwrap();
        assert_eq!(greeting.kind, UtteranceKind::Status);
        assert_eq!(greeting.text, "Hello! I'm Amica. How are you feeling today?");
    }

    #[test]
    fn test_blank_input_is_ignored() {
        let mut orch = orchestrator();
        assert_eq!(orch.submit("   \n\t"), SubmitOutcome::Ignored);
        assert_eq!(orch.transcript().len(), 1);
        assert!(orch.session().is_empty());
        assert_eq!(orch.in_flight_turns(), 0);
    }

    #[test]
    fn test_user_line_appended_before_reply() {
        let mut orch = orchestrator();
        let outcome = orch.submit("  hello  ");
        assert!(matches!(outcome, SubmitOutcome::Dispatched(_)));

        // Before the worker result is applied only the user line is present
        assert_eq!(orch.transcript().len(), 2);
        assert_eq!(orch.transcript().last().unwrap().text, "hello");
        assert_eq!(orch.in_flight_turns(), 1);
        let state = orch.turn(&outcome.turn_id().unwrap()).unwrap();
        assert_eq!(state.phase, TurnPhase::AwaitingModel);
        assert_eq!(state.origin, TurnOrigin::Typed);

        let update = orch.wait_for_update(Duration::from_secs(5)).unwrap();
        assert_eq!(
            update,
            TurnUpdate::Replied {
                turn_id: outcome.turn_id().unwrap(),
                spoken: false
            }
        );
        let last = orch.transcript().last().unwrap();
        assert_eq!(last.speaker, Speaker::Assistant);
        assert_eq!(last.text, "echo: hello");
        assert_eq!(orch.in_flight_turns(), 0);
        assert_eq!(orch.model_latency().count(), 1);
    }

    #[test]
    fn test_crisis_input_short_circuits() {
        let mut orch = orchestrator();
        let outcome = orch.submit("I want to end my life");
        assert!(matches!(outcome, SubmitOutcome::Intercepted(_)));

        let helpline = orch.transcript().last().unwrap();
        assert_eq!(helpline.kind, UtteranceKind::Helpline);
        assert_eq!(helpline.text, crate::safety::DEFAULT_HELPLINE_MESSAGE);
        assert!(orch.session().is_empty());
        assert!(!orch.is_awaiting_reply());
        assert_eq!(orch.in_flight_turns(), 0);
    }

    #[test]
    fn test_worker_spawn_failure_is_reported() {
        let mut orch = orchestrator();
        let turn_id = Uuid::new_v4();
        orch.turns
            .insert(turn_id, TurnState::new("hello", TurnOrigin::Typed));
        let before = orch.transcript().len();

        let outcome = orch.worker_unavailable(
            turn_id,
            std::io::Error::new(std::io::ErrorKind::WouldBlock, "no threads left"),
        );

        assert_eq!(outcome, SubmitOutcome::Failed(turn_id));
        assert_ne!(outcome, SubmitOutcome::Dispatched(turn_id));
        assert_eq!(orch.transcript().len(), before + 1);
        let line = orch.transcript().last().unwrap();
        assert_eq!(line.kind, UtteranceKind::Diagnostic);
        assert_eq!(line.text, "Sorry, I encountered an error: no threads left");
        assert!(orch.turn(&turn_id).is_none());
        assert!(orch.pump().is_empty());
    }

    #[test]
    fn test_capture_voice_without_adapter() {
        let mut orch = orchestrator();
        assert!(matches!(
            orch.capture_voice(),
            Err(AmicaError::VoiceUnavailable(_))
        ));
        assert_eq!(orch.transcript().len(), 1);
    }

    #[test]
    fn test_blank_recognition_counts_as_no_speech() {
        let mut orch = orchestrator();
        let update = orch.apply(TurnEvent::VoiceCaptured {
            result: Ok("  ".to_string()),
        });
        assert_eq!(update, TurnUpdate::VoiceFailed(VoiceCaptureError::NoSpeechDetected));
        assert_eq!(orch.transcript().last().unwrap().text, "Sorry, I didn't catch that.");
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = AmicaConfig::default();
        config.safety.phrases.clear();
        let result = OrchestratorBuilder::new()
            .with_config(config)
            .with_model_client(Arc::new(EchoClient))
            .build();
        assert!(matches!(result, Err(AmicaError::ConfigError(_))));
    }
}
