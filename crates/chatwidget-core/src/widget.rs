//! The chat widget controller
//!
//! [`Widget`] owns every piece of session state and exposes one method per
//! transition. Front ends render from [`Widget::state`] and
//! [`Widget::messages`] and never mutate either directly.

use crate::endpoint::{ChatEndpoint, EndpointError};
use crate::message::{self, Message};
use crate::voice::{self, SpeechRecognizer, SpeechSynthesizer, UtteranceId, VoiceEvent};

pub const DEFAULT_ADMIN_KEY: &str = "admin123";
pub const INCORRECT_ADMIN_KEY_ALERT: &str = "Incorrect Admin Key!";

pub const PLACEHOLDER_IDLE: &str = "Type or hold mic to speak...";
pub const PLACEHOLDER_WAITING: &str = "You can type, but wait for bot's reply...";

/// Transient session flags. Nothing here outlives the widget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetState {
    pub open: bool,
    pub settings_visible: bool,
    pub console_visible: bool,
    pub access_granted: bool,
    pub in_flight: bool,
    pub recording: bool,
    /// Index into the message list of the bot message being read aloud
    pub speaking: Option<usize>,
    /// Blocking notice the user must acknowledge
    pub alert: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminOutcome {
    Granted,
    Rejected,
    /// The settings modal was not open
    Ignored,
}

pub struct Widget {
    state: WidgetState,
    messages: Vec<Message>,
    input: String,
    admin_key: String,
    recognizer: Box<dyn SpeechRecognizer>,
    synthesizer: Box<dyn SpeechSynthesizer>,
    utterance: Option<UtteranceId>,
    next_utterance: u64,
}

impl Default for Widget {
    fn default() -> Self {
        Self::new(DEFAULT_ADMIN_KEY)
    }
}

impl Widget {
    /// Closed widget seeded with the greeting, without speech support
    pub fn new(admin_key: impl Into<String>) -> Self {
        Self {
            state: WidgetState::default(),
            messages: message::greeting(),
            input: String::new(),
            admin_key: admin_key.into(),
            recognizer: Box::new(voice::Unsupported),
            synthesizer: Box::new(voice::Unsupported),
            utterance: None,
            next_utterance: 0,
        }
    }

    pub fn with_voice(
        mut self,
        recognizer: Box<dyn SpeechRecognizer>,
        synthesizer: Box<dyn SpeechSynthesizer>,
    ) -> Self {
        if !recognizer.is_supported() {
            tracing::warn!("speech recognition not supported, voice input disabled");
        }
        if !synthesizer.is_supported() {
            tracing::warn!("speech synthesis not supported, read-aloud disabled");
        }
        self.recognizer = recognizer;
        self.synthesizer = synthesizer;
        self
    }

    pub fn state(&self) -> &WidgetState {
        &self.state
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn placeholder(&self) -> &'static str {
        if self.state.in_flight {
            PLACEHOLDER_WAITING
        } else {
            PLACEHOLDER_IDLE
        }
    }

    pub fn can_send(&self) -> bool {
        !self.state.in_flight && !self.input.trim().is_empty()
    }

    pub fn voice_input_supported(&self) -> bool {
        self.recognizer.is_supported()
    }

    pub fn read_aloud_supported(&self) -> bool {
        self.synthesizer.is_supported()
    }

    // Panel and modal transitions

    pub fn toggle(&mut self) {
        self.state.open = !self.state.open;
        self.state.settings_visible = false;
        self.state.console_visible = false;
        tracing::debug!(open = self.state.open, "widget toggled");
    }

    pub fn open_settings(&mut self) {
        if self.state.open {
            self.state.settings_visible = true;
        }
    }

    pub fn close_settings(&mut self) {
        self.state.settings_visible = false;
    }

    pub fn submit_admin_key(&mut self, key: &str) -> AdminOutcome {
        if !self.state.settings_visible {
            return AdminOutcome::Ignored;
        }

        if key == self.admin_key {
            self.state.access_granted = true;
            self.state.settings_visible = false;
            self.state.console_visible = true;
            tracing::info!("developer console unlocked");
            AdminOutcome::Granted
        } else {
            self.state.alert = Some(INCORRECT_ADMIN_KEY_ALERT.to_string());
            tracing::warn!("rejected admin key");
            AdminOutcome::Rejected
        }
    }

    pub fn dismiss_alert(&mut self) {
        self.state.alert = None;
    }

    pub fn close_developer_console(&mut self) {
        self.state.access_granted = false;
        self.state.console_visible = false;
    }

    pub fn reset_history(&mut self) {
        // Indices are about to change, so the active utterance no longer has a message
        if self.state.speaking.is_some() {
            self.pause();
        }
        self.messages = message::greeting();
    }

    // Sending

    /// Takes the current input and starts a turn with it
    pub fn submit_input(&mut self) -> Option<String> {
        let text = self.input.clone();
        self.begin_send(&text)
    }

    /// Synchronous half of a send. Appends the user message, clears the input
    /// and marks the widget in flight. Returns the text to deliver, or `None`
    /// if the send is not allowed right now.
    pub fn begin_send(&mut self, text: &str) -> Option<String> {
        if text.trim().is_empty() || self.state.in_flight {
            return None;
        }

        self.messages.push(Message::user(text));
        self.input.clear();
        self.state.in_flight = true;
        Some(text.to_string())
    }

    /// Completes the turn started by [`begin_send`](Self::begin_send) with
    /// exactly one bot message.
    pub fn finish_send(&mut self, outcome: Result<String, EndpointError>) {
        if !self.state.in_flight {
            tracing::warn!("dropping reply with no request in flight");
            return;
        }

        let text = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                match &e {
                    EndpointError::Rejected { status, detail } => {
                        tracing::warn!(status, detail = %detail, "chat endpoint rejected request");
                    }
                    other => tracing::error!(error = %other, "chat request failed"),
                }
                e.bot_text()
            }
        };

        self.messages.push(Message::bot(text));
        self.state.in_flight = false;
    }

    /// Runs a whole turn inline. Returns `false` if the send was a no-op.
    pub async fn send<E>(&mut self, text: &str, endpoint: &E) -> bool
    where
        E: ChatEndpoint + ?Sized,
    {
        let Some(text) = self.begin_send(text) else {
            return false;
        };
        let outcome = endpoint.send(&text).await;
        self.finish_send(outcome);
        true
    }

    // Voice

    pub fn start_recording(&mut self) {
        if !self.recognizer.is_supported() {
            tracing::debug!("ignoring record request, speech recognition unavailable");
            return;
        }

        match self.recognizer.start() {
            Ok(()) => self.state.recording = true,
            Err(e) => tracing::warn!(error = %e, "could not start speech recognition"),
        }
    }

    pub fn stop_recording(&mut self) {
        if !self.recognizer.is_supported() {
            return;
        }
        self.state.recording = false;
        self.recognizer.stop();
    }

    /// Plays bot message `index`, replacing whatever was being read aloud
    pub fn speak(&mut self, index: usize) {
        let Some(text) = self
            .messages
            .get(index)
            .filter(|m| m.is_bot())
            .map(|m| m.text.clone())
        else {
            return;
        };

        self.synthesizer.cancel();
        self.state.speaking = None;
        self.utterance = None;

        let id = UtteranceId(self.next_utterance);
        self.next_utterance += 1;

        match self.synthesizer.speak(id, &text) {
            Ok(()) => {
                self.utterance = Some(id);
                self.state.speaking = Some(index);
            }
            Err(e) => tracing::warn!(error = %e, "could not read message aloud"),
        }
    }

    pub fn pause(&mut self) {
        self.synthesizer.cancel();
        self.utterance = None;
        self.state.speaking = None;
    }

    /// Play if `index` is silent, pause if it is the one speaking
    pub fn toggle_speech(&mut self, index: usize) {
        if self.state.speaking == Some(index) {
            self.pause();
        } else {
            self.speak(index);
        }
    }

    pub fn handle_voice_event(&mut self, event: VoiceEvent) {
        match event {
            VoiceEvent::Transcript(transcript) => {
                if self.input.is_empty() {
                    self.input = transcript;
                } else {
                    self.input.push(' ');
                    self.input.push_str(&transcript);
                }
            }
            VoiceEvent::RecognitionFailed(reason) => {
                tracing::warn!(reason = %reason, "speech recognition error");
                self.state.recording = false;
            }
            VoiceEvent::UtteranceEnded(id) => {
                // A cancelled utterance may still report in after its replacement started
                if self.utterance == Some(id) {
                    self.utterance = None;
                    self.state.speaking = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::CONNECTION_ERROR_TEXT;
    use crate::message::Sender;
    use crate::voice::VoiceError;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Endpoint that answers every turn with a canned outcome
    struct FakeEndpoint {
        reply: fn() -> Result<String, EndpointError>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeEndpoint {
        fn new(reply: fn() -> Result<String, EndpointError>) -> Self {
            Self {
                reply,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatEndpoint for FakeEndpoint {
        async fn send(&self, text: &str) -> Result<String, EndpointError> {
            self.calls.lock().unwrap().push(text.to_string());
            (self.reply)()
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Start,
        Stop,
        Speak(UtteranceId, String),
        Cancel,
    }

    #[derive(Clone, Default)]
    struct FakeVoice {
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl FakeVoice {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl SpeechRecognizer for FakeVoice {
        fn is_supported(&self) -> bool {
            true
        }

        fn start(&mut self) -> Result<(), VoiceError> {
            self.calls.lock().unwrap().push(Call::Start);
            Ok(())
        }

        fn stop(&mut self) {
            self.calls.lock().unwrap().push(Call::Stop);
        }
    }

    impl SpeechSynthesizer for FakeVoice {
        fn is_supported(&self) -> bool {
            true
        }

        fn speak(&mut self, id: UtteranceId, text: &str) -> Result<(), VoiceError> {
            self.calls.lock().unwrap().push(Call::Speak(id, text.to_string()));
            Ok(())
        }

        fn cancel(&mut self) {
            self.calls.lock().unwrap().push(Call::Cancel);
        }
    }

    fn voiced_widget() -> (Widget, FakeVoice) {
        let voice = FakeVoice::default();
        let widget = Widget::default().with_voice(Box::new(voice.clone()), Box::new(voice.clone()));
        (widget, voice)
    }

    fn texts(widget: &Widget) -> Vec<(Sender, String)> {
        widget
            .messages()
            .iter()
            .map(|m| (m.sender, m.text.clone()))
            .collect()
    }

    #[test]
    fn test_new_widget_is_closed_with_greeting() {
        let widget = Widget::default();
        assert_eq!(widget.state(), &WidgetState::default());
        assert_eq!(widget.messages().len(), 2);
        assert_eq!(widget.placeholder(), PLACEHOLDER_IDLE);
    }

    #[tokio::test]
    async fn test_successful_turn() {
        let endpoint = FakeEndpoint::new(|| Ok("Hi there!".to_string()));
        let mut widget = Widget::default();

        assert!(widget.send("Hello", &endpoint).await);

        assert_eq!(
            texts(&widget),
            vec![
                (Sender::Bot, "Hello! 👋".to_string()),
                (Sender::Bot, "How can I help you today?".to_string()),
                (Sender::User, "Hello".to_string()),
                (Sender::Bot, "Hi there!".to_string()),
            ]
        );
        assert!(!widget.state().in_flight);
        assert_eq!(*endpoint.calls.lock().unwrap(), vec!["Hello".to_string()]);
    }

    #[tokio::test]
    async fn test_rejected_turn_shows_detail() {
        let endpoint = FakeEndpoint::new(|| {
            Err(EndpointError::Rejected {
                status: 500,
                detail: "server error".to_string(),
            })
        });
        let mut widget = Widget::default();

        widget.send("Hello", &endpoint).await;

        assert_eq!(widget.messages().last().unwrap().text, "Error: server error");
        assert!(!widget.state().in_flight);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_shows_fallback() {
        let endpoint = FakeEndpoint::new(|| Err(EndpointError::Aborted("offline".to_string())));
        let mut widget = Widget::default();

        widget.send("Hello", &endpoint).await;

        let last = widget.messages().last().unwrap();
        assert_eq!(last.text, CONNECTION_ERROR_TEXT);
        assert_eq!(last.sender, Sender::Bot);
        assert_eq!(widget.messages().len(), 4);
    }

    #[tokio::test]
    async fn test_blank_send_is_noop() {
        let endpoint = FakeEndpoint::new(|| Ok("unused".to_string()));
        let mut widget = Widget::default();

        assert!(!widget.send("", &endpoint).await);
        assert!(!widget.send("   ", &endpoint).await);

        assert_eq!(widget.messages().len(), 2);
        assert!(!widget.state().in_flight);
        assert!(endpoint.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_user_message_visible_before_reply() {
        let mut widget = Widget::default();
        widget.set_input("Hello");

        let text = widget.submit_input();

        assert_eq!(text.as_deref(), Some("Hello"));
        assert_eq!(widget.input(), "");
        assert!(widget.state().in_flight);
        assert_eq!(widget.placeholder(), PLACEHOLDER_WAITING);
        let last = widget.messages().last().unwrap();
        assert_eq!((last.sender, last.text.as_str()), (Sender::User, "Hello"));
    }

    #[test]
    fn test_send_while_in_flight_is_noop() {
        let mut widget = Widget::default();
        widget.begin_send("first").unwrap();

        widget.set_input("second");
        assert!(!widget.can_send());
        assert!(widget.submit_input().is_none());
        assert_eq!(widget.input(), "second");
        assert_eq!(widget.messages().len(), 3);

        widget.finish_send(Ok("reply".to_string()));
        assert!(widget.can_send());
        assert!(widget.submit_input().is_some());
        assert_eq!(widget.messages().len(), 5);
    }

    #[test]
    fn test_text_is_sent_untrimmed() {
        let mut widget = Widget::default();
        assert_eq!(widget.begin_send("  hi  ").as_deref(), Some("  hi  "));
    }

    #[test]
    fn test_stray_reply_is_ignored() {
        let mut widget = Widget::default();
        widget.finish_send(Ok("late".to_string()));
        assert_eq!(widget.messages().len(), 2);
    }

    #[test]
    fn test_reset_history_restores_greeting() {
        let mut widget = Widget::default();
        widget.begin_send("one").unwrap();
        widget.finish_send(Ok("two".to_string()));

        widget.reset_history();

        assert_eq!(
            texts(&widget),
            vec![
                (Sender::Bot, "Hello! 👋".to_string()),
                (Sender::Bot, "How can I help you today?".to_string()),
            ]
        );
    }

    #[test]
    fn test_reset_during_flight_keeps_single_reply() {
        let mut widget = Widget::default();
        widget.begin_send("question").unwrap();

        widget.reset_history();
        assert!(widget.state().in_flight);

        widget.finish_send(Ok("answer".to_string()));
        assert_eq!(widget.messages().len(), 3);
        assert_eq!(widget.messages()[2].text, "answer");
    }

    #[test]
    fn test_toggle_clears_overlays() {
        let mut widget = Widget::default();
        widget.toggle();
        assert!(widget.state().open);

        widget.open_settings();
        assert!(widget.state().settings_visible);

        widget.toggle();
        assert!(!widget.state().open);
        assert!(!widget.state().settings_visible);

        widget.toggle();
        widget.open_settings();
        widget.submit_admin_key(DEFAULT_ADMIN_KEY);
        assert!(widget.state().console_visible);

        widget.toggle();
        assert!(!widget.state().console_visible);
        widget.toggle();
        assert!(!widget.state().console_visible);
    }

    #[test]
    fn test_settings_require_open_panel() {
        let mut widget = Widget::default();
        widget.open_settings();
        assert!(!widget.state().settings_visible);
        assert_eq!(widget.submit_admin_key(DEFAULT_ADMIN_KEY), AdminOutcome::Ignored);
    }

    #[test]
    fn test_correct_admin_key_opens_console() {
        let mut widget = Widget::default();
        widget.toggle();
        widget.open_settings();

        assert_eq!(widget.submit_admin_key("admin123"), AdminOutcome::Granted);

        let state = widget.state();
        assert!(state.access_granted);
        assert!(state.console_visible);
        assert!(!state.settings_visible);
        assert!(state.alert.is_none());
    }

    #[test]
    fn test_wrong_admin_key_raises_alert() {
        let mut widget = Widget::default();
        widget.toggle();
        widget.open_settings();

        assert_eq!(widget.submit_admin_key("Admin123"), AdminOutcome::Rejected);

        let state = widget.state();
        assert!(!state.access_granted);
        assert!(!state.console_visible);
        assert!(state.settings_visible);
        assert_eq!(state.alert.as_deref(), Some(INCORRECT_ADMIN_KEY_ALERT));

        widget.dismiss_alert();
        assert!(widget.state().alert.is_none());
        assert!(widget.state().settings_visible);
    }

    #[test]
    fn test_configured_admin_key() {
        let mut widget = Widget::new("s3cret");
        widget.toggle();
        widget.open_settings();
        assert_eq!(widget.submit_admin_key("admin123"), AdminOutcome::Rejected);
        widget.dismiss_alert();
        assert_eq!(widget.submit_admin_key("s3cret"), AdminOutcome::Granted);
    }

    #[test]
    fn test_close_developer_console() {
        let mut widget = Widget::default();
        widget.toggle();
        widget.open_settings();
        widget.submit_admin_key(DEFAULT_ADMIN_KEY);

        widget.close_developer_console();

        assert!(!widget.state().access_granted);
        assert!(!widget.state().console_visible);
        assert!(widget.state().open);
    }

    #[test]
    fn test_recording_appends_transcript() {
        let (mut widget, voice) = voiced_widget();
        widget.set_input("hello");

        widget.start_recording();
        assert!(widget.state().recording);
        widget.stop_recording();
        assert!(!widget.state().recording);
        widget.handle_voice_event(VoiceEvent::Transcript("world".to_string()));

        assert_eq!(widget.input(), "hello world");
        assert_eq!(voice.calls(), vec![Call::Start, Call::Stop]);
        assert_eq!(widget.messages().len(), 2, "transcripts are never sent automatically");
    }

    #[test]
    fn test_failed_recognition_ends_recording() {
        let (mut widget, _voice) = voiced_widget();
        widget.start_recording();
        widget.handle_voice_event(VoiceEvent::RecognitionFailed("mic unplugged".to_string()));
        assert!(!widget.state().recording);
        assert_eq!(widget.input(), "");
    }

    #[test]
    fn test_transcript_into_empty_input() {
        let (mut widget, _voice) = voiced_widget();
        widget.handle_voice_event(VoiceEvent::Transcript("hi".to_string()));
        assert_eq!(widget.input(), "hi");
    }

    #[test]
    fn test_unsupported_recognizer_degrades_silently() {
        let mut widget = Widget::default();
        widget.start_recording();
        assert!(!widget.state().recording);
        widget.stop_recording();
        assert!(!widget.voice_input_supported());
        assert_eq!(widget.messages().len(), 2);
    }

    #[test]
    fn test_unsupported_synthesizer_leaves_index_clear() {
        let mut widget = Widget::default();
        widget.speak(0);
        assert_eq!(widget.state().speaking, None);
    }

    #[test]
    fn test_speaking_switches_between_messages() {
        let (mut widget, voice) = voiced_widget();

        widget.speak(0);
        assert_eq!(widget.state().speaking, Some(0));

        widget.speak(1);
        assert_eq!(widget.state().speaking, Some(1));

        assert_eq!(
            voice.calls(),
            vec![
                Call::Cancel,
                Call::Speak(UtteranceId(0), "Hello! 👋".to_string()),
                Call::Cancel,
                Call::Speak(UtteranceId(1), "How can I help you today?".to_string()),
            ]
        );

        // The first utterance reporting late must not clear the second
        widget.handle_voice_event(VoiceEvent::UtteranceEnded(UtteranceId(0)));
        assert_eq!(widget.state().speaking, Some(1));

        widget.handle_voice_event(VoiceEvent::UtteranceEnded(UtteranceId(1)));
        assert_eq!(widget.state().speaking, None);
    }

    #[test]
    fn test_pause_clears_speaking() {
        let (mut widget, voice) = voiced_widget();
        widget.toggle_speech(1);
        assert_eq!(widget.state().speaking, Some(1));

        widget.toggle_speech(1);
        assert_eq!(widget.state().speaking, None);
        assert_eq!(voice.calls().last(), Some(&Call::Cancel));
    }

    #[test]
    fn test_user_messages_are_not_spoken() {
        let (mut widget, voice) = voiced_widget();
        widget.begin_send("me").unwrap();
        widget.speak(2);
        assert_eq!(widget.state().speaking, None);
        assert!(voice.calls().is_empty());
    }

    #[test]
    fn test_reset_stops_reading_aloud() {
        let (mut widget, _voice) = voiced_widget();
        widget.speak(1);
        widget.reset_history();
        assert_eq!(widget.state().speaking, None);
    }
}
