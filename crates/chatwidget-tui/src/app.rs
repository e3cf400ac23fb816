use std::path::PathBuf;
use std::sync::Arc;

use chatwidget_core::{ChatEndpoint, EndpointConfig, EndpointError, VoiceEvent, Widget};
use ratatui::layout::Rect;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub widget: Widget,

    // Endpoint
    pub endpoint: Arc<dyn ChatEndpoint>,
    pub endpoint_config: EndpointConfig,
    pub send_task: Option<JoinHandle<Result<String, EndpointError>>>,

    // Message input
    pub input_cursor: usize, // cursor position in the widget input, in chars

    // Admin key modal input
    pub admin_key_input: String,
    pub admin_key_cursor: usize,

    // Conversation view
    pub selected_message: Option<usize>,
    pub selection_moved: bool,
    pub chat_scroll: u16,
    pub follow_latest: bool,
    pub chat_height: u16, // Height of the message area for scroll calculations

    // Terminal reports key releases, so the mic key can be held
    pub hold_to_record: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Areas for mouse hit-testing (updated during render)
    pub button_area: Option<Rect>,
    pub panel_area: Option<Rect>,

    // Shown in the developer console
    pub log_path: Option<PathBuf>,
}

impl App {
    pub fn new(widget: Widget, endpoint: Arc<dyn ChatEndpoint>, endpoint_config: EndpointConfig) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            widget,

            endpoint,
            endpoint_config,
            send_task: None,

            input_cursor: 0,

            admin_key_input: String::new(),
            admin_key_cursor: 0,

            selected_message: None,
            selection_moved: false,
            chat_scroll: 0,
            follow_latest: true,
            chat_height: 0,

            hold_to_record: false,

            animation_frame: 0,

            button_area: None,
            panel_area: None,

            log_path: None,
        }
    }

    /// Open or close the panel. Opening drops straight into typing.
    pub fn toggle_widget(&mut self) {
        self.widget.toggle();
        if self.widget.state().open {
            self.input_mode = InputMode::Editing;
            self.follow_latest = true;
        } else {
            self.input_mode = InputMode::Normal;
        }
    }

    pub fn open_settings(&mut self) {
        self.widget.open_settings();
        self.admin_key_cursor = self.admin_key_input.chars().count();
    }

    pub fn submit_admin_key(&mut self) {
        let key = self.admin_key_input.clone();
        if self.widget.submit_admin_key(&key) == chatwidget_core::AdminOutcome::Granted {
            self.admin_key_input.clear();
            self.admin_key_cursor = 0;
        }
    }

    pub fn reset_history(&mut self) {
        self.widget.reset_history();
        self.selected_message = None;
        self.follow_latest = true;
    }

    /// Start a turn with the current input on a background task
    pub fn submit_message(&mut self) {
        let Some(text) = self.widget.submit_input() else {
            return;
        };
        self.input_cursor = 0;
        self.follow_latest = true;

        let endpoint = Arc::clone(&self.endpoint);
        self.send_task = Some(tokio::spawn(async move { endpoint.send(&text).await }));
    }

    /// Hand a finished request back to the widget
    pub async fn poll_send_task(&mut self) {
        let Some(task) = self.send_task.take_if(|task| task.is_finished()) else {
            return;
        };

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(EndpointError::Aborted(e.to_string())),
        };
        self.widget.finish_send(outcome);
        self.follow_latest = true;
    }

    pub fn press_record(&mut self) {
        // Repeats are filtered out before they get here, so a press while
        // recording in hold mode means the release went missing
        if self.widget.state().recording {
            self.widget.stop_recording();
        } else {
            self.widget.start_recording();
        }
    }

    pub fn release_record(&mut self) {
        if self.hold_to_record && self.widget.state().recording {
            self.widget.stop_recording();
        }
    }

    pub fn handle_voice_event(&mut self, event: VoiceEvent) {
        let transcript = matches!(event, VoiceEvent::Transcript(_));
        self.widget.handle_voice_event(event);
        if transcript {
            // Recognized text lands at the end of the input
            self.input_cursor = self.widget.input().chars().count();
        }
    }

    // Message selection (bot messages only, they are the ones that can be read aloud)
    pub fn select_next_message(&mut self) {
        let messages = self.widget.messages();
        let start = self.selected_message.map(|i| i + 1).unwrap_or(0);
        if let Some(i) = (start..messages.len()).find(|&i| messages[i].is_bot()) {
            self.selected_message = Some(i);
            self.selection_moved = true;
        }
    }

    pub fn select_prev_message(&mut self) {
        let messages = self.widget.messages();
        let end = self.selected_message.unwrap_or(messages.len()).min(messages.len());
        if let Some(i) = (0..end).rev().find(|&i| messages[i].is_bot()) {
            self.selected_message = Some(i);
            self.selection_moved = true;
        }
    }

    pub fn toggle_selected_speech(&mut self) {
        if self.selected_message.is_none() {
            self.select_prev_message();
        }
        if let Some(i) = self.selected_message {
            self.widget.toggle_speech(i);
        }
    }

    // Scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_latest = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        // Clamped (and follow re-enabled at the bottom) during render
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_latest = true;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.widget.state().in_flight {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatwidget_core::{voice, SpeechRecognizer, VoiceError};

    /// Replies with the text it was sent
    struct EchoEndpoint;

    #[async_trait]
    impl ChatEndpoint for EchoEndpoint {
        async fn send(&self, text: &str) -> Result<String, EndpointError> {
            Ok(format!("echo: {}", text))
        }
    }

    /// Recognizer that always starts, with nothing behind it
    struct SilentRecognizer;

    impl SpeechRecognizer for SilentRecognizer {
        fn is_supported(&self) -> bool {
            true
        }

        fn start(&mut self) -> Result<(), VoiceError> {
            Ok(())
        }

        fn stop(&mut self) {}
    }

    fn app() -> App {
        App::new(Widget::default(), Arc::new(EchoEndpoint), EndpointConfig::default())
    }

    fn voiced_app(hold_to_record: bool) -> App {
        let widget = Widget::default().with_voice(Box::new(SilentRecognizer), Box::new(voice::Unsupported));
        let mut app = App::new(widget, Arc::new(EchoEndpoint), EndpointConfig::default());
        app.hold_to_record = hold_to_record;
        app
    }

    #[test]
    fn test_press_toggles_without_key_releases() {
        let mut app = voiced_app(false);

        app.press_record();
        assert!(app.widget.state().recording);

        // Releases never arrive here, and a stray one changes nothing
        app.release_record();
        assert!(app.widget.state().recording);

        app.press_record();
        assert!(!app.widget.state().recording);
    }

    #[test]
    fn test_release_stops_hold_to_record() {
        let mut app = voiced_app(true);

        app.press_record();
        assert!(app.widget.state().recording);
        app.release_record();
        assert!(!app.widget.state().recording);
    }

    #[test]
    fn test_press_while_held_recording_stops_it() {
        let mut app = voiced_app(true);

        app.press_record();
        app.press_record();
        assert!(!app.widget.state().recording);
    }

    #[tokio::test]
    async fn test_submit_and_poll_round_trip() {
        let mut app = app();
        app.toggle_widget();
        app.widget.set_input("hi");
        app.input_cursor = 2;

        app.submit_message();
        assert!(app.widget.state().in_flight);
        assert_eq!(app.input_cursor, 0);

        while app.send_task.is_some() {
            tokio::task::yield_now().await;
            app.poll_send_task().await;
        }

        assert!(!app.widget.state().in_flight);
        assert_eq!(app.widget.messages().last().unwrap().text, "echo: hi");
    }

    #[test]
    fn test_toggle_enters_editing() {
        let mut app = app();
        app.toggle_widget();
        assert_eq!(app.input_mode, InputMode::Editing);
        app.toggle_widget();
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn test_selection_skips_user_messages() {
        let mut app = app();
        app.widget.begin_send("question").unwrap();
        app.widget.finish_send(Ok("answer".to_string()));

        app.select_prev_message();
        assert_eq!(app.selected_message, Some(3));
        app.select_prev_message();
        assert_eq!(app.selected_message, Some(1));
        app.select_next_message();
        assert_eq!(app.selected_message, Some(3));
        app.select_next_message();
        assert_eq!(app.selected_message, Some(3));
    }

    #[test]
    fn test_admin_key_cleared_only_on_success() {
        let mut app = app();
        app.toggle_widget();
        app.open_settings();

        app.admin_key_input = "nope".to_string();
        app.submit_admin_key();
        assert_eq!(app.admin_key_input, "nope");
        app.widget.dismiss_alert();

        app.admin_key_input = "admin123".to_string();
        app.submit_admin_key();
        assert!(app.admin_key_input.is_empty());
        assert!(app.widget.state().console_visible);
    }

    #[test]
    fn test_transcript_moves_cursor_to_end() {
        let mut app = app();
        app.widget.set_input("hello");
        app.input_cursor = 1;

        app.handle_voice_event(VoiceEvent::Transcript("world".to_string()));

        assert_eq!(app.widget.input(), "hello world");
        assert_eq!(app.input_cursor, 11);
    }
}
