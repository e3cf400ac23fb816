//! Speech capabilities used by the widget
//!
//! The controller only ever talks to these traits. Recognition and synthesis
//! are fire-and-forget calls; results come back as [`VoiceEvent`]s over a
//! channel that the owner of the widget drains and feeds to
//! [`Widget::handle_voice_event`](crate::Widget::handle_voice_event).

mod command;

pub use command::{CommandRecognizer, CommandSynthesizer};

use tokio::sync::mpsc;

pub type VoiceSender = mpsc::UnboundedSender<VoiceEvent>;
pub type VoiceReceiver = mpsc::UnboundedReceiver<VoiceEvent>;

/// Identifies one utterance so a late completion of a cancelled utterance
/// can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    /// A recognition session produced text.
    Transcript(String),
    /// A recognition session ended without a transcript.
    RecognitionFailed(String),
    /// An utterance finished playing on its own.
    UtteranceEnded(UtteranceId),
}

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("{0} is not supported on this system")]
    Unsupported(&'static str),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// One-shot speech-to-text session: `start` on press, `stop` on release.
pub trait SpeechRecognizer: Send {
    fn is_supported(&self) -> bool;
    fn start(&mut self) -> Result<(), VoiceError>;
    fn stop(&mut self);
}

/// Single speech channel: at most one utterance is audible at a time.
pub trait SpeechSynthesizer: Send {
    fn is_supported(&self) -> bool;
    fn speak(&mut self, id: UtteranceId, text: &str) -> Result<(), VoiceError>;
    fn cancel(&mut self);
}

/// Stand-in used when no speech backend is available
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsupported;

impl SpeechRecognizer for Unsupported {
    fn is_supported(&self) -> bool {
        false
    }

    fn start(&mut self) -> Result<(), VoiceError> {
        Err(VoiceError::Unsupported("speech recognition"))
    }

    fn stop(&mut self) {}
}

impl SpeechSynthesizer for Unsupported {
    fn is_supported(&self) -> bool {
        false
    }

    fn speak(&mut self, _id: UtteranceId, _text: &str) -> Result<(), VoiceError> {
        Err(VoiceError::Unsupported("speech synthesis"))
    }

    fn cancel(&mut self) {}
}

pub fn channel() -> (VoiceSender, VoiceReceiver) {
    mpsc::unbounded_channel()
}
