pub mod config;
pub mod endpoint;
pub mod message;
pub mod voice;
pub mod widget;

// Re-export main types for convenience
pub use config::{Config, SpeechConfig};
pub use endpoint::{ChatEndpoint, EndpointConfig, EndpointError, HttpEndpoint, PayloadEncoding};
pub use message::{Message, Sender};
pub use voice::{SpeechRecognizer, SpeechSynthesizer, UtteranceId, VoiceError, VoiceEvent};
pub use widget::{AdminOutcome, Widget, WidgetState};
