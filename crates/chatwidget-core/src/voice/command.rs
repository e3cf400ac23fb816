use std::process::Stdio;

use tokio::process::{ChildStdin, Command};
use tokio::task::JoinHandle;

use super::{SpeechRecognizer, SpeechSynthesizer, UtteranceId, VoiceError, VoiceEvent, VoiceSender};

/// Text-to-speech programs tried in order when none is configured
const SYNTHESIZER_CANDIDATES: [&str; 3] = ["say", "espeak-ng", "espeak"];

/// Speaks by running an external program with the text as its last argument.
/// Cancelling kills the process.
pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
    events: VoiceSender,
    active: Option<JoinHandle<()>>,
}

impl CommandSynthesizer {
    pub fn new(command: &[String], events: VoiceSender) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            events,
            active: None,
        })
    }

    /// First known text-to-speech program found on `PATH`
    pub fn detect(events: VoiceSender) -> Option<Self> {
        let program = SYNTHESIZER_CANDIDATES
            .iter()
            .find(|name| which::which(name).is_ok())?;
        tracing::debug!(program, "detected speech synthesizer");
        Self::new(&[program.to_string()], events)
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn is_supported(&self) -> bool {
        true
    }

    fn speak(&mut self, id: UtteranceId, text: &str) -> Result<(), VoiceError> {
        self.cancel();

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| VoiceError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let events = self.events.clone();
        self.active = Some(tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    tracing::warn!(%status, "speech synthesizer exited with failure");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "failed waiting for speech synthesizer"),
            }
            let _ = events.send(VoiceEvent::UtteranceEnded(id));
        }));
        Ok(())
    }

    fn cancel(&mut self) {
        // Aborting drops the child, and kill_on_drop stops the audio
        if let Some(task) = self.active.take() {
            task.abort();
        }
    }
}

impl Drop for CommandSynthesizer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Runs an external recorder for each session. The program records while its
/// stdin is open and prints the transcript on stdout once stdin is closed.
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
    events: VoiceSender,
    stdin: Option<ChildStdin>,
    session: Option<JoinHandle<()>>,
}

impl CommandRecognizer {
    pub fn new(command: &[String], events: VoiceSender) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            events,
            stdin: None,
            session: None,
        })
    }
}

impl SpeechRecognizer for CommandRecognizer {
    fn is_supported(&self) -> bool {
        true
    }

    fn start(&mut self) -> Result<(), VoiceError> {
        // A new session replaces whatever was still running
        if let Some(session) = self.session.take() {
            session.abort();
        }
        self.stdin = None;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| VoiceError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        self.stdin = child.stdin.take();

        let events = self.events.clone();
        self.session = Some(tokio::spawn(async move {
            let event = match child.wait_with_output().await {
                Ok(output) if output.status.success() => {
                    let transcript = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if transcript.is_empty() {
                        VoiceEvent::RecognitionFailed("no speech recognized".to_string())
                    } else {
                        VoiceEvent::Transcript(transcript)
                    }
                }
                Ok(output) => VoiceEvent::RecognitionFailed(format!("recognizer exited with {}", output.status)),
                Err(e) => VoiceEvent::RecognitionFailed(e.to_string()),
            };
            let _ = events.send(event);
        }));
        Ok(())
    }

    fn stop(&mut self) {
        // Closing stdin tells the recorder to finish and print what it heard
        self.stdin = None;
    }
}

impl Drop for CommandRecognizer {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.abort();
        }
    }
}
