use std::io::{self, Stderr};
use anyhow::Result;
use crossterm::{
    event::{
        self, Event, KeyEvent, KeyEventKind, KeyboardEnhancementFlags, MouseEvent,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{self, disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

#[derive(Debug)]
#[allow(dead_code)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Tick,
}

fn translate(evt: Event) -> Option<AppEvent> {
    match evt {
        // Releases only arrive when the terminal supports enhanced
        // keyboard reporting; they drive hold-to-record
        Event::Key(key) if key.kind != KeyEventKind::Repeat => Some(AppEvent::Key(key)),
        Event::Mouse(mouse) => Some(AppEvent::Mouse(mouse)),
        Event::Resize(w, h) => Some(AppEvent::Resize(w, h)),
        _ => None,
    }
}

/// Pump terminal events into the app channel until the stream ends, fails,
/// or nobody is listening
async fn forward_events<S>(mut reader: S, tx: mpsc::UnboundedSender<AppEvent>)
where
    S: Stream<Item = io::Result<Event>> + Unpin,
{
    loop {
        let evt = match reader.next().await {
            Some(Ok(evt)) => evt,
            Some(Err(e)) => {
                tracing::error!(error = %e, "failed to read terminal event");
                break;
            }
            // Stream closed: stdin is gone
            None => break,
        };

        if let Some(event) = translate(evt) {
            if tx.send(event).is_err() {
                break;
            }
        }
    }
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    _tx: mpsc::UnboundedSender<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let _tx = tx.clone();

        // Spawn event reader task
        tokio::spawn(forward_events(event::EventStream::new(), tx.clone()));

        // Spawn tick timer for animations and reply polling (300ms interval)
        let tx_tick = tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(300));
            loop {
                interval.tick().await;
                if tx_tick.send(AppEvent::Tick).is_err() {
                    break;
                }
            }
        });

        Self { rx, _tx }
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

/// Enter the alternate screen. Returns the terminal and whether key releases
/// will be reported.
pub fn init() -> Result<(Tui, bool)> {
    enable_raw_mode()?;
    execute!(io::stderr(), EnterAlternateScreen)?;

    // Enable mouse capture
    execute!(io::stderr(), crossterm::event::EnableMouseCapture)?;

    let key_releases = terminal::supports_keyboard_enhancement().unwrap_or(false);
    if key_releases {
        execute!(
            io::stderr(),
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )?;
    }

    let backend = CrosstermBackend::new(io::stderr());
    let terminal = Terminal::new(backend)?;

    Ok((terminal, key_releases))
}

pub fn restore() -> Result<()> {
    // Harmless when nothing was pushed
    let _ = execute!(io::stderr(), PopKeyboardEnhancementFlags);
    execute!(io::stderr(), crossterm::event::DisableMouseCapture)?;
    execute!(io::stderr(), LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Install panic hook to restore terminal on panic
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEventState, KeyModifiers};
    use futures_util::stream;
    use std::time::Duration;

    fn key(code: KeyCode, kind: KeyEventKind) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind,
            state: KeyEventState::NONE,
        })
    }

    #[tokio::test]
    async fn test_forwarding_stops_when_stream_ends() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let events = vec![
            Ok(key(KeyCode::Char('a'), KeyEventKind::Press)),
            Ok(key(KeyCode::Char('a'), KeyEventKind::Repeat)),
            Ok(key(KeyCode::Char('a'), KeyEventKind::Release)),
            Ok(Event::FocusGained),
        ];

        tokio::time::timeout(Duration::from_secs(5), forward_events(stream::iter(events), tx))
            .await
            .unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                AppEvent::Key(key) => kinds.push(key.kind),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(kinds, vec![KeyEventKind::Press, KeyEventKind::Release]);
    }

    #[tokio::test]
    async fn test_forwarding_stops_on_read_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let events = vec![
            Err(io::Error::new(io::ErrorKind::Other, "tty gone")),
            Ok(key(KeyCode::Enter, KeyEventKind::Press)),
        ];

        tokio::time::timeout(Duration::from_secs(5), forward_events(stream::iter(events), tx))
            .await
            .unwrap();

        assert!(rx.try_recv().is_err());
    }
}
