use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use chatwidget_core::{Message, PayloadEncoding, Sender};
use crate::app::{App, InputMode};

const PANEL_MAX_WIDTH: u16 = 64;
const PANEL_MAX_HEIGHT: u16 = 28;
const BUTTON_WIDTH: u16 = 6;
const BUTTON_HEIGHT: u16 = 3;

/// Terminal columns taken by `text` (wide glyphs such as emoji count double)
fn display_width(text: &str) -> usize {
    Span::raw(text).width()
}

/// Wrap text to fit within a given width, returning multiple lines
/// Uses word boundaries for wrapping; words wider than a whole line are split
fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = display_width(word);

        if word_len > width {
            // Long URLs and the like: finish the current line, then cut the word at the edge
            if current_len > 0 {
                lines.push(std::mem::take(&mut current_line));
                current_len = 0;
            }
            for ch in word.chars() {
                let ch_len = display_width(&ch.to_string());
                if current_len > 0 && current_len + ch_len > width {
                    lines.push(std::mem::take(&mut current_line));
                    current_len = 0;
                }
                current_line.push(ch);
                current_len += ch_len;
            }
        } else if current_len == 0 {
            // First word on line
            current_line = word.to_string();
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            // Word fits on current line
            current_line.push(' ');
            current_line.push_str(word);
            current_len += 1 + word_len;
        } else {
            // Word doesn't fit, start new line
            lines.push(std::mem::take(&mut current_line));
            current_line = word.to_string();
            current_len = word_len;
        }
    }

    // Don't forget the last line
    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// Centered rectangle of at most `width` x `height` inside `area`
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: page, footer
    let [page_area, footer_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_page(frame, page_area);

    // Floating button, bottom-right corner of the page
    let button_area = Rect::new(
        page_area.right().saturating_sub(BUTTON_WIDTH + 1),
        page_area.bottom().saturating_sub(BUTTON_HEIGHT),
        BUTTON_WIDTH.min(page_area.width),
        BUTTON_HEIGHT.min(page_area.height),
    );
    app.button_area = Some(button_area);
    render_button(app, frame, button_area);

    app.panel_area = None;
    if app.widget.state().open {
        let space_above = button_area.y.saturating_sub(page_area.y);
        let width = PANEL_MAX_WIDTH.min(page_area.width.saturating_sub(2));
        let height = PANEL_MAX_HEIGHT.min(space_above);
        if width >= 20 && height >= 8 {
            let panel_area = Rect::new(
                page_area.right().saturating_sub(width + 1),
                button_area.y - height,
                width,
                height,
            );
            app.panel_area = Some(panel_area);
            render_panel(app, frame, panel_area);
        }
    }

    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if let Some(alert) = app.widget.state().alert.clone() {
        render_alert(frame, area, &alert);
    } else if app.widget.state().settings_visible {
        render_admin_key_input(app, frame, area);
    }
}

/// The host page the widget floats over
fn render_page(frame: &mut Frame, area: Rect) {
    let title = Paragraph::new(Line::from(Span::styled(
        "Welcome to My Website",
        Style::default().fg(Color::Cyan).bold(),
    )))
    .alignment(Alignment::Center);

    let title_area = Rect::new(area.x, area.y + area.height / 3, area.width, area.height.min(1));
    frame.render_widget(title, title_area);
}

fn render_button(app: &App, frame: &mut Frame, area: Rect) {
    let color = if app.widget.state().open { Color::Cyan } else { Color::Blue };
    let button = Paragraph::new("💬")
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        );
    frame.render_widget(Clear, area);
    frame.render_widget(button, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let state = app.widget.state();

    let (mode_text, mode_style) = if !state.open {
        (" CLOSED ", Style::default().bg(Color::DarkGray).fg(Color::White))
    } else if state.console_visible {
        (" CONSOLE ", Style::default().bg(Color::Magenta).fg(Color::White))
    } else {
        match app.input_mode {
            InputMode::Normal => (" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
            InputMode::Editing => (" TYPE ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        }
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints: Vec<(&str, &str)> = if state.alert.is_some() {
        vec![("Enter", "dismiss")]
    } else if !state.open {
        vec![("Enter", "open chat"), ("q", "quit")]
    } else if state.settings_visible {
        vec![("Enter", "submit"), ("Esc", "close")]
    } else if state.console_visible {
        vec![("Esc", "close console"), ("x", "close chat"), ("q", "quit")]
    } else {
        match app.input_mode {
            InputMode::Editing => {
                let mut hints = vec![("Enter", "send"), ("Esc", "done typing")];
                if app.widget.voice_input_supported() {
                    hints.push(("^R", "mic"));
                }
                hints
            }
            InputMode::Normal => {
                let mut hints = vec![("i", "type"), ("r", "reset"), ("s", "settings"), ("x", "close")];
                if app.widget.read_aloud_supported() {
                    hints.push(("j/k", "select"));
                    hints.push(("p", "play/pause"));
                }
                if app.widget.voice_input_supported() {
                    hints.push(("m", "mic"));
                }
                hints.push(("q", "quit"));
                hints
            }
        }
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    for (key, label) in hints {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
        spans.push(Span::raw(" "));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_panel(app: &mut App, frame: &mut Frame, area: Rect) {
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" AI Chat Assistant ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if app.widget.state().console_visible {
        render_developer_console(app, frame, inner);
        return;
    }

    let [body_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(inner);

    render_messages(app, frame, body_area);
    render_input(app, frame, input_area);
}

/// Lines for one message: label row, wrapped text, blank separator
fn message_lines(app: &App, index: usize, message: &Message, width: usize) -> Vec<Line<'static>> {
    let selected = app.selected_message == Some(index) && app.input_mode == InputMode::Normal;
    let (label, label_color, alignment) = match message.sender {
        Sender::User => ("You", Color::Cyan, Alignment::Right),
        Sender::Bot => ("Bot", Color::Yellow, Alignment::Left),
    };

    let mut header = vec![
        Span::styled(label, Style::default().fg(label_color).add_modifier(Modifier::BOLD)),
        Span::styled(format!("  {}", message.display_time()), Style::default().fg(Color::DarkGray)),
    ];
    if message.is_bot() && app.widget.read_aloud_supported() {
        let speaking = app.widget.state().speaking == Some(index);
        let (icon, color) = if speaking { ("  ⏸", Color::Green) } else { ("  🔊", Color::DarkGray) };
        header.push(Span::styled(icon, Style::default().fg(color)));
    }

    let text_style = if selected {
        Style::default().bg(Color::DarkGray)
    } else {
        Style::default()
    };

    let mut lines = vec![Line::from(header).alignment(alignment)];
    for paragraph in message.text.lines() {
        for wrapped in wrap_text_to_width(paragraph, width) {
            lines.push(Line::from(Span::styled(wrapped, text_style)).alignment(alignment));
        }
    }
    lines.push(Line::default());
    lines
}

fn render_messages(app: &mut App, frame: &mut Frame, area: Rect) {
    let width = area.width.saturating_sub(1) as usize;

    let mut lines: Vec<Line> = Vec::new();
    let mut selected_span: Option<(u16, u16)> = None;

    for (index, message) in app.widget.messages().iter().enumerate() {
        let start = lines.len() as u16;
        lines.extend(message_lines(app, index, message, width));
        if app.selected_message == Some(index) {
            selected_span = Some((start, lines.len() as u16));
        }
    }

    if app.widget.state().in_flight {
        lines.push(Line::from(Span::styled(
            "Bot",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Typing{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    app.chat_height = area.height;
    let total = lines.len() as u16;
    let max_scroll = total.saturating_sub(area.height);

    if app.selection_moved {
        app.selection_moved = false;
        if let Some((start, end)) = selected_span {
            // Keep the selected message in view
            if start < app.chat_scroll {
                app.chat_scroll = start;
            } else if end > app.chat_scroll + area.height {
                app.chat_scroll = end.saturating_sub(area.height);
            }
            app.follow_latest = false;
        }
    }

    if app.follow_latest || app.chat_scroll >= max_scroll {
        app.chat_scroll = max_scroll;
        app.follow_latest = true;
    }

    let body = Paragraph::new(Text::from(lines)).scroll((app.chat_scroll, 0));
    frame.render_widget(body, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let state = app.widget.state();
    let editing = app.input_mode == InputMode::Editing;

    let border_color = if state.recording {
        Color::Red
    } else if editing {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let mut title = vec![Span::raw(" Message ")];
    if state.recording {
        title.push(Span::styled("● REC ", Style::default().fg(Color::Red).bold()));
    }
    let send_style = if app.widget.can_send() {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(Line::from(title));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [text_area, send_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(6),
    ])
    .areas(inner);

    let input = app.widget.input();
    let text = if input.is_empty() {
        Paragraph::new(Span::styled(
            app.widget.placeholder(),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))
    } else {
        // Keep the cursor visible on long input
        let width = text_area.width.max(1) as usize;
        let skip = app.input_cursor.saturating_sub(width.saturating_sub(1));
        let visible: String = input.chars().skip(skip).collect();
        Paragraph::new(visible)
    };
    frame.render_widget(text, text_area);
    frame.render_widget(Paragraph::new(Span::styled("Send", send_style)).alignment(Alignment::Right), send_area);

    if editing && state.alert.is_none() && !state.settings_visible {
        let width = text_area.width.max(1) as usize;
        let cursor = app.input_cursor.min(width.saturating_sub(1)) as u16;
        frame.set_cursor_position((text_area.x + cursor, text_area.y));
    }
}

fn render_developer_console(app: &App, frame: &mut Frame, area: Rect) {
    let label = Style::default().fg(Color::DarkGray);
    let config = &app.endpoint_config;
    let encoding = match &config.encoding {
        PayloadEncoding::Json { project_name } => format!("json (project: {})", project_name),
        PayloadEncoding::Form => "form".to_string(),
    };
    let yes_no = |b: bool| if b { "available" } else { "unavailable" };

    let mut lines = vec![
        Line::from(Span::styled("Developer Console", Style::default().fg(Color::Magenta).bold())),
        Line::default(),
        Line::from(vec![Span::styled("Endpoint:  ", label), Span::raw(config.url.clone())]),
        Line::from(vec![Span::styled("Encoding:  ", label), Span::raw(encoding)]),
        Line::from(vec![
            Span::styled("Fields:    ", label),
            Span::raw(format!("reply \"{}\", error \"{}\"", config.response_field, config.error_field)),
        ]),
        Line::from(vec![
            Span::styled("Voice in:  ", label),
            Span::raw(yes_no(app.widget.voice_input_supported())),
        ]),
        Line::from(vec![
            Span::styled("Voice out: ", label),
            Span::raw(yes_no(app.widget.read_aloud_supported())),
        ]),
        Line::from(vec![
            Span::styled("Messages:  ", label),
            Span::raw(app.widget.messages().len().to_string()),
        ]),
    ];
    if let Some(path) = &app.log_path {
        lines.push(Line::from(vec![
            Span::styled("Log file:  ", label),
            Span::raw(path.display().to_string()),
        ]));
    }

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

fn render_admin_key_input(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, 44.min(area.width.saturating_sub(4)), 7);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Enter Admin Key ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Enter to submit, Esc to close.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    // The key is never echoed
    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let masked = "*".repeat(app.admin_key_input.chars().count());
    let input = if masked.is_empty() {
        Paragraph::new(Span::styled("Enter admin key", Style::default().fg(Color::DarkGray)))
    } else {
        Paragraph::new(masked).style(Style::default().fg(Color::Cyan))
    };
    frame.render_widget(input, input_area);

    let cursor_x = app.admin_key_cursor.min(input_area.width as usize) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
}

fn render_alert(frame: &mut Frame, area: Rect, alert: &str) {
    let popup_area = centered(area, 40.min(area.width.saturating_sub(4)), 5);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Alert ");

    let text = Text::from(vec![
        Line::from(Span::styled(alert.to_string(), Style::default().bold())),
        Line::from(Span::styled("Press Enter to continue", Style::default().fg(Color::DarkGray))),
    ]);
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(block);
    frame.render_widget(paragraph, popup_area);
}
