use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    app.poll_send_task().await;
    Ok(())
}

/// Mic key: Ctrl-R while typing, `m` otherwise
fn is_record_key(app: &App, key: &KeyEvent) -> bool {
    match app.input_mode {
        InputMode::Editing => {
            key.code == KeyCode::Char('r') && key.modifiers.contains(KeyModifiers::CONTROL)
        }
        InputMode::Normal => key.code == KeyCode::Char('m'),
    }
}

/// Mic key release. Ctrl may already be up by the time the letter is released.
fn is_record_release(app: &App, key: &KeyEvent) -> bool {
    if !app.widget.state().recording {
        return false;
    }
    match app.input_mode {
        InputMode::Editing => key.code == KeyCode::Char('r'),
        InputMode::Normal => key.code == KeyCode::Char('m'),
    }
}

/// Printable input: no modifiers other than Shift
fn is_text_input(key: &KeyEvent) -> bool {
    key.modifiers.difference(KeyModifiers::SHIFT).is_empty()
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.kind == KeyEventKind::Release {
        if is_record_release(app, &key) {
            app.release_record();
        }
        return;
    }

    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    let state = app.widget.state().clone();

    // A pending alert blocks everything else until acknowledged
    if state.alert.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
            app.widget.dismiss_alert();
        }
        return;
    }

    if !state.open {
        handle_closed(app, key);
    } else if state.settings_visible {
        handle_settings(app, key);
    } else if state.console_visible {
        handle_console(app, key);
    } else {
        match app.input_mode {
            InputMode::Normal => handle_conversation_normal(app, key),
            InputMode::Editing => handle_conversation_editing(app, key),
        }
    }
}

fn handle_closed(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('c') => app.toggle_widget(),
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        _ => {}
    }
}

fn handle_settings(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.widget.close_settings();
        }
        KeyCode::Enter => {
            app.submit_admin_key();
        }
        KeyCode::Backspace => {
            if app.admin_key_cursor > 0 {
                app.admin_key_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.admin_key_input, app.admin_key_cursor);
                app.admin_key_input.remove(byte_pos);
            }
        }
        KeyCode::Char(c) if is_text_input(&key) => {
            let byte_pos = char_to_byte_index(&app.admin_key_input, app.admin_key_cursor);
            app.admin_key_input.insert(byte_pos, c);
            app.admin_key_cursor += 1;
        }
        KeyCode::Left => {
            app.admin_key_cursor = app.admin_key_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.admin_key_input.chars().count();
            app.admin_key_cursor = (app.admin_key_cursor + 1).min(char_count);
        }
        _ => {}
    }
}

fn handle_console(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('c') => app.widget.close_developer_console(),
        KeyCode::Char('x') => app.toggle_widget(),
        KeyCode::Char('q') => app.should_quit = true,
        _ => {}
    }
}

fn handle_conversation_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Panel actions
        KeyCode::Char('x') | KeyCode::Esc => app.toggle_widget(),
        KeyCode::Char('r') => app.reset_history(),
        KeyCode::Char('s') => app.open_settings(),
        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
            app.input_cursor = app.widget.input().chars().count();
        }

        // Message selection and read-aloud
        KeyCode::Char('j') | KeyCode::Down => app.select_next_message(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev_message(),
        KeyCode::Char('p') | KeyCode::Char(' ') => app.toggle_selected_speech(),
        KeyCode::Char('m') => app.press_record(),

        // Scrolling
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(2) / 2),
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(2) / 2),
        KeyCode::Char('G') | KeyCode::End => app.scroll_to_bottom(),

        _ => {}
    }
}

fn handle_conversation_editing(app: &mut App, key: KeyEvent) {
    if is_record_key(app, &key) {
        app.press_record();
        return;
    }

    let input = app.widget.input_mut();
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            // The widget refuses while a reply is pending; the text stays put
            app.submit_message();
        }
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(input, app.input_cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = input.chars().count();
            if app.input_cursor < char_count {
                let byte_pos = char_to_byte_index(input, app.input_cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = input.chars().count();
        }
        KeyCode::Char(c) if is_text_input(&key) => {
            let byte_pos = char_to_byte_index(input, app.input_cursor);
            input.insert(byte_pos, c);
            app.input_cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    let on_button = app.button_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_panel = app.panel_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if on_button && app.widget.state().alert.is_none() {
                app.toggle_widget();
            }
        }
        MouseEventKind::ScrollDown if in_panel => app.scroll_down(3),
        MouseEventKind::ScrollUp if in_panel => app.scroll_up(3),
        _ => {}
    }
}
