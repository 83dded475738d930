use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use multichat_core::{AttachmentKind, Suggestion};
use crate::app::{App, InputMode, Popup};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Paste(text) => app.handle_paste(&text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick();
            app.poll_tasks().await;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.popup.is_some() {
        handle_popup(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        // Half-page scrolling, checked before the plain letter bindings
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(app.chat_height.max(2) / 2)
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(app.chat_height.max(2) / 2)
        }

        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Back to typing
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,

        // Attachments
        KeyCode::Char('a') => app.open_attach(None),
        KeyCode::Char('I') => app.open_attach(Some(AttachmentKind::Image)),
        KeyCode::Char('f') => app.open_attach(Some(AttachmentKind::Csv)),
        KeyCode::Char('u') => app.open_csv_url(),
        KeyCode::Char('x') => app.chat.clear_attachment(),

        // Conversation
        KeyCode::Char('C') => app.popup = Some(Popup::ConfirmClear),
        KeyCode::Char('e') => app.export(),
        KeyCode::Char('t') => {
            app.chat.toggle_theme();
        }

        // Welcome suggestions
        KeyCode::Char(c @ '1'..='3') if app.chat.welcome_visible() => {
            let idx = (c as usize) - ('1' as usize);
            app.apply_suggestion(Suggestion::all()[idx]);
        }

        // Scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(2) / 2),
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(2) / 2),
        KeyCode::Char('G') | KeyCode::End => app.scroll_to_bottom(),
        KeyCode::Char('g') | KeyCode::Home => app.scroll_up(u16::MAX),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        // Alt+Enter inserts a newline; plain Enter sends
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => app.insert_char('\n'),
        KeyCode::Enter => app.submit_input(),
        KeyCode::Backspace => app.delete_before_cursor(),
        KeyCode::Delete => app.delete_at_cursor(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::Char(c)
            if !key
                .modifiers
                .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            app.insert_char(c)
        }
        _ => {}
    }
}

fn handle_popup(app: &mut App, key: KeyEvent) {
    let Some(popup) = app.popup.as_mut() else {
        return;
    };

    if let Popup::ConfirmClear = popup {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.popup = None;
                app.start_clear();
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.popup = None,
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => app.popup = None,
        KeyCode::Enter => {
            let Some(popup) = app.popup.take() else {
                return;
            };
            let keep_open = match &popup {
                Popup::AttachFile { kind, input } => !app.submit_attach(input, *kind),
                Popup::CsvUrl { input } => !app.submit_csv_url(input),
                Popup::ConfirmClear => false,
            };
            if keep_open {
                app.popup = Some(popup);
            }
        }
        KeyCode::Backspace => {
            if let Some(input) = popup.input_mut() {
                input.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some(input) = popup.input_mut() {
                input.push(c);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multichat_core::{ApiReply, BackendClient, ChatController, LocalStore};
    use tempfile::TempDir;

    fn app(dir: &TempDir) -> App {
        let store = LocalStore::open(dir.path()).unwrap();
        App::new(
            ChatController::open(store).unwrap(),
            BackendClient::new("http://127.0.0.1:9"),
        )
    }

    fn press(app: &mut App, code: KeyCode) {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn escape_leaves_editing_and_q_quits() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        press(&mut app, KeyCode::Char('q'));
        assert!(!app.should_quit, "q is typed while editing");
        assert_eq!(app.input, "q");

        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn suggestion_keys_only_work_on_welcome() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('2'));
        assert!(matches!(
            app.popup,
            Some(Popup::AttachFile { kind: Some(AttachmentKind::Image), .. })
        ));

        // Once the conversation has started the digits do nothing
        app.popup = None;
        let request = app.chat.begin_send("hello").unwrap();
        app.chat.complete_send(&request, Ok(ApiReply::ok("hi")));
        assert!(!app.chat.welcome_visible());
        press(&mut app, KeyCode::Char('2'));
        assert!(app.popup.is_none());
    }

    #[test]
    fn modified_letters_are_not_typed() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        handle_key(&mut app, KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        handle_key(&mut app, KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT));
        assert!(app.input.is_empty());

        handle_key(&mut app, KeyEvent::new(KeyCode::Char('U'), KeyModifiers::SHIFT));
        assert_eq!(app.input, "U");
    }

    #[test]
    fn invalid_url_keeps_popup_open() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('u'));
        for c in "bad url".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Enter);
        assert_eq!(
            app.popup,
            Some(Popup::CsvUrl {
                input: "bad url".to_string()
            })
        );
        assert!(app.send_task.is_none());
    }

    #[test]
    fn confirm_clear_can_be_cancelled() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('C'));
        assert_eq!(app.popup, Some(Popup::ConfirmClear));
        press(&mut app, KeyCode::Char('n'));
        assert!(app.popup.is_none());
        assert!(app.clear_task.is_none());
    }

    #[test]
    fn t_key_toggles_theme() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        let before = app.chat.theme();
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('t'));
        assert_ne!(app.chat.theme(), before);
    }
}
