use std::path::PathBuf;

use multichat_core::export::{export_file_name, export_text};
use multichat_core::url::normalize_csv_url;
use multichat_core::{
    ApiReply, AttachmentKind, BackendClient, BackendError, ChatBackend, ChatController,
    OutboundRequest, StatusLevel, Suggestion,
};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popup {
    /// File path prompt. `kind` is set when opened from a kind-specific shortcut.
    AttachFile {
        kind: Option<AttachmentKind>,
        input: String,
    },
    CsvUrl { input: String },
    ConfirmClear,
}

impl Popup {
    pub fn input_mut(&mut self) -> Option<&mut String> {
        match self {
            Popup::AttachFile { input, .. } | Popup::CsvUrl { input } => Some(input),
            Popup::ConfirmClear => None,
        }
    }
}

/// A submitted request and the task running it.
pub struct InFlight {
    pub request: OutboundRequest,
    pub handle: JoinHandle<Result<ApiReply, BackendError>>,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub popup: Option<Popup>,

    // Message input
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars

    // Conversation
    pub chat: ChatController,
    pub client: BackendClient,
    pub send_task: Option<InFlight>,
    pub clear_task: Option<JoinHandle<Result<(), BackendError>>>,

    // Chat pane scrolling
    pub chat_scroll: u16,
    pub chat_height: u16,      // inner height of the chat pane
    pub chat_total_lines: u16, // wrapped line count from the last render
    pub follow_bottom: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    pub export_dir: PathBuf,
}

impl App {
    pub fn new(chat: ChatController, client: BackendClient) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            popup: None,
            input: String::new(),
            input_cursor: 0,
            chat,
            client,
            send_task: None,
            clear_task: None,
            chat_scroll: 0,
            chat_height: 0,
            chat_total_lines: 0,
            follow_bottom: true,
            animation_frame: 0,
            export_dir: PathBuf::from("."),
        }
    }

    /// Send the input box contents (plus any pending attachment).
    pub fn submit_input(&mut self) {
        let Ok(request) = self.chat.begin_send(&self.input) else {
            return;
        };
        self.input.clear();
        self.input_cursor = 0;
        self.spawn_request(request);
    }

    /// Submit the CSV URL dialog. The dialog stays open while the URL is invalid.
    pub fn submit_csv_url(&mut self, input: &str) -> bool {
        if normalize_csv_url(input).is_err() {
            return false;
        }
        match self.chat.begin_csv_url(input) {
            Ok(request) => {
                self.spawn_request(request);
                true
            }
            Err(_) => false,
        }
    }

    pub fn submit_attach(&mut self, path: &str, kind: Option<AttachmentKind>) -> bool {
        let path = path.trim().trim_matches(|c| c == '\'' || c == '"');
        if path.is_empty() {
            return false;
        }
        let result = match kind {
            Some(kind) => self.chat.attach_path_as(path, kind),
            None => self.chat.attach_path(path),
        };
        result.is_ok()
    }

    fn spawn_request(&mut self, request: OutboundRequest) {
        let client = self.client.clone();
        let task_request = request.clone();
        let handle = tokio::spawn(async move { client.submit(&task_request).await });
        self.send_task = Some(InFlight { request, handle });
        self.follow_bottom = true;
    }

    /// Clear locally right away, then tell the backend in the background.
    pub fn start_clear(&mut self) {
        self.chat.reset_local();
        self.chat_scroll = 0;
        self.follow_bottom = true;

        let client = self.client.clone();
        let session = self.chat.session().clone();
        self.clear_task = Some(tokio::spawn(async move {
            client.clear_session(&session).await
        }));
    }

    /// Apply results of finished background requests.
    pub async fn poll_tasks(&mut self) {
        if self
            .send_task
            .as_ref()
            .is_some_and(|task| task.handle.is_finished())
        {
            if let Some(task) = self.send_task.take() {
                let outcome = match task.handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(BackendError::TaskFailed(e.to_string())),
                };
                self.chat.complete_send(&task.request, outcome);
                self.follow_bottom = true;
            }
        }

        if self
            .clear_task
            .as_ref()
            .is_some_and(|handle| handle.is_finished())
        {
            if let Some(handle) = self.clear_task.take() {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(BackendError::TaskFailed(e.to_string())),
                };
                self.chat.finish_clear(outcome);
            }
        }
    }

    pub fn apply_suggestion(&mut self, suggestion: Suggestion) {
        match suggestion {
            Suggestion::Chat => {
                if let Some(prompt) = suggestion.prompt() {
                    self.input = prompt.to_string();
                    self.input_cursor = self.input.chars().count();
                }
                self.input_mode = InputMode::Editing;
            }
            Suggestion::Image => self.open_attach(Some(AttachmentKind::Image)),
            Suggestion::Csv => self.open_csv_url(),
        }
    }

    pub fn open_attach(&mut self, kind: Option<AttachmentKind>) {
        self.popup = Some(Popup::AttachFile {
            kind,
            input: String::new(),
        });
    }

    pub fn open_csv_url(&mut self) {
        self.popup = Some(Popup::CsvUrl {
            input: String::new(),
        });
    }

    /// A pasted file path attaches the file; anything else is typed into the input.
    pub fn handle_paste(&mut self, text: &str) {
        // An open dialog owns the paste, even one without a text field
        if let Some(popup) = self.popup.as_mut() {
            if let Some(input) = popup.input_mut() {
                input.push_str(text.trim_end_matches(['\n', '\r']));
            }
            return;
        }

        let candidate = text.trim().trim_matches(|c| c == '\'' || c == '"');
        if !candidate.contains('\n') && std::path::Path::new(candidate).is_file() {
            let _ = self.chat.attach_path(candidate);
            return;
        }

        for c in text.chars().filter(|c| *c != '\r') {
            self.insert_char(c);
        }
        self.input_mode = InputMode::Editing;
    }

    pub fn export(&mut self) {
        let file_name = export_file_name(chrono::Local::now().date_naive());
        let path = self.export_dir.join(file_name);
        match std::fs::write(&path, export_text(self.chat.records())) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "chat exported");
                self.chat
                    .status_mut()
                    .show(format!("Chat exported to {}", path.display()), StatusLevel::Success);
            }
            Err(e) => {
                tracing::error!("Failed to export chat: {}", e);
                self.chat
                    .status_mut()
                    .show("Failed to export chat", StatusLevel::Error);
            }
        }
    }

    /// Tick animation frame and expire the status banner (called by Tick event)
    pub fn tick(&mut self) {
        if self.chat.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.chat.status_mut().expire(std::time::Instant::now());
    }

    // Input editing

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
        self.input.insert(byte_pos, c);
        self.input_cursor += 1;
    }

    pub fn delete_before_cursor(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete_at_cursor(&mut self) {
        if self.input_cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.input_cursor = (self.input_cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.input.chars().count();
    }

    // Scrolling

    pub fn max_scroll(&self) -> u16 {
        self.chat_total_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_bottom = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = (self.chat_scroll + lines).min(self.max_scroll());
        if self.chat_scroll >= self.max_scroll() {
            self.follow_bottom = true;
        }
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_bottom = true;
        self.chat_scroll = self.max_scroll();
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
