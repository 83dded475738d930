//! The chat view controller.
//!
//! Owns the session identity, the pending attachment, the busy flag and the
//! message records. Each send is split into `begin_*` (validate, append the
//! user turn, mark busy) and `complete_send` (append the bot turn, persist) so
//! a front-end can run the network call on its own task in between.

use std::path::Path;

use crate::attachment::{Attachment, AttachmentKind};
use crate::client::{ApiReply, ChatBackend};
use crate::error::{BackendError, StoreError, ValidationError};
use crate::history::{self, MessageRecord};
use crate::outbound::{assemble_csv_url, assemble_outbound, OutboundRequest};
use crate::session::SessionId;
use crate::status::{StatusLevel, StatusLine};
use crate::store::LocalStore;
use crate::theme::Theme;
use crate::url::normalize_csv_url;

/// Mutable UI state that used to live in ambient globals.
#[derive(Debug, Default)]
pub struct ChatState {
    /// A send is outstanding; further sends are ignored until it resolves.
    pub busy: bool,
    pub pending: Option<Attachment>,
}

pub struct ChatController {
    session: SessionId,
    store: LocalStore,
    state: ChatState,
    records: Vec<MessageRecord>,
    status: StatusLine,
    theme: Theme,
}

impl ChatController {
    /// Load identity, theme and history from `store`.
    pub fn open(store: LocalStore) -> Result<Self, StoreError> {
        let session = SessionId::load_or_create(&store)?;
        let theme = Theme::load(&store);
        let records = match history::load_history(&store, &session) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(user_id = %session, "Discarding unreadable chat history: {}", e);
                Vec::new()
            }
        };
        tracing::info!(user_id = %session, messages = records.len(), "chat controller ready");

        Ok(Self {
            session,
            store,
            state: ChatState::default(),
            records,
            status: StatusLine::default(),
            theme,
        })
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn records(&self) -> &[MessageRecord] {
        &self.records
    }

    pub fn is_busy(&self) -> bool {
        self.state.busy
    }

    pub fn pending(&self) -> Option<&Attachment> {
        self.state.pending.as_ref()
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut StatusLine {
        &mut self.status
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// The welcome block is shown exactly when there is nothing else to show.
    pub fn welcome_visible(&self) -> bool {
        self.records.is_empty()
    }

    // ---- attachments ----

    pub fn attach(&mut self, attachment: Attachment) {
        self.status
            .show(attachment.kind.ready_message(), StatusLevel::Success);
        tracing::debug!(file = %attachment.name, kind = attachment.kind.as_str(), "attachment queued");
        self.state.pending = Some(attachment);
    }

    /// Attach a file, detecting its kind. Validation failures only touch the status line.
    pub fn attach_path(&mut self, path: impl AsRef<Path>) -> Result<(), ValidationError> {
        self.attach_checked(Attachment::from_path(path))
    }

    /// Attach from a kind-specific picker.
    pub fn attach_path_as(
        &mut self,
        path: impl AsRef<Path>,
        kind: AttachmentKind,
    ) -> Result<(), ValidationError> {
        self.attach_checked(Attachment::from_path_as(path, kind))
    }

    fn attach_checked(
        &mut self,
        attachment: Result<Attachment, ValidationError>,
    ) -> Result<(), ValidationError> {
        match attachment {
            Ok(attachment) => {
                self.attach(attachment);
                Ok(())
            }
            Err(e) => {
                self.status.show(e.to_string(), StatusLevel::Error);
                Err(e)
            }
        }
    }

    pub fn clear_attachment(&mut self) {
        self.state.pending = None;
    }

    // ---- sending ----

    /// Validate the input and, if acceptable, append the user turn and mark
    /// the controller busy. Returns the request to submit.
    pub fn begin_send(&mut self, text: &str) -> Result<OutboundRequest, ValidationError> {
        if self.state.busy {
            return Err(ValidationError::Busy);
        }
        let request = match assemble_outbound(text, self.state.pending.as_ref(), &self.session) {
            Ok(request) => request,
            Err(e) => {
                self.status.show(e.to_string(), StatusLevel::Warning);
                return Err(e);
            }
        };
        self.start(&request);
        Ok(request)
    }

    /// Same as [`begin_send`](Self::begin_send) for a remote CSV URL.
    pub fn begin_csv_url(&mut self, input: &str) -> Result<OutboundRequest, ValidationError> {
        if self.state.busy {
            return Err(ValidationError::Busy);
        }
        let url = match normalize_csv_url(input) {
            Ok(url) => url,
            Err(e) => {
                let level = match e {
                    ValidationError::EmptyUrl => StatusLevel::Warning,
                    _ => StatusLevel::Error,
                };
                self.status.show(e.to_string(), level);
                return Err(e);
            }
        };
        let request = assemble_csv_url(&url, &self.session);
        self.start(&request);
        Ok(request)
    }

    fn start(&mut self, request: &OutboundRequest) {
        self.state.busy = true;
        self.push(request.user_turn());
    }

    /// Apply the outcome of a submitted request. The outcome is applied even
    /// if the conversation moved on while the request was in flight.
    pub fn complete_send(
        &mut self,
        request: &OutboundRequest,
        outcome: Result<ApiReply, BackendError>,
    ) {
        self.state.busy = false;
        let is_url = matches!(request, OutboundRequest::CsvUrl { .. });

        match outcome {
            Ok(reply) => {
                if reply.success {
                    self.push(MessageRecord::bot(reply.response.unwrap_or_default()));
                    if is_url {
                        self.status
                            .show("CSV loaded successfully from URL", StatusLevel::Success);
                    }
                } else {
                    let error = reply.error.unwrap_or_else(|| "Unknown error".to_string());
                    self.push(MessageRecord::bot(format!("Error: {}", error)));
                    if is_url {
                        self.status.show("Failed to load CSV", StatusLevel::Error);
                    }
                }
                if matches!(request, OutboundRequest::Upload { .. }) {
                    self.clear_attachment();
                }
            }
            Err(e) => {
                tracing::error!(endpoint = request.endpoint().path(), "Request failed: {}", e);
                self.push(MessageRecord::bot(request.failure_message(&e)));
                if is_url {
                    self.status.show("Error loading CSV", StatusLevel::Error);
                }
            }
        }
    }

    /// Full send cycle against `backend`. Returns false when nothing was sent.
    pub async fn send(&mut self, backend: &dyn ChatBackend, text: &str) -> bool {
        let Ok(request) = self.begin_send(text) else {
            return false;
        };
        let outcome = backend.submit(&request).await;
        self.complete_send(&request, outcome);
        true
    }

    /// Full URL-load cycle against `backend`. Returns false when nothing was sent.
    pub async fn load_csv_url(&mut self, backend: &dyn ChatBackend, input: &str) -> bool {
        let Ok(request) = self.begin_csv_url(input) else {
            return false;
        };
        let outcome = backend.submit(&request).await;
        self.complete_send(&request, outcome);
        true
    }

    // ---- clearing ----

    /// Local half of clearing: empty the conversation, drop the attachment and
    /// the stored history. Always succeeds from the user's point of view.
    pub fn reset_local(&mut self) {
        self.records.clear();
        self.clear_attachment();
        if let Err(e) = history::delete_history(&self.store, &self.session) {
            tracing::warn!(user_id = %self.session, "Failed to delete stored history: {}", e);
        }
    }

    /// Report the outcome of the backend half of clearing.
    pub fn finish_clear(&mut self, outcome: Result<(), BackendError>) {
        match outcome {
            Ok(()) => self.status.show("Chat cleared successfully", StatusLevel::Success),
            Err(e) => {
                tracing::error!(user_id = %self.session, "Error clearing chat: {}", e);
                self.status.show("Error clearing chat", StatusLevel::Error);
            }
        }
    }

    pub async fn clear(&mut self, backend: &dyn ChatBackend) {
        self.reset_local();
        let outcome = backend.clear_session(&self.session).await;
        self.finish_clear(outcome);
    }

    // ---- theme ----

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        if let Err(e) = self.theme.save(&self.store) {
            tracing::warn!("Failed to save theme: {}", e);
        }
        self.theme
    }

    fn push(&mut self, record: MessageRecord) {
        self.records.push(record);
        if let Err(e) = history::save_history(&self.store, &self.session, &self.records) {
            tracing::warn!(user_id = %self.session, "Failed to save chat history: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Role;
    use crate::markup::to_html;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory backend that replays canned outcomes and records what it was sent.
    struct FakeBackend {
        replies: Mutex<Vec<Result<ApiReply, BackendError>>>,
        submitted: Mutex<Vec<OutboundRequest>>,
        clear_fails: bool,
        clears: Mutex<usize>,
    }

    impl FakeBackend {
        fn replying(replies: Vec<Result<ApiReply, BackendError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                submitted: Mutex::new(Vec::new()),
                clear_fails: false,
                clears: Mutex::new(0),
            }
        }

        fn failing_clear() -> Self {
            Self {
                clear_fails: true,
                ..Self::replying(Vec::new())
            }
        }

        fn calls(&self) -> usize {
            self.submitted.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatBackend for FakeBackend {
        async fn submit(&self, request: &OutboundRequest) -> Result<ApiReply, BackendError> {
            self.submitted.lock().unwrap().push(request.clone());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Ok(ApiReply::ok("default reply"))
            } else {
                replies.remove(0)
            }
        }

        async fn clear_session(&self, _user_id: &SessionId) -> Result<(), BackendError> {
            *self.clears.lock().unwrap() += 1;
            if self.clear_fails {
                Err(BackendError::Http {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: None,
                })
            } else {
                Ok(())
            }
        }
    }

    fn controller(dir: &TempDir) -> ChatController {
        ChatController::open(LocalStore::open(dir.path()).unwrap()).unwrap()
    }

    fn http_error() -> BackendError {
        BackendError::Http {
            status: StatusCode::BAD_GATEWAY,
            message: None,
        }
    }

    #[tokio::test]
    async fn text_send_appends_user_then_bot_turn() {
        let dir = TempDir::new().unwrap();
        let mut chat = controller(&dir);
        let backend = FakeBackend::replying(vec![Ok(ApiReply::ok("**Hi** there"))]);

        assert!(chat.send(&backend, "hello").await);

        let records = chat.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].role, Role::User);
        assert_eq!(records[0].content, "hello");
        assert_eq!(records[1].role, Role::Bot);
        assert_eq!(records[1].content, "**Hi** there");
        assert!(!chat.is_busy());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn empty_send_contacts_nobody() {
        let dir = TempDir::new().unwrap();
        let mut chat = controller(&dir);
        let backend = FakeBackend::replying(Vec::new());

        assert!(!chat.send(&backend, "   ").await);

        assert_eq!(backend.calls(), 0);
        assert!(chat.records().is_empty());
        let status = chat.status().last().unwrap();
        assert_eq!(status.level, StatusLevel::Warning);
        assert_eq!(status.message, "Please enter a message or select a file");
    }

    #[tokio::test]
    async fn backend_failure_is_rendered_inline() {
        let dir = TempDir::new().unwrap();
        let mut chat = controller(&dir);
        let backend = FakeBackend::replying(vec![Ok(ApiReply::failed("rate limited"))]);

        chat.send(&backend, "hello").await;

        assert_eq!(chat.records()[1].content, "Error: rate limited");
    }

    #[tokio::test]
    async fn network_failure_appends_apology() {
        let dir = TempDir::new().unwrap();
        let mut chat = controller(&dir);
        let backend = FakeBackend::replying(vec![Err(http_error())]);

        chat.send(&backend, "hello").await;

        assert_eq!(
            chat.records()[1].content,
            "Sorry, I encountered a technical issue. Please try again."
        );
        assert!(!chat.is_busy());
    }

    #[test]
    fn busy_controller_rejects_overlapping_sends() {
        let dir = TempDir::new().unwrap();
        let mut chat = controller(&dir);

        let request = chat.begin_send("first").unwrap();
        assert!(chat.is_busy());
        assert_eq!(chat.begin_send("second"), Err(ValidationError::Busy));
        assert_eq!(chat.records().len(), 1);

        // Other interactions still work while busy
        chat.toggle_theme();

        chat.complete_send(&request, Ok(ApiReply::ok("done")));
        assert!(chat.begin_send("third").is_ok());
    }

    #[tokio::test]
    async fn upload_sends_attachment_and_clears_it() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("sales.csv");
        std::fs::write(&csv, "month,total\njan,3\n").unwrap();

        let mut chat = controller(&dir);
        chat.attach_path(&csv).unwrap();
        assert_eq!(chat.status().last().unwrap().message, "CSV file ready to analyze");

        let backend = FakeBackend::replying(vec![Ok(ApiReply::ok("3 rows"))]);
        assert!(chat.send(&backend, "").await);

        assert_eq!(chat.records()[0].content, "[sales.csv]");
        assert!(chat.pending().is_none());
        let submitted = backend.submitted.lock().unwrap();
        assert!(matches!(&submitted[0], OutboundRequest::Upload { message, .. } if message.is_empty()));
    }

    #[tokio::test]
    async fn failed_upload_keeps_attachment() {
        let dir = TempDir::new().unwrap();
        let png = dir.path().join("cat.png");
        std::fs::write(&png, [0u8; 16]).unwrap();

        let mut chat = controller(&dir);
        chat.attach_path(&png).unwrap();
        let backend = FakeBackend::replying(vec![Err(http_error())]);
        chat.send(&backend, "what is it?").await;

        assert!(chat.pending().is_some());
        assert!(chat.records()[1].content.contains("processing your file"));
    }

    #[test]
    fn unsupported_attachment_only_sets_status() {
        let dir = TempDir::new().unwrap();
        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, "hi").unwrap();

        let mut chat = controller(&dir);
        assert_eq!(chat.attach_path(&txt), Err(ValidationError::UnsupportedFile));
        assert!(chat.pending().is_none());
        assert_eq!(chat.status().last().unwrap().message, "Unsupported file type");
    }

    #[tokio::test]
    async fn csv_url_is_normalized_before_sending() {
        let dir = TempDir::new().unwrap();
        let mut chat = controller(&dir);
        let backend = FakeBackend::replying(vec![Ok(ApiReply::ok("loaded"))]);

        assert!(chat.load_csv_url(&backend, "github.com/u/r/blob/main/d.csv").await);

        assert_eq!(
            chat.records()[0].content,
            "[https://raw.githubusercontent.com/u/r/main/d.csv]"
        );
        assert_eq!(
            chat.status().last().unwrap().message,
            "CSV loaded successfully from URL"
        );
    }

    #[tokio::test]
    async fn invalid_csv_url_is_blocked() {
        let dir = TempDir::new().unwrap();
        let mut chat = controller(&dir);
        let backend = FakeBackend::replying(Vec::new());

        assert!(!chat.load_csv_url(&backend, "not a url").await);
        assert_eq!(backend.calls(), 0);
        assert!(chat.records().is_empty());
        assert_eq!(chat.status().last().unwrap().level, StatusLevel::Error);
    }

    #[tokio::test]
    async fn history_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let before = {
            let mut chat = controller(&dir);
            let backend = FakeBackend::replying(vec![Ok(ApiReply::ok("- a\n- b"))]);
            chat.send(&backend, "list please").await;
            to_html(chat.records())
        };

        let reopened = controller(&dir);
        assert_eq!(reopened.records().len(), 2);
        assert_eq!(to_html(reopened.records()), before);
    }

    #[tokio::test]
    async fn clear_resets_locally_even_when_backend_fails() {
        let dir = TempDir::new().unwrap();
        let mut chat = controller(&dir);
        chat.send(&FakeBackend::replying(Vec::new()), "hello").await;

        let backend = FakeBackend::failing_clear();
        chat.clear(&backend).await;

        assert_eq!(*backend.clears.lock().unwrap(), 1);
        assert!(chat.welcome_visible());
        assert_eq!(to_html(chat.records()).matches("welcome-message").count(), 1);
        assert_eq!(chat.status().last().unwrap().message, "Error clearing chat");
        assert!(controller(&dir).records().is_empty());
    }

    #[tokio::test]
    async fn clear_success_reports_status() {
        let dir = TempDir::new().unwrap();
        let mut chat = controller(&dir);
        chat.send(&FakeBackend::replying(Vec::new()), "hello").await;

        chat.clear(&FakeBackend::replying(Vec::new())).await;

        assert!(chat.records().is_empty());
        assert_eq!(chat.status().last().unwrap().message, "Chat cleared successfully");
    }

    #[test]
    fn stale_response_is_still_applied_after_clear() {
        let dir = TempDir::new().unwrap();
        let mut chat = controller(&dir);
        let request = chat.begin_send("slow question").unwrap();
        chat.reset_local();

        chat.complete_send(&request, Ok(ApiReply::ok("late answer")));

        assert_eq!(chat.records().len(), 1);
        assert_eq!(chat.records()[0].content, "late answer");
    }

    #[test]
    fn theme_toggle_persists() {
        let dir = TempDir::new().unwrap();
        let mut chat = controller(&dir);
        assert_eq!(chat.theme(), Theme::Light);
        assert_eq!(chat.toggle_theme(), Theme::Dark);
        assert_eq!(controller(&dir).theme(), Theme::Dark);
    }

    #[test]
    fn corrupt_history_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let session = SessionId::load_or_create(&store).unwrap();
        store.set(&session.history_key(), "<div>legacy</div>").unwrap();

        let chat = ChatController::open(store).unwrap();
        assert!(chat.welcome_visible());
    }
}
