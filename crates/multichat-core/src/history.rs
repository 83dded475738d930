//! Structured message records and their client-local persistence.
//!
//! History is stored as the ordered list of records, never as rendered
//! output, so every view is rebuilt from the same data after a reload.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::attachment::AttachmentKind;
use crate::error::StoreError;
use crate::render::{render_blocks, Block};
use crate::session::SessionId;
use crate::store::LocalStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Bot => "AI",
        }
    }
}

/// The file that went along with a user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentNote {
    pub name: String,
    pub kind: AttachmentKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentNote>,
    pub timestamp: DateTime<Utc>,
}

impl MessageRecord {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(Role::Bot, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            attachment: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_attachment(mut self, note: AttachmentNote) -> Self {
        self.attachment = Some(note);
        self
    }

    pub fn blocks(&self) -> Vec<Block> {
        render_blocks(&self.content)
    }

    /// Local wall-clock time shown under the message.
    pub fn time_label(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string()
    }
}

/// Read the stored history for `session`. A missing key is an empty history.
pub fn load_history(
    store: &LocalStore,
    session: &SessionId,
) -> Result<Vec<MessageRecord>, StoreError> {
    match store.get(&session.history_key())? {
        Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
        _ => Ok(Vec::new()),
    }
}

pub fn save_history(
    store: &LocalStore,
    session: &SessionId,
    records: &[MessageRecord],
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(records)?;
    store.set(&session.history_key(), &raw)
}

pub fn delete_history(store: &LocalStore, session: &SessionId) -> Result<(), StoreError> {
    store.remove(&session.history_key())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Vec<MessageRecord> {
        vec![
            MessageRecord::user("Plot this\n[sales.csv]").with_attachment(AttachmentNote {
                name: "sales.csv".to_string(),
                kind: AttachmentKind::Csv,
            }),
            MessageRecord::bot("**Summary**\n- rows: 10\n```\nraw\n```"),
        ]
    }

    #[test]
    fn missing_history_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let session = SessionId::from("user_aaaaaaaaa");
        assert!(load_history(&store, &session).unwrap().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let session = SessionId::from("user_bbbbbbbbb");
        let records = sample();

        save_history(&store, &session, &records).unwrap();
        assert_eq!(load_history(&store, &session).unwrap(), records);
    }

    #[test]
    fn history_is_keyed_by_session() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let alice = SessionId::from("user_alice0000");
        let bob = SessionId::from("user_bob000000");

        save_history(&store, &alice, &sample()).unwrap();
        assert!(load_history(&store, &bob).unwrap().is_empty());

        delete_history(&store, &alice).unwrap();
        assert!(load_history(&store, &alice).unwrap().is_empty());
    }

    #[test]
    fn corrupt_history_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let session = SessionId::from("user_ccccccccc");
        store.set(&session.history_key(), "<div>old markup</div>").unwrap();
        assert!(matches!(
            load_history(&store, &session),
            Err(StoreError::Serde(_))
        ));
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&MessageRecord::bot("hi")).unwrap();
        assert!(json.contains("\"role\":\"bot\""));
        assert!(!json.contains("attachment"));
    }
}
