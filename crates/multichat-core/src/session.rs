use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::LocalStore;

pub const SESSION_KEY: &str = "chatUserId";

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LEN: usize = 9;

/// Client-generated correlation token for the backend conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// A fresh `user_xxxxxxxxx` id.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..ID_LEN)
            .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
            .collect();
        Self(format!("user_{}", suffix))
    }

    /// Return the persisted id, creating and storing one on first use.
    pub fn load_or_create(store: &LocalStore) -> Result<Self, StoreError> {
        if let Some(existing) = store.get(SESSION_KEY)? {
            let existing = existing.trim();
            if !existing.is_empty() {
                return Ok(Self(existing.to_string()));
            }
        }

        let id = Self::generate();
        store.set(SESSION_KEY, id.as_str())?;
        tracing::info!(user_id = %id, "created new session id");
        Ok(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage key for this session's message history.
    pub fn history_key(&self) -> String {
        format!("chatHistory_{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
