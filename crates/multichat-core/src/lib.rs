pub mod attachment;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod history;
pub mod markup;
pub mod outbound;
pub mod render;
pub mod session;
pub mod status;
pub mod store;
pub mod suggestion;
pub mod theme;
pub mod url;

// Re-export main types for convenience
pub use attachment::{Attachment, AttachmentKind};
pub use client::{ApiReply, BackendClient, ChatBackend, ServerMessage};
pub use config::Config;
pub use controller::{ChatController, ChatState};
pub use error::{BackendError, StoreError, ValidationError};
pub use history::{AttachmentNote, MessageRecord, Role};
pub use outbound::{Endpoint, OutboundRequest};
pub use render::{render_blocks, Block, Inline};
pub use session::SessionId;
pub use status::{Status, StatusLevel, StatusLine};
pub use store::LocalStore;
pub use suggestion::Suggestion;
pub use theme::Theme;
