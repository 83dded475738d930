//! Assembly of outbound requests from the input box and pending attachment.

use serde::Serialize;

use crate::attachment::{Attachment, AttachmentKind};
use crate::error::{BackendError, ValidationError};
use crate::history::{AttachmentNote, MessageRecord};
use crate::session::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Chat,
    ImageUpload,
    CsvUpload,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Chat => "/api/chat",
            Endpoint::ImageUpload => "/api/upload/image",
            Endpoint::CsvUpload => "/api/upload/csv",
        }
    }
}

/// JSON body of a plain chat message.
#[derive(Debug, Serialize)]
pub struct ChatPayload<'a> {
    pub message: &'a str,
    pub user_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundRequest {
    /// JSON `{message, user_id}`.
    Chat { message: String, user_id: SessionId },
    /// Multipart `{file, message, user_id}`.
    Upload {
        attachment: Attachment,
        message: String,
        user_id: SessionId,
    },
    /// Multipart `{url, message, user_id}` with an empty message.
    CsvUrl { url: String, user_id: SessionId },
}

impl OutboundRequest {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            OutboundRequest::Chat { .. } => Endpoint::Chat,
            OutboundRequest::Upload { attachment, .. } => match attachment.kind {
                AttachmentKind::Image => Endpoint::ImageUpload,
                AttachmentKind::Csv => Endpoint::CsvUpload,
            },
            OutboundRequest::CsvUrl { .. } => Endpoint::CsvUpload,
        }
    }

    pub fn user_id(&self) -> &SessionId {
        match self {
            OutboundRequest::Chat { user_id, .. }
            | OutboundRequest::Upload { user_id, .. }
            | OutboundRequest::CsvUrl { user_id, .. } => user_id,
        }
    }

    /// The user turn shown in the conversation for this request.
    pub fn user_turn(&self) -> MessageRecord {
        match self {
            OutboundRequest::Chat { message, .. } => MessageRecord::user(message.as_str()),
            OutboundRequest::Upload {
                attachment,
                message,
                ..
            } => {
                let text = if message.is_empty() {
                    format!("[{}]", attachment.name)
                } else {
                    format!("{}\n[{}]", message, attachment.name)
                };
                MessageRecord::user(text).with_attachment(AttachmentNote {
                    name: attachment.name.clone(),
                    kind: attachment.kind,
                })
            }
            OutboundRequest::CsvUrl { url, .. } => MessageRecord::user(format!("[{}]", url)),
        }
    }

    /// Bot turn appended when the request never got a usable answer.
    pub fn failure_message(&self, error: &BackendError) -> String {
        match self {
            OutboundRequest::Chat { .. } => {
                "Sorry, I encountered a technical issue. Please try again.".to_string()
            }
            OutboundRequest::Upload { .. } => {
                "Sorry, I encountered an error while processing your file. Please try again."
                    .to_string()
            }
            OutboundRequest::CsvUrl { .. } => csv_url_failure_message(error),
        }
    }
}

/// Build the request for the current input. Rejects a send with neither text
/// nor attachment before anything else happens.
pub fn assemble_outbound(
    text: &str,
    attachment: Option<&Attachment>,
    user_id: &SessionId,
) -> Result<OutboundRequest, ValidationError> {
    let message = text.trim();
    match attachment {
        Some(attachment) => Ok(OutboundRequest::Upload {
            attachment: attachment.clone(),
            message: message.to_string(),
            user_id: user_id.clone(),
        }),
        None if message.is_empty() => Err(ValidationError::EmptySend),
        None => Ok(OutboundRequest::Chat {
            message: message.to_string(),
            user_id: user_id.clone(),
        }),
    }
}

/// Build the URL-ingestion request from an already normalized URL.
pub fn assemble_csv_url(url: &str, user_id: &SessionId) -> OutboundRequest {
    OutboundRequest::CsvUrl {
        url: url.to_string(),
        user_id: user_id.clone(),
    }
}

fn csv_url_failure_message(error: &BackendError) -> String {
    let text = error.to_string();
    let reason = if error.is_not_found() || text.contains("404") || text.contains("Not Found") {
        "The URL might be invalid or the file was not found."
    } else if error.is_network() || text.contains("network") || text.contains("Network") {
        "There seems to be a network issue. Please check your connection."
    } else if text.contains("CSV") || text.contains("parse") {
        "The URL might not point to a valid CSV file."
    } else if text.contains("tokenizing") {
        "The CSV file format is invalid. Please check if it's a properly formatted CSV."
    } else {
        "Please check the URL and try again."
    };
    format!(
        "Sorry, I encountered an error while loading the CSV from URL. {}",
        reason
    )
}
