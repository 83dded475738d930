use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;

use crate::error::BackendError;
use crate::outbound::{ChatPayload, OutboundRequest};
use crate::session::SessionId;

/// Response body shared by the chat and upload endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ApiReply {
    pub fn ok(response: impl Into<String>) -> Self {
        Self {
            success: true,
            response: Some(response.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            response: None,
            error: Some(error.into()),
        }
    }
}

/// One entry of the server-side conversation log.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerMessage {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    history: Vec<ServerMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// The backend as seen by the controller.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn submit(&self, request: &OutboundRequest) -> Result<ApiReply, BackendError>;
    async fn clear_session(&self, user_id: &SessionId) -> Result<(), BackendError>;
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn post(&self, request: &OutboundRequest) -> Result<ApiReply, BackendError> {
        let url = self.url(request.endpoint().path());
        tracing::debug!(endpoint = %url, user_id = %request.user_id(), "sending request");

        let builder = match request {
            OutboundRequest::Chat { message, user_id } => self.client.post(&url).json(&ChatPayload {
                message: message.as_str(),
                user_id: user_id.as_str(),
            }),
            OutboundRequest::Upload {
                attachment,
                message,
                user_id,
            } => {
                let bytes = tokio::fs::read(&attachment.path).await?;
                let part = Part::bytes(bytes)
                    .file_name(attachment.name.clone())
                    .mime_str(attachment.mime())?;
                let form = Form::new()
                    .part("file", part)
                    .text("message", message.clone())
                    .text("user_id", user_id.to_string());
                self.client.post(&url).multipart(form)
            }
            OutboundRequest::CsvUrl { url: csv_url, user_id } => {
                let form = Form::new()
                    .text("url", csv_url.clone())
                    .text("user_id", user_id.to_string())
                    .text("message", String::new());
                self.client.post(&url).multipart(form)
            }
        };

        let response = error_for_status(builder.send().await?).await?;
        Ok(response.json().await?)
    }

    pub async fn clear(&self, user_id: &SessionId) -> Result<(), BackendError> {
        let url = self.url(&format!("/api/clear/{}", user_id));
        let response = self.client.post(&url).send().await?;
        error_for_status(response).await?;
        Ok(())
    }

    /// The server's own record of the conversation.
    pub async fn history(&self, user_id: &SessionId) -> Result<Vec<ServerMessage>, BackendError> {
        let url = self.url(&format!("/api/history/{}", user_id));
        let response = error_for_status(self.client.get(&url).send().await?).await?;
        let body: HistoryResponse = response.json().await?;
        if !body.success {
            return Err(BackendError::Http {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                message: body.error,
            });
        }
        Ok(body.history)
    }
}

/// Turn a non-success status into [`BackendError::Http`], keeping the server's
/// `error` message when the body carries one.
async fn error_for_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.error);
    Err(BackendError::Http { status, message })
}

#[async_trait]
impl ChatBackend for BackendClient {
    async fn submit(&self, request: &OutboundRequest) -> Result<ApiReply, BackendError> {
        self.post(request).await
    }

    async fn clear_session(&self, user_id: &SessionId) -> Result<(), BackendError> {
        self.clear(user_id).await
    }
}
