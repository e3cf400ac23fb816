use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bot message shown when the endpoint could not be reached or its reply
/// could not be read.
pub const CONNECTION_ERROR_TEXT: &str = "Error connecting to server.";

/// How a user turn is encoded in the request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PayloadEncoding {
    /// `{"query": text, "project_name": project_name}` as JSON
    Json { project_name: String },
    /// `prompt=text` as a urlencoded form
    Form,
}

impl Default for PayloadEncoding {
    fn default() -> Self {
        PayloadEncoding::Json {
            project_name: "chatwidget".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub url: String,
    pub encoding: PayloadEncoding,
    /// Field of a successful reply holding the bot text
    pub response_field: String,
    /// Field of a failed reply holding the error detail
    pub error_field: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000/chat".to_string(),
            encoding: PayloadEncoding::default(),
            response_field: "response".to_string(),
            error_field: "detail".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// The request never completed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("endpoint returned {status}: {detail}")]
    Rejected { status: u16, detail: String },

    /// The endpoint answered but the body was not the expected JSON.
    #[error("could not decode reply: {0}")]
    Decode(String),

    /// The task carrying the request died before it produced an outcome.
    #[error("request aborted: {0}")]
    Aborted(String),
}

impl EndpointError {
    /// Text of the bot message that reports this failure
    pub fn bot_text(&self) -> String {
        match self {
            EndpointError::Rejected { detail, .. } => format!("Error: {}", detail),
            EndpointError::Transport(_) | EndpointError::Decode(_) | EndpointError::Aborted(_) => {
                CONNECTION_ERROR_TEXT.to_string()
            }
        }
    }
}

/// One request/response exchange per user turn
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    async fn send(&self, text: &str) -> Result<String, EndpointError>;
}

#[derive(Serialize)]
struct JsonRequest<'a> {
    query: &'a str,
    project_name: &'a str,
}

#[derive(Serialize)]
struct FormRequest<'a> {
    prompt: &'a str,
}

#[derive(Clone)]
pub struct HttpEndpoint {
    client: Client,
    config: EndpointConfig,
}

impl HttpEndpoint {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    fn decode(&self, status: StatusCode, body: &str) -> Result<String, EndpointError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| EndpointError::Decode(format!("{} (status {})", e, status)))?;

        if status.is_success() {
            return match value.get(&self.config.response_field) {
                Some(field) => Ok(field_text(field)),
                None => Err(EndpointError::Decode(format!(
                    "reply has no \"{}\" field",
                    self.config.response_field
                ))),
            };
        }

        // Missing detail falls back to the status reason so the user still sees something useful
        let detail = value
            .get(&self.config.error_field)
            .map(field_text)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

        Err(EndpointError::Rejected {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl ChatEndpoint for HttpEndpoint {
    async fn send(&self, text: &str) -> Result<String, EndpointError> {
        let request = self.client.post(&self.config.url);
        let request = match &self.config.encoding {
            PayloadEncoding::Json { project_name } => request.json(&JsonRequest {
                query: text,
                project_name,
            }),
            PayloadEncoding::Form => request.form(&FormRequest { prompt: text }),
        };

        tracing::debug!(url = %self.config.url, "sending chat request");
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(status = status.as_u16(), bytes = body.len(), "chat reply received");

        self.decode(status, &body)
    }
}

/// Strings are used verbatim; anything else keeps its JSON form
fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
