use crate::error::FusionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;

/// An agent users can chat with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_true")]
    pub status: bool,
    #[serde(default)]
    pub system_agent: bool,
    #[serde(default)]
    pub transcription: Option<String>,
}

impl Agent {
    pub fn is_active(&self) -> bool {
        self.status
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.status { "active" } else { "inactive" };
        write!(f, "{} ({marker})", self.name)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub full_name: String,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.full_name, self.email)
    }
}

/// A conversation between a user and an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub agent: Agent,
    pub user: User,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub knowledge: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub system_chat: bool,
}

impl Chat {
    pub fn display_title(&self) -> String {
        match &self.folder {
            Some(folder) => format!("[{folder}] Chat with {}", self.agent.name),
            None => format!("Chat with {}", self.agent.name),
        }
    }
}

/// Who sent a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub message: String,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub files: Vec<String>,
}

impl Message {
    pub fn is_from_user(&self) -> bool {
        self.message_type == MessageType::User
    }

    pub fn is_from_agent(&self) -> bool {
        self.message_type == MessageType::Agent
    }
}

/// A chat together with its messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub chat: Chat,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ChatResponse {
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn agent_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_from_agent())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileUploadResponse {
    pub file_id: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub upload_url: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FileUploadResponse {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

impl fmt::Display for FileUploadResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.2}MB)", self.filename, self.size_mb())
    }
}

/// Envelope of `GET /agents`
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct AgentList {
    #[serde(default)]
    pub agents: Vec<Agent>,
}

/// Envelope of `GET /chat/{id}/messages`
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct MessageList {
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// A message to send, either into an existing chat or opening a new one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub agent_id: String,
    pub message: String,
    pub chat_id: Option<String>,
    pub files: Vec<String>,
    pub folder: Option<String>,
}

impl SendMessageRequest {
    pub fn new(agent_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            message: message.into(),
            chat_id: None,
            files: Vec::new(),
            folder: None,
        }
    }

    pub fn builder(
        agent_id: impl Into<String>,
        message: impl Into<String>,
    ) -> SendMessageRequestBuilder {
        SendMessageRequestBuilder::new(agent_id, message)
    }

    /// JSON body for the endpoint this request is routed to
    pub(crate) fn body(&self, stream: bool) -> serde_json::Value {
        let mut body = match &self.chat_id {
            Some(_) => serde_json::json!({
                "message": self.message,
                "files": self.files,
            }),
            None => serde_json::json!({
                "agent_id": self.agent_id,
                "message": self.message,
                "files": self.files,
                "folder": self.folder,
            }),
        };
        if stream {
            body["stream"] = serde_json::Value::Bool(true);
        }
        body
    }
}

/// Builder pattern for message requests
#[derive(Debug, Clone)]
pub struct SendMessageRequestBuilder {
    request: SendMessageRequest,
}

impl SendMessageRequestBuilder {
    pub fn new(agent_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request: SendMessageRequest::new(agent_id, message),
        }
    }

    pub fn chat_id(mut self, chat_id: impl Into<String>) -> Self {
        self.request.chat_id = Some(chat_id.into());
        self
    }

    pub fn file(mut self, file_id: impl Into<String>) -> Self {
        self.request.files.push(file_id.into());
        self
    }

    pub fn files<I, S>(mut self, file_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.files.extend(file_ids.into_iter().map(Into::into));
        self
    }

    pub fn folder(mut self, folder: impl Into<String>) -> Self {
        self.request.folder = Some(folder.into());
        self
    }

    pub fn build(self) -> SendMessageRequest {
        self.request
    }
}

/// Type alias for streaming results
pub type StreamResult<T> = Pin<Box<dyn futures::Stream<Item = Result<T, FusionError>> + Send>>;

/// Stream of response tokens
pub type TokenStream = StreamResult<String>;
