use crate::cache::CacheStats;
use crate::config::FusionConfig;
use crate::endpoints;
use crate::error::FusionError;
use crate::http::{HttpTransport, UploadFile};
use crate::stream_metrics::MetricsStream;
use crate::types::{
    Agent, AgentList, ChatResponse, FileUploadResponse, Message, MessageList, SendMessageRequest,
    TokenStream,
};
use crate::utils::buffer::buffered;
use crate::utils::sse::{sse_events, token_stream};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::path::Path;

/// Chat operations, as consumed by adapters and front ends
#[async_trait::async_trait]
pub trait ChatApi: Send + Sync {
    /// Send a message and wait for the full chat
    async fn send_message(&self, request: &SendMessageRequest)
    -> Result<ChatResponse, FusionError>;

    /// Send a message and stream the reply token by token
    async fn stream_message(&self, request: &SendMessageRequest)
    -> Result<TokenStream, FusionError>;

    async fn list_agents(&self) -> Result<Vec<Agent>, FusionError>;

    async fn get_agent(&self, agent_id: &str) -> Result<Agent, FusionError>;

    /// Stream a reply and concatenate it
    async fn collect_reply(&self, request: &SendMessageRequest) -> Result<String, FusionError> {
        let mut stream = self.stream_message(request).await?;
        let mut reply = String::new();
        while let Some(token) = stream.next().await {
            reply.push_str(&token?);
        }
        Ok(reply)
    }
}

/// Client for the Fusion chat API
#[derive(Debug, Clone)]
pub struct FusionClient {
    http: HttpTransport,
}

impl FusionClient {
    pub fn new(config: FusionConfig) -> Result<Self, FusionError> {
        let http = HttpTransport::new(&config)?;
        log::info!(
            "Fusion client initialized for {} (cache: {}, rate limit: {}/{}s)",
            config.api_base(),
            config.enable_cache,
            config.rate_limit_calls,
            config.rate_limit_window_seconds
        );
        Ok(Self { http })
    }

    /// Client configured from `FUSION_*` environment variables
    pub fn from_env() -> Result<Self, FusionError> {
        Self::new(FusionConfig::from_env()?)
    }

    /// Wrap an existing transport, e.g. one sharing components with others
    pub fn with_transport(http: HttpTransport) -> Self {
        Self { http }
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.http
    }

    /// Stream a reply through a bounded buffer of `capacity` tokens.
    ///
    /// The network side keeps reading while the consumer is busy, up to
    /// `capacity` tokens ahead.
    pub async fn stream_message_buffered(
        &self,
        request: &SendMessageRequest,
        capacity: usize,
    ) -> Result<TokenStream, FusionError> {
        let stream = self.stream_message(request).await?;
        Ok(Box::pin(buffered(stream, capacity)))
    }

    /// Open a chat with an agent, optionally with a first message
    pub async fn create_chat(
        &self,
        agent_id: &str,
        initial_message: Option<&str>,
        folder: Option<&str>,
    ) -> Result<ChatResponse, FusionError> {
        let mut body = json!({ "agent_id": agent_id, "folder": folder });
        if let Some(message) = initial_message {
            validate_message(message)?;
            body["message"] = Value::String(message.to_string());
        }
        decode(self.http.post(endpoints::CHATS, &body).await?)
    }

    pub async fn get_chat(&self, chat_id: &str) -> Result<ChatResponse, FusionError> {
        decode(self.http.get(&endpoints::chat(chat_id), &[]).await?)
    }

    /// Messages of a chat, oldest first
    pub async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, FusionError> {
        let value = self.http.get(&endpoints::chat_messages(chat_id), &[]).await?;
        if value.is_array() {
            decode(value)
        } else {
            decode::<MessageList>(value).map(|list| list.messages)
        }
    }

    /// Upload a file, optionally attaching it to a chat
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        chat_id: Option<&str>,
    ) -> Result<FileUploadResponse, FusionError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|e| {
            FusionError::validation_field(
                format!("Cannot read file {}: {e}", path.display()),
                "file_path",
            )
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                FusionError::validation_field(
                    format!("{} is not a file", path.display()),
                    "file_path",
                )
            })?;

        log::debug!("Uploading {file_name} ({} bytes)", data.len());

        let file = UploadFile::new(file_name, data);
        let fields: Vec<(&str, &str)> = chat_id.map(|id| ("chat_id", id)).into_iter().collect();
        decode(self.http.upload(endpoints::FILE_UPLOAD, &file, &fields).await?)
    }

    /// Stream a reply, keeping its token statistics readable.
    ///
    /// [`MetricsStream::stats`] reflects the tokens yielded so far and
    /// [`MetricsStream::metrics`] adds first-token latency.
    pub async fn stream_message_with_stats(
        &self,
        request: &SendMessageRequest,
    ) -> Result<MetricsStream<TokenStream>, FusionError> {
        validate_message(&request.message)?;
        log::debug!(
            "Streaming message to agent {} (chat: {:?})",
            request.agent_id,
            request.chat_id
        );

        let path = route(request);
        let bytes = self.http.stream_post(&path, &request.body(true)).await?;
        let tokens: TokenStream = Box::pin(token_stream(sse_events(bytes)));
        Ok(MetricsStream::new(tokens, path))
    }

    /// Check the service; never served from the cache
    pub async fn health_check(&self) -> Result<Value, FusionError> {
        self.http.get_uncached(endpoints::HEALTH, &[]).await
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.http.cache_stats()
    }

    pub fn clear_cache(&self) {
        self.http.clear_cache();
    }
}

#[async_trait::async_trait]
impl ChatApi for FusionClient {
    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<ChatResponse, FusionError> {
        validate_message(&request.message)?;
        log::debug!(
            "Sending message to agent {} (chat: {:?}, {} chars)",
            request.agent_id,
            request.chat_id,
            request.message.len()
        );

        let path = route(request);
        decode(self.http.post(&path, &request.body(false)).await?)
    }

    async fn stream_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<TokenStream, FusionError> {
        Ok(Box::pin(self.stream_message_with_stats(request).await?))
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, FusionError> {
        let value = self.http.get(endpoints::AGENTS, &[]).await?;
        decode::<AgentList>(value).map(|list| list.agents)
    }

    async fn get_agent(&self, agent_id: &str) -> Result<Agent, FusionError> {
        decode(self.http.get(&endpoints::agent(agent_id), &[]).await?)
    }
}

/// Existing chats take the message endpoint, otherwise a new chat is opened
fn route(request: &SendMessageRequest) -> String {
    match &request.chat_id {
        Some(chat_id) => endpoints::chat_message(chat_id),
        None => endpoints::CHATS.to_string(),
    }
}

fn validate_message(message: &str) -> Result<(), FusionError> {
    if message.trim().is_empty() {
        return Err(FusionError::validation_field(
            "Message cannot be empty",
            "message",
        ));
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, FusionError> {
    serde_json::from_value(value)
        .map_err(|e| FusionError::serialization("Unexpected response shape", e))
}
