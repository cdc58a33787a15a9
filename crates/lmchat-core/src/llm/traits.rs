use crate::error::ChatError;
use crate::llm::tools::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Model used when the server does not report any.
pub const FALLBACK_MODEL: &str = "local-model";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageUrl {
    pub url: String,
}

/// One block of a multimodal message body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(rename = "image_url")]
    ImageRef {
        image_url: ImageUrl,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::ImageRef {
            image_url: ImageUrl { url: url.into() },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::ImageRef { .. } => None,
        }
    }
}

/// Message body: plain text, or an ordered list of blocks.
///
/// Serialized untagged so the wire shape matches the OpenAI chat API: a JSON
/// string for `Text`, an array of typed blocks for `Blocks`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Content {
    /// The text a title or preview should show: the plain text itself, or
    /// the first text block. Empty when there is none.
    pub fn leading_text(&self) -> &str {
        match self {
            Content::Text(text) => text,
            Content::Blocks(blocks) => blocks.iter().find_map(ContentBlock::as_text).unwrap_or(""),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(text) => text.is_empty(),
            Content::Blocks(blocks) => blocks.is_empty(),
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: Content,
}

impl Message {
    pub fn user(content: impl Into<Content>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<Content>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Content::Text(content.into()),
        }
    }

    /// Plain text content, if the message is not multimodal.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Content::Text(text) => Some(text),
            Content::Blocks(_) => None,
        }
    }
}

/// Request body for an OpenAI-compatible `/chat/completions` call.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
}

impl ChatRequest {
    pub fn with_tools(mut self, tools: &[ToolDefinition]) -> Self {
        self.tools = if tools.is_empty() {
            None
        } else {
            Some(tools.iter().map(ToolDefinition::to_openai).collect())
        };
        self
    }
}

/// One incremental unit of a streamed response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub delta: Option<String>,
    /// Name of a tool the model asked to invoke, if any.
    pub tool_call: Option<String>,
}

impl Fragment {
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            delta: Some(delta.into()),
            tool_call: None,
        }
    }

    pub fn tool(name: impl Into<String>) -> Self {
        Self {
            delta: None,
            tool_call: Some(name.into()),
        }
    }

    /// The text delta, treating an empty string as no text.
    pub fn text_delta(&self) -> Option<&str> {
        self.delta.as_deref().filter(|d| !d.is_empty())
    }
}

pub type FragmentStream = futures::channel::mpsc::UnboundedReceiver<Result<Fragment, ChatError>>;

/// The transport seam. Implementations talk to the inference server.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Open a streamed completion. Errors raised mid-stream arrive as `Err`
    /// items on the returned stream.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<FragmentStream, ChatError>;

    /// Models the server currently offers.
    async fn list_models(&self) -> Result<Vec<String>, ChatError> {
        Ok(Vec::new())
    }
}

/// Model list for a picker, never empty.
pub async fn available_models(transport: &dyn ChatTransport) -> Vec<String> {
    match transport.list_models().await {
        Ok(models) if !models.is_empty() => models,
        Ok(_) => vec![FALLBACK_MODEL.to_string()],
        Err(e) => {
            tracing::warn!("Failed to list models: {}", e);
            vec![FALLBACK_MODEL.to_string()]
        }
    }
}
