//! Automator types: chat state, messages, site variants and snapshots.

use std::sync::Arc;

use chatscope_core::url_host;
use chatscope_extract::Extracted;
use serde::{Deserialize, Serialize};

use crate::processor::{GrokMessages, MessagePostProcessor, PassThrough};

/// Observable state of a chat page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatState {
    Idle,
    Generating,
    /// Reserved for site variants that can detect a failed reply.
    Error,
}

impl ChatState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ChatState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message reshaped by a site post-processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: None,
        }
    }
}

/// One entry of `get_messages`: a typed message when the site variant
/// reshapes records, the extracted record otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatRecord {
    Message(ChatMessage),
    Raw(Extracted),
}

impl ChatRecord {
    pub fn as_message(&self) -> Option<&ChatMessage> {
        match self {
            Self::Message(m) => Some(m),
            Self::Raw(_) => None,
        }
    }
}

/// Known assistant sites. Variants differ only in message post-processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteVariant {
    Generic,
    #[serde(rename = "chatgpt")]
    ChatGpt,
    Gemini,
    Grok,
}

impl SiteVariant {
    pub fn all() -> &'static [SiteVariant] {
        &[Self::Generic, Self::ChatGpt, Self::Gemini, Self::Grok]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::ChatGpt => "chatgpt",
            Self::Gemini => "gemini",
            Self::Grok => "grok",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "generic" | "default" => Some(Self::Generic),
            "chatgpt" => Some(Self::ChatGpt),
            "gemini" => Some(Self::Gemini),
            "grok" => Some(Self::Grok),
            _ => None,
        }
    }

    pub fn hosts(&self) -> &'static [&'static str] {
        match self {
            Self::Generic => &[],
            Self::ChatGpt => &["chatgpt.com", "chat.openai.com"],
            Self::Gemini => &["gemini.google.com"],
            Self::Grok => &["grok.com"],
        }
    }

    /// Variant for the host of `url` (subdomains included); `Generic` when
    /// the host is not a known site.
    pub fn from_url(url: &str) -> Self {
        let host = url_host(url).to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        Self::all()
            .iter()
            .copied()
            .find(|variant| {
                variant.hosts().iter().any(|known| {
                    host == *known
                        || host
                            .strip_suffix(known)
                            .map_or(false, |prefix| prefix.ends_with('.'))
                })
            })
            .unwrap_or(Self::Generic)
    }

    pub fn processor(&self) -> Arc<dyn MessagePostProcessor> {
        match self {
            Self::Grok => Arc::new(GrokMessages),
            Self::Generic | Self::ChatGpt | Self::Gemini => Arc::new(PassThrough),
        }
    }
}

impl std::fmt::Display for SiteVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Outcome of one automator call in a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Probe<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Probe<T> {
    pub fn from_result(result: chatscope_core::Result<T>) -> Self {
        match result {
            Ok(value) => Self {
                success: true,
                result: Some(value),
                error: None,
            },
            Err(e) => Self {
                success: false,
                result: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageList {
    pub messages: Vec<ChatRecord>,
    pub count: usize,
}

/// Read-only automator calls against the current page, for regression
/// output over recorded fixtures.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomatorSnapshot {
    pub site: SiteVariant,
    pub check_login_status: Probe<bool>,
    pub get_chat_state: Probe<ChatState>,
    pub get_messages: Probe<MessageList>,
}
