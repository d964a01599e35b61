use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::base::types::{EventEnvelope, Res, Void};

pub mod lark;

// Types.

/// Callback invoked by the chat client for every event it receives.
///
/// It must return quickly; long-running work belongs on a spawned task.
pub type EventCallback = Arc<dyn Fn(EventEnvelope) + Send + Sync>;

// Traits.

/// Generic "chat" trait that clients must implement.
///
/// This trait defines the core functionality for interacting with chat platforms
/// like Feishu. Implementing this trait allows different transports (or a mock)
/// to be used with the feishu-bot.
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// Start the chat client listener.
    ///
    /// Opens the long connection and hands every received event to `callback`.
    /// Returns an error if the connection cannot be established, or once it is lost.
    async fn start(&self, callback: EventCallback) -> Void;

    /// Reply to a message in its thread with plain text.
    async fn reply_message(&self, message_id: &str, text: &str) -> Void;
}

// Structs.

/// Chat client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}

/// Body of a `text` message.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextContent {
    pub text: String,
}

/// Encodes `text` as the JSON `content` string of a `text` message.
pub fn text_content(text: &str) -> Res<String> {
    Ok(serde_json::to_string(&TextContent { text: text.to_string() })?)
}

// Tests.
