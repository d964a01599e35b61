//! Feishu / Lark implementation of [`GenericChatClient`].
//!
//! Events arrive over the platform's long connection (a websocket carrying
//! protobuf frames); replies go out through the HTTP API.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::base::{
    config::Config,
    types::{Res, Void},
};

use super::{ChatClient, EventCallback, GenericChatClient};

pub mod api;
pub mod frame;
mod socket;

use api::LarkApi;

// Extra methods on `ChatClient` applied by the lark implementation.

impl ChatClient {
    /// Creates a new Feishu / Lark chat client.
    pub fn lark(config: &Config) -> Res<Self> {
        let client = LarkChatClient::new(config)?;
        Ok(Self::new(Arc::new(client)))
    }
}

/// Feishu / Lark client implementation.
#[derive(Clone)]
pub struct LarkChatClient {
    api: Arc<LarkApi>,
}

impl LarkChatClient {
    /// Create a new Feishu / Lark chat client.
    #[instrument(name = "LarkChatClient::new", skip_all)]
    pub fn new(config: &Config) -> Res<Self> {
        let api = Arc::new(LarkApi::new(config)?);

        info!("Using app `{}` against {}.", config.app_id, config.base_url);

        Ok(Self { api })
    }
}

#[async_trait]
impl GenericChatClient for LarkChatClient {
    async fn start(&self, callback: EventCallback) -> Void {
        // Fail early on bad credentials, before the connection is opened.
        self.api.tenant_access_token().await?;

        socket::run(&self.api, callback).await
    }

    #[instrument(skip(self, text))]
    async fn reply_message(&self, message_id: &str, text: &str) -> Void {
        self.api.reply_text(message_id, text).await
    }
}
