//! Runtime services and shared state for the feishu-bot.

use tracing::{info, instrument, warn};

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    interaction::event::{EventRouter, SUPPORTED_EVENTS},
    service::chat::ChatClient,
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the chat client and configuration.
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The chat client instance.
    pub chat: ChatClient,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub fn new(config: Config) -> Res<Self> {
        let chat = ChatClient::lark(&config)?;

        Ok(Self { config, chat })
    }

    /// The router events are dispatched through.
    pub fn router(&self) -> EventRouter {
        EventRouter::from_config(&self.config, self.chat.clone())
    }

    /// Serves events until the connection fails or a termination signal arrives.
    ///
    /// Reply tasks still in flight at shutdown are abandoned.
    pub async fn start(&self) -> Void {
        info!("Starting the long connection (reply mode: {:?}) ...", self.config.reply_mode);
        info!("Handling event types: {}", SUPPORTED_EVENTS.join(", "));

        let callback = self.router().into_callback();

        tokio::select! {
            result = self.chat.start(callback) => result,
            signal = shutdown_signal() => {
                signal?;
                warn!("Shutdown requested, closing the connection ...");
                Ok(())
            }
        }
    }
}

/// Resolves on SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() -> Void {
    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}
