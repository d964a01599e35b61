//! Library root for `feishu-bot`.
//!
//! Feishu-bot is a small chat bot for Feishu / Lark designed to:
//! - Keep a long connection to the platform and receive events
//! - Answer text messages in their thread (echo or keyword replies)
//! - Log helpdesk ticket and bot menu events
//!
//! The chat platform sits behind the `GenericChatClient` trait, so the event
//! routing and reply logic can run against any implementation of it.

#[deny(missing_docs)]
pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use anyhow::anyhow;
use base::{config::Config, types::Void};
use rustls::crypto;
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the feishu-bot runtime:
/// - Initializes the crypto provider
/// - Creates the runtime context with the chat client
/// - Serves events until the connection drops or the process is told to stop
pub async fn start(config: Config) -> Void {
    info!("Starting feishu-bot ...");

    // Start the crypto provider.
    crypto::ring::default_provider().install_default().map_err(|_| anyhow!("Failed to install the rustls crypto provider."))?;

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config)?;

    // Start the runtime.
    runtime.start().await?;

    info!("Feishu-bot stopped.");

    Ok(())
}
