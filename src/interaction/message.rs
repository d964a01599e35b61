//! Handles `im.message.receive_v1`: extract the text, reply in the message thread.

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::{
    base::types::{MessageReceiveEvent, OutboundReply, Void},
    interaction::reply::ReplyGenerator,
    service::chat::ChatClient,
};

/// Extracts the text of a message from its JSON content blob.
///
/// Returns `None` for anything that is not an object with a string `text` field
/// (images, files, stickers, or content that is not JSON at all).
pub fn extract_text(content: &str) -> Option<String> {
    let content: Value = serde_json::from_str(content).ok()?;

    content.get("text")?.as_str().map(str::to_string)
}

/// Handles a received message.
///
/// The reply is sent on its own task so the connection loop is never blocked.
/// The returned handle may be awaited; dropping it leaves the reply best-effort.
/// Returns `None` when there is nothing to reply to.
#[instrument(skip_all)]
pub fn handle_message_receive(event: MessageReceiveEvent, chat: ChatClient, replies: ReplyGenerator) -> Option<JoinHandle<()>> {
    let message = event.message;

    info!("Received message `{}` in chat `{}` (type `{}`).", message.message_id, message.chat_id, message.message_type);
    debug!("Message content: {}", message.content);

    let Some(text) = extract_text(&message.content) else {
        debug!("Ignoring message without text content.");
        return None;
    };

    debug!("Message text: {}", text);

    if message.message_id.is_empty() {
        warn!("Skipping reply because the message ID is empty.");
        return None;
    }

    let reply = OutboundReply {
        message_id: message.message_id,
        text: replies.generate(&text),
    };

    Some(tokio::spawn(
        async move {
            // Process the reply.
            let result = send_reply(&chat, &reply).await;

            // Log any errors.
            if let Err(err) = &result {
                error!("Failed to reply to `{}`: {}", reply.message_id, err);
            }
        }
        .in_current_span(),
    ))
}

#[instrument(skip_all, fields(message_id = %reply.message_id))]
async fn send_reply(chat: &ChatClient, reply: &OutboundReply) -> Void {
    debug!("Sending reply: {}", reply.text);

    chat.reply_message(&reply.message_id, &reply.text).await?;

    info!("Replied to `{}`.", reply.message_id);

    Ok(())
}

// Tests.
