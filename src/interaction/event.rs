//! Resolves event types and routes each event to exactly one handler.

use std::sync::Arc;

use anyhow::Context;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    base::{
        config::Config,
        types::{EventEnvelope, MessageReceiveEvent, Res},
    },
    interaction::{helpdesk, message, reply::ReplyGenerator},
    service::chat::{ChatClient, EventCallback},
};

pub const MESSAGE_RECEIVE: &str = "im.message.receive_v1";
pub const HELPDESK_TICKET: &str = "helpdesk.ticket_v1";
pub const HELPDESK_TICKET_MESSAGE: &str = "helpdesk.ticket_message_v1";
pub const BOT_MENU: &str = "application.bot.menu_v6";

/// Event types with a dedicated handler.
pub const SUPPORTED_EVENTS: &[&str] = &[MESSAGE_RECEIVE, HELPDESK_TICKET, HELPDESK_TICKET_MESSAGE, BOT_MENU];

/// A platform event, resolved from its type string.
#[derive(Debug)]
pub enum Event {
    MessageReceive(MessageReceiveEvent),
    HelpdeskTicket(Map<String, Value>),
    HelpdeskTicketMessage(Map<String, Value>),
    BotMenu(Map<String, Value>),
    /// Any event type without a handler; carries the type string.
    Unknown(String),
}

impl Event {
    /// Resolves the envelope's event type and parses its payload.
    ///
    /// Fails only when a known event type carries a payload of the wrong shape.
    pub fn parse(envelope: EventEnvelope) -> Res<Self> {
        let EventEnvelope { event_type, event, .. } = envelope;

        let parsed = match event_type.as_str() {
            MESSAGE_RECEIVE => Self::MessageReceive(serde_json::from_value(event).context("failed to parse message event")?),
            HELPDESK_TICKET => Self::HelpdeskTicket(serde_json::from_value(event).context("failed to parse helpdesk ticket event")?),
            HELPDESK_TICKET_MESSAGE => Self::HelpdeskTicketMessage(serde_json::from_value(event).context("failed to parse helpdesk ticket message event")?),
            BOT_MENU => Self::BotMenu(serde_json::from_value(event).context("failed to parse bot menu event")?),
            other => Self::Unknown(other.to_string()),
        };

        Ok(parsed)
    }
}

/// Routes events to their handlers.
///
/// This is trivially cloneable; the chat client it replies through is injected
/// at construction.
#[derive(Clone)]
pub struct EventRouter {
    chat: ChatClient,
    replies: ReplyGenerator,
    helpdesk_events: bool,
}

impl EventRouter {
    pub fn new(chat: ChatClient, replies: ReplyGenerator, helpdesk_events: bool) -> Self {
        Self { chat, replies, helpdesk_events }
    }

    pub fn from_config(config: &Config, chat: ChatClient) -> Self {
        Self::new(chat, ReplyGenerator::from_config(config), config.helpdesk_events)
    }

    /// Dispatches one event.
    ///
    /// Returns the handle of the reply task, if the event led to a reply.
    #[instrument(skip_all, fields(event_type = %envelope.event_type))]
    pub fn dispatch(&self, envelope: EventEnvelope) -> Option<JoinHandle<()>> {
        info!("Received event `{}` ...", envelope.event_type);

        let event = match Event::parse(envelope) {
            Ok(event) => event,
            Err(err) => {
                error!("Dropping event: {:#}", err);
                return None;
            }
        };

        match event {
            Event::MessageReceive(event) => message::handle_message_receive(event, self.chat.clone(), self.replies.clone()),
            Event::HelpdeskTicket(event) if self.helpdesk_events => {
                helpdesk::handle_helpdesk_ticket(&event);
                None
            }
            Event::HelpdeskTicketMessage(event) if self.helpdesk_events => {
                helpdesk::handle_helpdesk_ticket_message(&event);
                None
            }
            Event::HelpdeskTicket(_) | Event::HelpdeskTicketMessage(_) => {
                debug!("Helpdesk events are disabled, ignoring.");
                None
            }
            Event::BotMenu(event) => {
                helpdesk::handle_bot_menu(&event);
                None
            }
            Event::Unknown(event_type) => {
                warn!("Unhandled event type `{}`.", event_type);
                None
            }
        }
    }

    /// Wraps the router into the callback a chat client feeds events to.
    ///
    /// Reply tasks are detached.
    pub fn into_callback(self) -> EventCallback {
        Arc::new(move |envelope: EventEnvelope| {
            let _ = self.dispatch(envelope);
        })
    }
}

// Tests.
