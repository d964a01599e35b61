//! Helpdesk and bot menu events. These are only logged for now.

use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

fn ticket_id(event: &Map<String, Value>) -> &str {
    event.get("ticket").and_then(|t| t.get("ticket_id")).and_then(Value::as_str).unwrap_or("unknown")
}

/// Handles `helpdesk.ticket_v1`.
#[instrument(skip_all)]
pub fn handle_helpdesk_ticket(event: &Map<String, Value>) {
    info!("Received helpdesk ticket event for ticket `{}`.", ticket_id(event));
    debug!("Ticket event data: {:?}", event);
}

/// Handles `helpdesk.ticket_message_v1`.
#[instrument(skip_all)]
pub fn handle_helpdesk_ticket_message(event: &Map<String, Value>) {
    info!("Received helpdesk ticket message event for ticket `{}`.", ticket_id(event));
    debug!("Ticket message event data: {:?}", event);
}

/// Handles `application.bot.menu_v6`.
#[instrument(skip_all)]
pub fn handle_bot_menu(event: &Map<String, Value>) {
    let event_key = event.get("event_key").and_then(Value::as_str).unwrap_or_default();

    info!("Received bot menu event `{}`.", event_key);
}
