//! Event handling and user interactions for feishu-bot.
//!
//! This module provides functionality for handling platform events:
//! - Resolving event types and dispatching them to one handler
//! - Extracting text from incoming messages and replying to them
//! - Logging helpdesk and bot menu events

pub mod event;
pub mod helpdesk;
pub mod message;
pub mod reply;
