//! Turns an incoming text into the text the bot answers with.

use crate::base::{
    config::{Config, ReplyMode},
    replies,
};

/// Deterministic reply generator.
#[derive(Debug, Clone)]
pub struct ReplyGenerator {
    mode: ReplyMode,
    bot_name: String,
}

impl ReplyGenerator {
    pub fn new(mode: ReplyMode, bot_name: impl Into<String>) -> Self {
        Self { mode, bot_name: bot_name.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.reply_mode, config.bot_name.clone())
    }

    pub fn generate(&self, text: &str) -> String {
        match self.mode {
            ReplyMode::Echo => replies::echo_reply(&self.bot_name, text),
            ReplyMode::Smart => {
                if replies::GREETING_KEYWORDS.contains(&text) {
                    replies::GREETING_REPLY.to_string()
                } else if replies::HELP_KEYWORDS.contains(&text) {
                    replies::HELP_REPLY.to_string()
                } else {
                    replies::acknowledge_reply(text)
                }
            }
        }
    }
}
