//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc};

use serde::Deserialize;

use super::types::Res;

/// Default platform API base URL.
fn default_base_url() -> String {
    "https://open.feishu.cn".to_string()
}

/// Default name used in `echo` replies.
fn default_bot_name() -> String {
    "飞书机器人".to_string()
}

/// Default HTTP request timeout, in seconds.
fn default_request_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

/// How the bot turns an incoming text into a reply.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    /// Echo the text back, prefixed with the bot name.
    Echo,
    /// Answer greetings and help requests, acknowledge everything else.
    #[default]
    Smart,
}

/// Configuration for the feishu-bot application.
#[derive(Debug, Clone)]
pub struct Config {
    /// The shared configuration values.
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Configuration values, read from the config file and `FEISHU_*` variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Application ID (`FEISHU_APP_ID`).
    pub app_id: String,
    /// Application secret (`FEISHU_APP_SECRET`).
    pub app_secret: String,
    /// Platform API base URL (`FEISHU_BASE_URL`).
    /// Use `https://open.larksuite.com` for Lark.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Reply mode, `echo` or `smart` (`FEISHU_REPLY_MODE`).
    #[serde(default)]
    pub reply_mode: ReplyMode,
    /// Name the bot signs `echo` replies with (`FEISHU_BOT_NAME`).
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    /// Whether helpdesk ticket events are handled (`FEISHU_HELPDESK_EVENTS`).
    #[serde(default = "default_true")]
    pub helpdesk_events: bool,
    /// Timeout for platform API calls, in seconds (`FEISHU_REQUEST_TIMEOUT_SECS`).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            base_url: default_base_url(),
            reply_mode: ReplyMode::default(),
            bot_name: default_bot_name(),
            helpdesk_events: true,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Loads the configuration from `explicit_path` (or `.hidden/config.toml`) and the environment.
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder();

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        // Environment variables win over the file.
        cfg = cfg.add_source(config::Environment::default().prefix("FEISHU"));

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    fn validate(&self) -> Res<()> {
        if self.app_id.trim().is_empty() {
            return Err(anyhow::anyhow!("App ID must not be empty (set `FEISHU_APP_ID`)."));
        }

        if self.app_secret.trim().is_empty() {
            return Err(anyhow::anyhow!("App secret must not be empty (set `FEISHU_APP_SECRET`)."));
        }

        if self.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Request timeout must be at least one second."));
        }

        Ok(())
    }
}

// Tests.
