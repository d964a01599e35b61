//! Open platform HTTP API: tenant token, long connection endpoint, message replies.

use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, instrument};

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    service::chat::text_content,
};

/// Tokens are refreshed this long before the platform expires them.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Ping interval used until the server says otherwise.
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(120);

// Wire types.

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Deserialize)]
struct TenantTokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    expire: u64,
}

#[derive(Debug, Serialize)]
struct TenantTokenRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct EndpointRequest<'a> {
    #[serde(rename = "AppID")]
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct EndpointResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<Endpoint>,
}

/// Where to open the long connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Endpoint {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(default)]
    pub client_config: Option<ClientConfig>,
}

/// Connection parameters pushed by the server.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ClientConfig {
    /// Seconds between pings.
    #[serde(default)]
    pub ping_interval: u64,
}

impl ClientConfig {
    pub fn ping_interval(&self) -> Option<Duration> {
        (self.ping_interval > 0).then(|| Duration::from_secs(self.ping_interval))
    }
}

impl Endpoint {
    pub fn ping_interval(&self) -> Duration {
        self.client_config.and_then(|c| c.ping_interval()).unwrap_or(DEFAULT_PING_INTERVAL)
    }
}

#[derive(Debug, Serialize)]
struct ReplyRequest<'a> {
    msg_type: &'a str,
    content: String,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

// Client.

/// Thin client over the open platform HTTP API.
pub struct LarkApi {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    app_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl LarkApi {
    pub fn new(config: &Config) -> Res<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to create platform api client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_id: config.app_id.trim().to_string(),
            app_secret: config.app_secret.trim().to_string(),
            token: Mutex::new(None),
        })
    }

    /// Returns a tenant access token, fetching a new one when the cached one is about to expire.
    #[instrument(skip(self))]
    pub async fn tenant_access_token(&self) -> Res<String> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref()
            && Instant::now() < token.expires_at
        {
            return Ok(token.value.clone());
        }

        debug!("Fetching tenant access token ...");

        let response: TenantTokenResponse = self
            .http
            .post(format!("{}/open-apis/auth/v3/tenant_access_token/internal", self.base_url))
            .json(&TenantTokenRequest {
                app_id: &self.app_id,
                app_secret: &self.app_secret,
            })
            .send()
            .await
            .context("failed to request tenant access token")?
            .json()
            .await
            .context("failed to decode tenant access token response")?;

        if response.code != 0 || response.tenant_access_token.is_empty() {
            bail!("Failed to get tenant access token: code={}, msg={}", response.code, response.msg);
        }

        let lifetime = Duration::from_secs(response.expire).saturating_sub(TOKEN_EXPIRY_MARGIN);
        let value = response.tenant_access_token;

        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(value)
    }

    /// Asks the platform where to open the long connection.
    #[instrument(skip(self))]
    pub async fn ws_endpoint(&self) -> Res<Endpoint> {
        let response: EndpointResponse = self
            .http
            .post(format!("{}/callback/ws/endpoint", self.base_url))
            .header("locale", "zh")
            .json(&EndpointRequest {
                app_id: &self.app_id,
                app_secret: &self.app_secret,
            })
            .send()
            .await
            .context("failed to request long connection endpoint")?
            .json()
            .await
            .context("failed to decode long connection endpoint response")?;

        if response.code != 0 {
            bail!("Failed to get long connection endpoint: code={}, msg={}", response.code, response.msg);
        }

        response.data.filter(|d| !d.url.is_empty()).context("long connection endpoint response did not include a URL")
    }

    /// Replies to `message_id` with a `text` message.
    #[instrument(skip(self, text))]
    pub async fn reply_text(&self, message_id: &str, text: &str) -> Void {
        let token = self.tenant_access_token().await?;
        let request = ReplyRequest {
            msg_type: "text",
            content: text_content(text)?,
        };

        let response: ApiResponse = self
            .http
            .post(format!("{}/open-apis/im/v1/messages/{}/reply", self.base_url, message_id))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .context("failed to send reply request")?
            .json()
            .await
            .context("failed to decode reply response")?;

        if response.code != 0 {
            bail!("Reply rejected: code={}, msg={}", response.code, response.msg);
        }

        Ok(())
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path},
    };

    use super::*;
    use crate::base::config::ConfigInner;

    fn test_api(server: &MockServer) -> LarkApi {
        let config = Config {
            inner: Arc::new(ConfigInner {
                app_id: "cli_test".to_string(),
                app_secret: "secret".to_string(),
                base_url: server.uri(),
                ..Default::default()
            }),
        };

        LarkApi::new(&config).unwrap()
    }

    async fn mount_token(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/open-apis/auth/v3/tenant_access_token/internal"))
            .and(body_json(json!({ "app_id": "cli_test", "app_secret": "secret" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "msg": "ok",
                "tenant_access_token": "t-test",
                "expire": 7200,
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        let api = test_api(&server);

        assert_eq!(api.tenant_access_token().await.unwrap(), "t-test");
        assert_eq!(api.tenant_access_token().await.unwrap(), "t-test");
    }

    #[tokio::test]
    async fn test_token_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/open-apis/auth/v3/tenant_access_token/internal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 10003, "msg": "invalid param" })))
            .mount(&server)
            .await;

        let err = test_api(&server).tenant_access_token().await.unwrap_err();

        assert!(err.to_string().contains("10003"));
    }

    #[tokio::test]
    async fn test_reply_text_sends_escaped_content() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        let text = "line \"one\"\nline two";
        Mock::given(method("POST"))
            .and(path("/open-apis/im/v1/messages/om_1/reply"))
            .and(header("authorization", "Bearer t-test"))
            .and(body_json(json!({
                "msg_type": "text",
                "content": json!({ "text": text }).to_string(),
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "msg": "success", "data": {} })))
            .expect(1)
            .mount(&server)
            .await;

        test_api(&server).reply_text("om_1", text).await.unwrap();
    }

    #[tokio::test]
    async fn test_reply_text_reports_api_error() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/open-apis/im/v1/messages/om_gone/reply"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "code": 230011, "msg": "The message was withdrawn." })))
            .mount(&server)
            .await;

        let err = test_api(&server).reply_text("om_gone", "hi").await.unwrap_err();

        assert!(err.to_string().contains("230011"));
    }

    #[tokio::test]
    async fn test_ws_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/callback/ws/endpoint"))
            .and(body_json(json!({ "AppID": "cli_test", "AppSecret": "secret" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "msg": "ok",
                "data": {
                    "URL": "wss://example.invalid/ws?device_id=d1&service_id=42",
                    "ClientConfig": { "ReconnectCount": -1, "ReconnectInterval": 120, "ReconnectNonce": 30, "PingInterval": 90 },
                },
            })))
            .mount(&server)
            .await;

        let endpoint = test_api(&server).ws_endpoint().await.unwrap();

        assert_eq!(endpoint.url, "wss://example.invalid/ws?device_id=d1&service_id=42");
        assert_eq!(endpoint.ping_interval(), Duration::from_secs(90));
    }

    #[tokio::test]
    async fn test_ws_endpoint_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/callback/ws/endpoint"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 1000040343, "msg": "forbidden" })))
            .mount(&server)
            .await;

        assert!(test_api(&server).ws_endpoint().await.is_err());
    }
}
