//! Telegram Bot API notification transport.

use serde::Deserialize;
use serde_json::json;

use crate::config::TelegramConfig;

use super::{Notifier, NotifyError, NotifyFuture};

/// Response envelope returned by every Bot API method.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Notifier backed by the Telegram Bot API `sendMessage` method.
///
/// Messages are sent with HTML parse mode and `disable_notification` so
/// subscribers get silent updates, matching the operator expectation for
/// recurring status traffic.
#[derive(Clone, Debug)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    send_message_url: String,
}

impl TelegramNotifier {
    /// Constructs a notifier from the Telegram configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Client`] when no bot token is configured, the
    /// proxy URL is invalid, or the HTTP client cannot be built.
    pub fn new(config: &TelegramConfig) -> Result<Self, NotifyError> {
        let token = config
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| NotifyError::Client {
                message: String::from("bot token is not configured"),
            })?;

        let mut builder = reqwest::Client::builder();
        if let Some(proxy_url) = config
            .http_proxy
            .as_deref()
            .filter(|proxy| !proxy.trim().is_empty())
        {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|err| NotifyError::Client {
                message: format!("invalid proxy '{proxy_url}': {err}"),
            })?;
            builder = builder.proxy(proxy);
        }
        let http = builder.build().map_err(|err| NotifyError::Client {
            message: err.to_string(),
        })?;

        let endpoint = config.api_endpoint.trim_end_matches('/');
        Ok(Self {
            http,
            send_message_url: format!("{endpoint}/bot{token}/sendMessage"),
        })
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        let response = self
            .http
            .post(&self.send_message_url)
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_notification": true,
            }))
            .send()
            .await
            .map_err(|err| NotifyError::Transport {
                message: err.to_string(),
            })?;

        let body: ApiResponse = response.json().await.map_err(|err| NotifyError::Transport {
            message: format!("malformed Bot API response: {err}"),
        })?;
        if !body.ok {
            return Err(NotifyError::Rejected {
                description: body
                    .description
                    .unwrap_or_else(|| String::from("no description provided")),
            });
        }
        Ok(())
    }
}

impl Notifier for TelegramNotifier {
    fn send<'a>(&'a self, chat_id: i64, text: &'a str) -> NotifyFuture<'a> {
        Box::pin(self.send_message(chat_id, text))
    }
}
