use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::application::notifier::{NotificationChannel, Notifier};
use crate::application::subscriber_registry::SubscriberRegistry;
use crate::domain::error::ChannelError;

const API_BASE: &str = "https://api.telegram.org";
/// Value shipped in sample env files; treated the same as no token.
pub const PLACEHOLDER_TOKEN: &str = "secret";
const LONG_POLL_SECS: u64 = 30;
/// Upper bound for ordinary API calls such as `sendMessage`.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// `getUpdates` holds the connection for the poll window plus slack.
const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(LONG_POLL_SECS + 10);
const SUBSCRIBE_COMMAND: &str = "/start";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    id: i64,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

/// Telegram Bot API channel. Subscription signals are `/start` messages.
pub struct TelegramChannel {
    client: Client,
    endpoint: String,
    next_update: Mutex<i64>,
}

impl TelegramChannel {
    /// Verifies the token with `getMe` before returning a usable channel.
    pub async fn connect(token: &str) -> Result<Self, ChannelError> {
        Self::connect_to(API_BASE, token).await
    }

    pub async fn connect_to(base_url: &str, token: &str) -> Result<Self, ChannelError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(transport)?;
        let channel = Self {
            client,
            endpoint: format!("{}/bot{}", base_url.trim_end_matches('/'), token),
            next_update: Mutex::new(0),
        };

        let me: BotUser = channel.call("getMe", &serde_json::json!({})).await?;
        info!(
            bot_id = me.id,
            bot_username = me.username.as_deref().unwrap_or("unknown"),
            "telegram bot initialised"
        );
        Ok(channel)
    }

    fn request<B>(&self, method: &str, body: &B) -> RequestBuilder
    where
        B: Serialize + ?Sized,
    {
        self.client
            .post(format!("{}/{}", self.endpoint, method))
            .json(body)
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, ChannelError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        Self::execute(method, self.request(method, body)).await
    }

    async fn execute<T>(method: &str, request: RequestBuilder) -> Result<T, ChannelError>
    where
        T: DeserializeOwned,
    {
        let response: ApiResponse<T> = request
            .send()
            .await
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;

        match response {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(ChannelError::Rejected(
                description.unwrap_or_else(|| format!("{method} failed")),
            )),
        }
    }
}

// The endpoint embeds the token, so it must never reach the logs.
fn transport(e: reqwest::Error) -> ChannelError {
    ChannelError::Transport(e.without_url().to_string())
}

fn is_subscribe_command(text: &str) -> bool {
    text.split_whitespace()
        .next()
        .and_then(|cmd| cmd.split('@').next())
        == Some(SUBSCRIBE_COMMAND)
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    async fn send(&self, recipient_id: i64, text: &str) -> Result<(), ChannelError> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                &SendMessage {
                    chat_id: recipient_id,
                    text,
                    parse_mode: "HTML",
                },
            )
            .await?;
        Ok(())
    }

    async fn poll_subscriptions(&self) -> Result<Vec<i64>, ChannelError> {
        let mut next_update = self.next_update.lock().await;
        let request = self
            .request(
                "getUpdates",
                &GetUpdates {
                    offset: *next_update,
                    timeout: LONG_POLL_SECS,
                    allowed_updates: ["message"],
                },
            )
            .timeout(LONG_POLL_TIMEOUT);
        let updates: Vec<Update> = Self::execute("getUpdates", request).await?;

        let mut recipients = Vec::new();
        for update in updates {
            *next_update = (*next_update).max(update.update_id + 1);
            if let Some(message) = update.message {
                if message.text.as_deref().is_some_and(is_subscribe_command) {
                    recipients.push(message.chat.id);
                }
            }
        }
        Ok(recipients)
    }
}

/// Brings up notifications for the process lifetime.
///
/// A missing or placeholder token, or a token the API rejects, yields a
/// disabled notifier; the failure is logged and never propagated.
pub async fn start_notifier(
    token: Option<&str>,
    registry: Arc<SubscriberRegistry>,
) -> Arc<Notifier> {
    start_notifier_at(API_BASE, token, registry).await
}

pub async fn start_notifier_at(
    base_url: &str,
    token: Option<&str>,
    registry: Arc<SubscriberRegistry>,
) -> Arc<Notifier> {
    let Some(token) = token.filter(|t| *t != PLACEHOLDER_TOKEN) else {
        warn!("TELEGRAM_BOT_TOKEN is not set, notifications are disabled");
        return Arc::new(Notifier::disabled(registry));
    };

    let channel = match TelegramChannel::connect_to(base_url, token).await {
        Ok(channel) => channel,
        Err(e) => {
            error!(error = %e, "invalid token or telegram bot initialisation failed");
            return Arc::new(Notifier::disabled(registry));
        }
    };

    let notifier = Arc::new(Notifier::activate(Arc::new(channel), registry).await);
    if notifier.spawn_listener().is_some() {
        info!("telegram bot is listening for subscriptions");
    }
    notifier
}
