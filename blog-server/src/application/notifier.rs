use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::subscriber_registry::SubscriberRegistry;
use crate::domain::error::ChannelError;
use crate::domain::post::{Post, PostChanges};
use crate::domain::subscriber::Subscription;

pub const SUBSCRIBED_REPLY: &str = "You are now subscribed to notifications.";
pub const ALREADY_SUBSCRIBED_REPLY: &str = "You are already subscribed.";

const POLL_BACKOFF: Duration = Duration::from_secs(1);
/// Visible characters of post body quoted in a message; the Bot API caps a message at 4096.
const BODY_EXCERPT_CHARS: usize = 3500;

/// Outbound message channel. Text is HTML-formatted.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, recipient_id: i64, text: &str) -> Result<(), ChannelError>;

    /// Waits for the next batch of subscription signals and returns their recipient ids.
    async fn poll_subscriptions(&self) -> Result<Vec<i64>, ChannelError>;
}

/// Fans post lifecycle events out to every registered recipient.
///
/// Without a channel every call is a no-op. Delivery failures are logged per
/// recipient and never reach the caller.
pub struct Notifier {
    channel: Option<Arc<dyn NotificationChannel>>,
    registry: Arc<SubscriberRegistry>,
}

impl Notifier {
    pub fn disabled(registry: Arc<SubscriberRegistry>) -> Self {
        Self {
            channel: None,
            registry,
        }
    }

    /// Loads the registry and enables delivery through `channel`.
    /// Falls back to a disabled notifier if the registry cannot be loaded.
    pub async fn activate(
        channel: Arc<dyn NotificationChannel>,
        registry: Arc<SubscriberRegistry>,
    ) -> Self {
        if let Err(e) = registry.load().await {
            error!(error = %e, "failed to load subscribers, notifications disabled");
            return Self::disabled(registry);
        }
        info!("notification channel ready");
        Self {
            channel: Some(channel),
            registry,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.channel.is_some()
    }

    pub async fn notify_post_created(&self, post: &Post) {
        self.broadcast(&created_message(post)).await;
    }

    pub async fn notify_post_updated(&self, id: i64, changes: &PostChanges) {
        self.broadcast(&updated_message(id, changes)).await;
    }

    pub async fn notify_post_deleted(&self, id: i64) {
        self.broadcast(&deleted_message(id)).await;
    }

    pub async fn broadcast(&self, message: &str) {
        let Some(channel) = &self.channel else {
            return;
        };
        let recipients = self.registry.recipients().await;
        let deliveries = recipients.iter().map(|&recipient_id| {
            let channel = Arc::clone(channel);
            async move {
                let result = channel.send(recipient_id, message).await;
                if let Err(e) = &result {
                    error!(recipient_id, error = %e, "failed to deliver notification");
                }
                result.is_ok()
            }
        });
        let delivered = join_all(deliveries).await.into_iter().filter(|ok| *ok).count();
        info!(delivered, recipients = recipients.len(), "notification broadcast");
    }

    /// Handles one subscription signal and acknowledges it to the sender.
    pub async fn handle_subscription(&self, recipient_id: i64) {
        let Some(channel) = &self.channel else {
            return;
        };
        let reply = match self.registry.subscribe(recipient_id).await {
            Ok(Subscription::Created) => SUBSCRIBED_REPLY,
            Ok(Subscription::AlreadySubscribed) => ALREADY_SUBSCRIBED_REPLY,
            Err(e) => {
                error!(recipient_id, error = %e, "failed to record subscription");
                return;
            }
        };
        if let Err(e) = channel.send(recipient_id, reply).await {
            warn!(recipient_id, error = %e, "failed to acknowledge subscription");
        }
    }

    /// Starts consuming subscription signals in the background. `None` when disabled.
    pub fn spawn_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let channel = self.channel.clone()?;
        let notifier = Arc::clone(self);
        Some(tokio::spawn(async move {
            loop {
                match channel.poll_subscriptions().await {
                    Ok(recipients) => {
                        for recipient_id in recipients {
                            notifier.handle_subscription(recipient_id).await;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "polling for subscriptions failed");
                        tokio::time::sleep(POLL_BACKOFF).await;
                    }
                }
            }
        }))
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Escapes at most `limit` characters of `text`, marking a cut with an ellipsis.
fn excerpt(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}…", escape_html(&text[..cut])),
        None => escape_html(text),
    }
}

fn created_message(post: &Post) -> String {
    format!(
        "📝 <b>New post created</b>\n\n<b>ID:</b> {}\n<b>Title:</b> {}\n<b>Body:</b>\n{}",
        post.id,
        escape_html(&post.title),
        excerpt(&post.body, BODY_EXCERPT_CHARS)
    )
}

fn updated_message(id: i64, changes: &PostChanges) -> String {
    let mut message = format!("✏️ <b>Post updated</b>\n\n<b>ID:</b> {id}");
    if let Some(title) = &changes.title {
        message.push_str(&format!("\n<b>New title:</b> {}", escape_html(title)));
    }
    if let Some(body) = &changes.body {
        message.push_str(&format!(
            "\n<b>New body:</b>\n{}",
            excerpt(body, BODY_EXCERPT_CHARS)
        ));
    }
    message
}

fn deleted_message(id: i64) -> String {
    format!("🗑️ <b>Post deleted</b>\n\n<b>ID:</b> {id}")
}
