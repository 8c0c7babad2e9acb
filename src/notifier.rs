use serde::Serialize;
use std::cell::RefCell;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::tracker::Notification;

/// Receives composed notifications from a log session.
///
/// Implementations must not block the line-processing loop.
pub trait NotificationSink {
    fn submit(&self, notification: Notification);
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("wrong webhook URL: {0}")]
    InvalidUrl(String),

    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook responded with status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Queues notifications onto a bounded channel drained by a delivery task
/// that posts them to a Discord-style webhook.
#[derive(Debug)]
pub struct WebhookDispatcher {
    sender: Option<mpsc::Sender<Notification>>,
    handle: Option<JoinHandle<()>>,
}

impl WebhookDispatcher {
    /// Starts the delivery task. Must be called from within a tokio runtime.
    ///
    /// Without a URL no task is started and every submission is skipped.
    pub fn spawn(webhook_url: Option<String>, queue_capacity: usize) -> Self {
        let Some(webhook_url) = webhook_url else {
            tracing::info!("No webhook URL configured in settings; notifications will not be sent");
            return Self {
                sender: None,
                handle: None,
            };
        };

        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let handle = tokio::spawn(run_delivery_loop(
            reqwest::Client::new(),
            webhook_url,
            receiver,
        ));

        Self {
            sender: Some(sender),
            handle: Some(handle),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.sender.is_some()
    }

    /// Queues every notification, waiting for room instead of dropping.
    /// Returns how many were queued.
    pub async fn deliver_all(&self, notifications: Vec<Notification>) -> usize {
        let Some(sender) = self.sender.as_ref() else {
            tracing::info!(
                skipped = notifications.len(),
                "No webhook URL configured in settings; skipping notifications"
            );
            return 0;
        };

        let mut queued = 0;
        for notification in notifications {
            if let Err(error) = sender.send(notification).await {
                tracing::warn!(
                    creature = %error.0.creature,
                    "Webhook delivery task stopped; dropping remaining notifications"
                );
                break;
            }
            queued += 1;
        }

        queued
    }

    /// Closes the queue and waits for already queued notifications to be sent.
    pub async fn shutdown(mut self) {
        self.sender.take();

        if let Some(handle) = self.handle.take() {
            if let Err(error) = handle.await {
                tracing::error!(join_error = %error, "Webhook delivery task ended abnormally");
            }
        }
    }
}

impl NotificationSink for WebhookDispatcher {
    fn submit(&self, notification: Notification) {
        let Some(sender) = self.sender.as_ref() else {
            tracing::info!(
                creature = %notification.creature,
                "No webhook URL configured in settings; skipping notification"
            );
            return;
        };

        match sender.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(notification)) => {
                tracing::warn!(
                    creature = %notification.creature,
                    "Webhook queue is full; dropping notification"
                );
            }
            Err(TrySendError::Closed(notification)) => {
                tracing::warn!(
                    creature = %notification.creature,
                    "Webhook delivery task stopped; dropping notification"
                );
            }
        }
    }
}

async fn run_delivery_loop(
    client: reqwest::Client,
    webhook_url: String,
    mut receiver: mpsc::Receiver<Notification>,
) {
    while let Some(notification) = receiver.recv().await {
        match deliver(&client, &webhook_url, &notification.message).await {
            Ok(()) => {
                tracing::debug!(creature = %notification.creature, "Delivered notification");
            }
            Err(error) => {
                tracing::warn!(
                    creature = %notification.creature,
                    delivery_error = %error,
                    "Failed to deliver notification"
                );
            }
        }
    }
}

async fn deliver(
    client: &reqwest::Client,
    webhook_url: &str,
    message: &str,
) -> Result<(), DeliveryError> {
    let url = parse_webhook_url(webhook_url)?;

    let response = client
        .post(url)
        .json(&WebhookPayload { content: message })
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(DeliveryError::Status(response.status()));
    }

    Ok(())
}

fn parse_webhook_url(webhook_url: &str) -> Result<reqwest::Url, DeliveryError> {
    let url = reqwest::Url::parse(webhook_url)
        .map_err(|error| DeliveryError::InvalidUrl(format!("{webhook_url}: {error}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(DeliveryError::InvalidUrl(format!(
            "{webhook_url}: unsupported scheme '{}'",
            url.scheme()
        )));
    }

    Ok(url)
}

/// Prints notifications instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl NotificationSink for StdoutSink {
    fn submit(&self, notification: Notification) {
        println!("{}", notification.message);
    }
}

/// Holds notifications until they are handed over in one batch.
#[derive(Debug, Default)]
pub struct CollectingSink {
    notifications: RefCell<Vec<Notification>>,
}

impl CollectingSink {
    pub fn into_notifications(self) -> Vec<Notification> {
        self.notifications.into_inner()
    }
}

impl NotificationSink for CollectingSink {
    fn submit(&self, notification: Notification) {
        self.notifications.borrow_mut().push(notification);
    }
}
