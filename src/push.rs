//! Push handling: decode an optional payload and display a notification.
//!
//! Decoding is fail-open. A missing payload, malformed JSON, or JSON of the
//! wrong shape all produce the default notification rather than nothing.
//! Fields are read independently: one field of the wrong type falls back on
//! its own and leaves the others intact.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::NotificationConfig;
use crate::notification::{Notification, NotificationData, Notifier, OrderId};

/// Fields the backend may send with a push. None are guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub url: Option<String>,
    pub order_id: Option<OrderId>,
}

impl PushPayload {
    /// Decodes push data, substituting an empty payload when it is absent
    /// or not a JSON object of the expected shape.
    #[must_use]
    pub fn parse(data: Option<&[u8]>) -> Self {
        let Some(bytes) = data.filter(|b| !b.is_empty()) else {
            log::debug!("Push has no payload, using defaults");
            return Self::default();
        };
        match serde_json::from_slice(bytes) {
            Ok(value) => Self::from_value(value),
            Err(e) => {
                log::warn!("Push payload is not valid JSON ({e}), using defaults");
                Self::default()
            }
        }
    }

    /// Decodes an already-parsed JSON value with the same fallback as [`parse`](Self::parse).
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self {
                title: text_field(&fields, "title"),
                body: text_field(&fields, "body"),
                icon: text_field(&fields, "icon"),
                badge: text_field(&fields, "badge"),
                url: text_field(&fields, "url"),
                order_id: order_id_field(&fields),
            },
            Value::Null => Self::default(),
            other => {
                log::warn!("Payload is not a JSON object ({other}), using defaults");
                Self::default()
            }
        }
    }
}

fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => {
            log::warn!("Ignoring push field {key:?} with unexpected value {other}");
            None
        }
    }
}

fn order_id_field(fields: &Map<String, Value>) -> Option<OrderId> {
    match fields.get("orderId")? {
        Value::Number(n) => Some(OrderId::Number(n.clone())),
        Value::String(s) => Some(OrderId::Text(s.clone())),
        Value::Null => None,
        other => {
            log::warn!("Ignoring push field \"orderId\" with unexpected value {other}");
            None
        }
    }
}

/// Treats an empty string the same as a missing field.
fn or_default(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Turns push deliveries into displayed notifications.
pub struct PushHandler {
    notifier: Arc<dyn Notifier>,
    config: NotificationConfig,
}

impl PushHandler {
    /// Creates a push handler.
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, config: NotificationConfig) -> Self {
        Self { notifier, config }
    }

    /// Derives the notification for a decoded payload.
    #[must_use]
    pub fn build(&self, payload: PushPayload) -> Notification {
        let cfg = &self.config;
        Notification {
            title: or_default(payload.title, &cfg.default_title),
            body: or_default(payload.body, &cfg.default_body),
            icon: or_default(payload.icon, &cfg.default_icon),
            badge: or_default(payload.badge, &cfg.default_badge),
            vibrate: cfg.vibrate.clone(),
            tag: cfg.tag.clone(),
            require_interaction: cfg.require_interaction,
            actions: cfg.actions.clone(),
            data: NotificationData {
                url: payload.url.filter(|u| !u.is_empty()),
                order_id: payload.order_id,
                timestamp: Some(chrono::Utc::now().timestamp_millis()),
            },
        }
    }

    /// Handles a push delivery. Display failures are logged and absorbed;
    /// the notification that was requested is returned either way.
    pub async fn handle(&self, data: Option<&[u8]>) -> Notification {
        log::info!("Push notification received");
        self.display(PushPayload::parse(data)).await
    }

    /// Builds and displays the notification for a decoded payload.
    pub async fn display(&self, payload: PushPayload) -> Notification {
        let notification = self.build(payload);
        if let Err(e) = self.notifier.show(notification.clone()).await {
            log::error!("Failed to display notification {:?}: {e}", notification.title);
        }
        notification
    }
}
