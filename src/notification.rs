//! Notification types and the display seam.

use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An action button on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    /// Identifier reported back when the button is pressed.
    pub action: String,
    /// Button label.
    pub title: String,
}

impl NotificationAction {
    /// Creates an action button.
    #[must_use]
    pub fn new(action: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            title: title.into(),
        }
    }
}

/// Order identifier as sent by the backend, either numeric or textual.
///
/// Numbers are kept exactly as sent, including negative and fractional ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderId {
    /// Numeric id, e.g. `42`.
    Number(serde_json::Number),
    /// Textual id, e.g. `"A-42"`.
    Text(String),
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Auxiliary data attached at display time and handed back on click.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationData {
    /// In-app location the order can be viewed at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Order the notification is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    /// Unix time in milliseconds when the notification was built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// A notification display request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    /// Vibration pattern in milliseconds.
    pub vibrate: Vec<u32>,
    /// Replacement key: a new notification with the same tag replaces the old one.
    pub tag: String,
    pub require_interaction: bool,
    pub actions: Vec<NotificationAction>,
    pub data: NotificationData,
}

/// Abstraction over the platform's notification surface.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Displays a notification, replacing any shown with the same tag.
    async fn show(&self, notification: Notification) -> Result<()>;

    /// Closes the notification with the given tag, if one is shown.
    async fn close(&self, tag: &str) -> Result<()>;
}

/// In-memory notifier with tag-replacement semantics.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    shown: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    /// Creates a notifier with nothing on screen.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every notification currently on screen.
    #[must_use]
    pub fn displayed(&self) -> Vec<Notification> {
        self.shown
            .lock()
            .map(|shown| shown.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Notification>>> {
        self.shown
            .lock()
            .map_err(|_| Error::Notification("notifier lock poisoned".to_string()))
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn show(&self, notification: Notification) -> Result<()> {
        let mut shown = self.lock()?;
        shown.retain(|n| n.tag != notification.tag);
        shown.push(notification);
        Ok(())
    }

    async fn close(&self, tag: &str) -> Result<()> {
        self.lock()?.retain(|n| n.tag != tag);
        Ok(())
    }
}
