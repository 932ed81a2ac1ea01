//! Notification click routing.

use std::sync::Arc;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::clients::{Clients, WindowClient};
use crate::config::RoutesConfig;
use crate::error::{Error, Result};
use crate::notification::{NotificationData, Notifier};

/// What the user pressed on a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    /// The notification body, not a button.
    Body,
    View,
    Dismiss,
    /// Mark the order done.
    Complete,
    /// A button this worker does not know; routed like a body click.
    Other(String),
}

impl ClickAction {
    /// Parses the action identifier reported by the platform.
    #[must_use]
    pub fn parse(action: &str) -> Self {
        match action {
            "" => Self::Body,
            "view" => Self::View,
            "dismiss" => Self::Dismiss,
            "complete" | "mark-done" => Self::Complete,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A notification click as delivered by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationClick {
    /// Action identifier, empty for a body click.
    pub action: String,
    /// Tag of the clicked notification.
    pub tag: String,
    /// Data attached when the notification was displayed.
    pub data: NotificationData,
}

/// What the router did in response to a click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClickOutcome {
    /// The notification was closed and nothing else happened.
    Dismissed,
    /// An existing window was brought to the foreground.
    Focused { window: WindowClient },
    /// A new window was opened.
    Opened { window: WindowClient },
}

/// Turns notification clicks into window focus or open requests.
pub struct ClickRouter {
    notifier: Arc<dyn Notifier>,
    clients: Arc<dyn Clients>,
    routes: RoutesConfig,
    origin: Url,
}

impl ClickRouter {
    /// Creates a router for the configured origin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the configured origin is not absolute.
    pub fn new(
        notifier: Arc<dyn Notifier>,
        clients: Arc<dyn Clients>,
        routes: RoutesConfig,
    ) -> Result<Self> {
        let origin = routes.origin_url()?;
        Ok(Self {
            notifier,
            clients,
            routes,
            origin,
        })
    }

    /// Closes the clicked notification, then focuses or opens a window
    /// according to the action pressed.
    ///
    /// # Errors
    ///
    /// Returns an error if the window list cannot be read or the focus/open
    /// request fails.
    pub async fn handle(&self, click: &NotificationClick) -> Result<ClickOutcome> {
        log::info!("Notification clicked: {:?}", click.action);

        if let Err(e) = self.notifier.close(&click.tag).await {
            log::warn!("Failed to close notification {:?}: {e}", click.tag);
        }

        match ClickAction::parse(&click.action) {
            ClickAction::Dismiss => Ok(ClickOutcome::Dismissed),
            ClickAction::View | ClickAction::Complete => {
                let target = self.order_target(&click.data)?;
                self.focus_or_open(&target, self.routes.navigate_focused)
                    .await
            }
            ClickAction::Body => {
                let target = self.resolve(&self.routes.root)?;
                self.focus_or_open(&target, false).await
            }
            ClickAction::Other(action) => {
                log::debug!("Unknown notification action {action:?}, treating as body click");
                let target = self.resolve(&self.routes.root)?;
                self.focus_or_open(&target, false).await
            }
        }
    }

    /// The notification's own URL if it stays on this origin, else the orders view.
    fn order_target(&self, data: &NotificationData) -> Result<Url> {
        if let Some(url) = data.url.as_deref() {
            match self.resolve(url) {
                Ok(target) if target.origin() == self.origin.origin() => return Ok(target),
                Ok(target) => log::warn!("Ignoring cross-origin notification URL {target}"),
                Err(e) => log::warn!("Ignoring notification URL: {e}"),
            }
        }
        self.resolve(&self.routes.orders)
    }

    fn resolve(&self, url: &str) -> Result<Url> {
        self.origin.join(url).map_err(|e| Error::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    fn is_app_window(&self, window: &WindowClient) -> bool {
        Url::parse(&window.url).is_ok_and(|url| url.origin() == self.origin.origin())
    }

    async fn focus_or_open(&self, target: &Url, navigate: bool) -> Result<ClickOutcome> {
        let windows = self.clients.match_all().await?;

        if let Some(existing) = windows.iter().find(|w| self.is_app_window(w)) {
            let mut window = self.clients.focus(&existing.id).await?;
            if navigate && window.url != target.as_str() {
                window = self.clients.navigate(&window.id, target.as_str()).await?;
            }
            return Ok(ClickOutcome::Focused { window });
        }

        let window = self.clients.open_window(target.as_str()).await?;
        Ok(ClickOutcome::Opened { window })
    }
}
