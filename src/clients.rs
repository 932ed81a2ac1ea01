//! Window clients: the open app tabs a notification click can reach.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Error, Result};

/// An open browser window controlled by (or visible to) the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowClient {
    /// Platform identifier of the window.
    pub id: String,
    /// URL the window is currently showing.
    pub url: String,
    /// Whether the window has focus.
    pub focused: bool,
}

/// Abstraction over the platform's window clients.
#[async_trait]
pub trait Clients: Send + Sync {
    /// Returns every open window in platform enumeration order, including
    /// windows not yet controlled by this worker.
    async fn match_all(&self) -> Result<Vec<WindowClient>>;

    /// Brings a window to the foreground.
    async fn focus(&self, id: &str) -> Result<WindowClient>;

    /// Navigates a window to `url`.
    async fn navigate(&self, id: &str, url: &str) -> Result<WindowClient>;

    /// Opens a new window at `url`.
    async fn open_window(&self, url: &str) -> Result<WindowClient>;

    /// Takes control of every open window without waiting for a reload.
    async fn claim(&self) -> Result<()>;
}

/// A call made against [`MemoryClients`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum ClientCall {
    Focus { id: String },
    Navigate { id: String, url: String },
    Open { url: String },
    Claim,
}

#[derive(Debug, Default)]
struct ClientsState {
    windows: Vec<WindowClient>,
    calls: Vec<ClientCall>,
    claimed: bool,
}

/// In-memory window list that records every call made against it.
#[derive(Debug, Default)]
pub struct MemoryClients {
    state: Mutex<ClientsState>,
}

impl MemoryClients {
    /// Creates a client list with no open windows.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an open, unfocused window and returns its id.
    pub fn add_window(&self, url: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        if let Ok(mut state) = self.state.lock() {
            state.windows.push(WindowClient {
                id: id.clone(),
                url: url.to_string(),
                focused: false,
            });
        }
        id
    }

    /// Returns the open windows.
    #[must_use]
    pub fn windows(&self) -> Vec<WindowClient> {
        self.state
            .lock()
            .map(|s| s.windows.clone())
            .unwrap_or_default()
    }

    /// Returns every call made so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<ClientCall> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    /// Returns true once [`Clients::claim`] has been called.
    #[must_use]
    pub fn claimed(&self) -> bool {
        self.state.lock().is_ok_and(|s| s.claimed)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ClientsState>> {
        self.state
            .lock()
            .map_err(|_| Error::Clients("clients lock poisoned".to_string()))
    }
}

#[async_trait]
impl Clients for MemoryClients {
    async fn match_all(&self) -> Result<Vec<WindowClient>> {
        Ok(self.lock()?.windows.clone())
    }

    async fn focus(&self, id: &str) -> Result<WindowClient> {
        let mut state = self.lock()?;
        state.calls.push(ClientCall::Focus { id: id.to_string() });
        if !state.windows.iter().any(|w| w.id == id) {
            return Err(Error::Clients(format!("no window with id {id}")));
        }
        for window in &mut state.windows {
            window.focused = window.id == id;
        }
        state
            .windows
            .iter()
            .find(|w| w.id == id)
            .cloned()
            .ok_or_else(|| Error::Clients(format!("no window with id {id}")))
    }

    async fn navigate(&self, id: &str, url: &str) -> Result<WindowClient> {
        let mut state = self.lock()?;
        state.calls.push(ClientCall::Navigate {
            id: id.to_string(),
            url: url.to_string(),
        });
        let window = state
            .windows
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| Error::Clients(format!("no window with id {id}")))?;
        window.url = url.to_string();
        Ok(window.clone())
    }

    async fn open_window(&self, url: &str) -> Result<WindowClient> {
        let mut state = self.lock()?;
        state.calls.push(ClientCall::Open {
            url: url.to_string(),
        });
        for window in &mut state.windows {
            window.focused = false;
        }
        let window = WindowClient {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.to_string(),
            focused: true,
        };
        state.windows.push(window.clone());
        Ok(window)
    }

    async fn claim(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.calls.push(ClientCall::Claim);
        state.claimed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn focus_moves_focus() {
        let clients = MemoryClients::new();
        let a = clients.add_window("http://localhost:8080/");
        let b = clients.add_window("http://localhost:8080/#orders");

        clients.focus(&a).await.unwrap();
        let focused = clients.focus(&b).await.unwrap();

        assert!(focused.focused);
        let windows = clients.windows();
        assert!(!windows[0].focused);
        assert!(windows[1].focused);
    }

    #[tokio::test]
    async fn focus_unknown_window_fails() {
        let clients = MemoryClients::new();
        assert!(matches!(clients.focus("nope").await, Err(Error::Clients(_))));
        assert_eq!(
            clients.calls(),
            [ClientCall::Focus {
                id: "nope".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn open_window_appends_focused() {
        let clients = MemoryClients::new();
        clients.add_window("http://localhost:8080/");

        let opened = clients.open_window("http://localhost:8080/#orders").await.unwrap();

        let windows = clients.windows();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1], opened);
        assert!(!windows[0].focused);
    }

    #[tokio::test]
    async fn navigate_updates_url() {
        let clients = MemoryClients::new();
        let id = clients.add_window("http://localhost:8080/");

        let window = clients.navigate(&id, "http://localhost:8080/#orders").await.unwrap();

        assert_eq!(window.url, "http://localhost:8080/#orders");
        assert_eq!(clients.windows()[0].url, "http://localhost:8080/#orders");
    }

    #[tokio::test]
    async fn claim_is_recorded() {
        let clients = MemoryClients::new();
        assert!(!clients.claimed());
        clients.claim().await.unwrap();
        assert!(clients.claimed());
        assert_eq!(clients.calls(), [ClientCall::Claim]);
    }
}
