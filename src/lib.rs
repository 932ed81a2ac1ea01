//! ktm-bakery-sw - Notification and cache gateway for the KTM Bakery ordering app.
//!
//! This library implements the behaviour of the app's service worker against
//! abstract platform services, so it can be driven by a real host or by the
//! bundled HTTP harness:
//!
//! - **Cache manager**: pre-caches the app shell on install, deletes stale
//!   cache generations on activate, answers fetches cache-first.
//! - **Push handler**: turns an optional JSON push payload into a displayed
//!   notification, falling back to defaults.
//! - **Click router**: closes a clicked notification and focuses or opens an
//!   app window.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ktm_bakery_sw::{GatewayConfig, HttpNetwork, Platform, ServiceWorker, WorkerEvent};
//!
//! # async fn example() -> ktm_bakery_sw::Result<()> {
//! let config = GatewayConfig::default().with_origin("https://bakery.example");
//! let network = Arc::new(HttpNetwork::new(&config.routes.origin)?);
//! let worker = ServiceWorker::new(config, Platform::in_memory(network))?;
//!
//! worker.dispatch(WorkerEvent::Install).await?;
//! worker.dispatch(WorkerEvent::Activate).await?;
//! worker.dispatch(WorkerEvent::Push(None)).await?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

#[cfg(feature = "server")]
pub mod api;
pub mod cache;
pub mod click;
pub mod clients;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod message;
pub mod notification;
pub mod push;
pub mod worker;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use cache::{CacheManager, CacheStorage, MemoryCacheStorage};
pub use click::{ClickAction, ClickOutcome, ClickRouter, NotificationClick};
pub use clients::{ClientCall, Clients, MemoryClients, WindowClient};
pub use config::{AppConfig, GatewayConfig};
pub use error::{Error, Result};
pub use http::{HttpNetwork, Network, Request, Response};
pub use lifecycle::{MemoryRegistration, Registration, WorkerState};
pub use message::WorkerMessage;
pub use notification::{MemoryNotifier, Notification, NotificationData, Notifier, OrderId};
pub use push::{PushHandler, PushPayload};
pub use worker::{EventOutcome, Platform, ServiceWorker, WorkerEvent};
