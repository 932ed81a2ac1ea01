//! The service worker: binds each inbound event to its handler.
//!
//! Every platform operation a handler depends on is awaited before the
//! handler returns, so the event is not considered handled until its work
//! is done. Skip-waiting and client claiming are the only best-effort
//! operations: their failures are logged and the event still succeeds.

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use serde::Serialize;

use crate::cache::{CacheManager, CacheStorage, MemoryCacheStorage};
use crate::click::{ClickOutcome, ClickRouter, NotificationClick};
use crate::clients::{Clients, MemoryClients};
use crate::config::{GatewayConfig, LifecycleConfig};
use crate::error::{Error, Result};
use crate::http::{Network, Request, Response};
use crate::lifecycle::{MemoryRegistration, Registration, WorkerState};
use crate::message::WorkerMessage;
use crate::notification::{MemoryNotifier, Notification, Notifier};
use crate::push::{PushHandler, PushPayload};

/// The platform services the worker calls into.
#[derive(Clone)]
pub struct Platform {
    pub caches: Arc<dyn CacheStorage>,
    pub network: Arc<dyn Network>,
    pub notifier: Arc<dyn Notifier>,
    pub clients: Arc<dyn Clients>,
    pub registration: Arc<dyn Registration>,
}

impl Platform {
    /// Uses the given network with in-memory implementations of everything else.
    #[must_use]
    pub fn in_memory(network: Arc<dyn Network>) -> Self {
        Self {
            caches: Arc::new(MemoryCacheStorage::new()),
            network,
            notifier: Arc::new(MemoryNotifier::new()),
            clients: Arc::new(MemoryClients::new()),
            registration: Arc::new(MemoryRegistration::new()),
        }
    }
}

/// An event dispatched to the worker by the platform.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    /// Push delivery with its optional payload.
    Push(Option<Bytes>),
    NotificationClick(NotificationClick),
    /// A message posted from a page.
    Message(serde_json::Value),
}

/// What handling an event produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Number of assets cached.
    Installed(usize),
    /// Names of the stale caches deleted.
    Activated(Vec<String>),
    Response(Response),
    /// The notification that was requested.
    Notified(Notification),
    Clicked(ClickOutcome),
    /// The recognised message, if any.
    Message(Option<WorkerMessage>),
}

/// Snapshot of the worker for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub state: WorkerState,
    pub generation: String,
}

/// The notification and cache gateway.
pub struct ServiceWorker {
    state: Mutex<WorkerState>,
    cache: CacheManager,
    push: PushHandler,
    router: ClickRouter,
    network: Arc<dyn Network>,
    clients: Arc<dyn Clients>,
    registration: Arc<dyn Registration>,
    lifecycle: LifecycleConfig,
}

impl ServiceWorker {
    /// Builds a worker from its configuration and platform services.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the configured origin is not absolute.
    pub fn new(config: GatewayConfig, platform: Platform) -> Result<Self> {
        let origin = config.routes.origin_url()?;
        let router = ClickRouter::new(
            Arc::clone(&platform.notifier),
            Arc::clone(&platform.clients),
            config.routes,
        )?;
        Ok(Self {
            state: Mutex::new(WorkerState::Parsed),
            cache: CacheManager::new(
                platform.caches,
                Arc::clone(&platform.network),
                config.cache,
                origin,
            ),
            push: PushHandler::new(platform.notifier, config.notification),
            router,
            network: platform.network,
            clients: platform.clients,
            registration: platform.registration,
            lifecycle: config.lifecycle,
        })
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a diagnostic snapshot.
    #[must_use]
    pub fn status(&self) -> WorkerStatus {
        WorkerStatus {
            state: self.state(),
            generation: self.cache.generation().to_string(),
        }
    }

    fn transition(&self, next: WorkerState) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.can_transition_to(next) {
            return Err(Error::InvalidState {
                from: *state,
                to: next,
            });
        }
        log::debug!("Worker state {:?} -> {next:?}", *state);
        *state = next;
        Ok(())
    }

    /// Routes an event to its handler.
    ///
    /// # Errors
    ///
    /// Returns the handler's error. Push events never fail.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome> {
        match event {
            WorkerEvent::Install => self.install().await.map(EventOutcome::Installed),
            WorkerEvent::Activate => self.activate().await.map(EventOutcome::Activated),
            WorkerEvent::Fetch(request) => self.fetch(&request).await.map(EventOutcome::Response),
            WorkerEvent::Push(data) => Ok(EventOutcome::Notified(self.push(data.as_deref()).await)),
            WorkerEvent::NotificationClick(click) => self
                .notification_click(&click)
                .await
                .map(EventOutcome::Clicked),
            WorkerEvent::Message(value) => self.message(&value).await.map(EventOutcome::Message),
        }
    }

    /// Install: cache the app shell, then optionally skip waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if an asset cannot be cached; the worker becomes
    /// redundant and nothing is committed.
    pub async fn install(&self) -> Result<usize> {
        self.transition(WorkerState::Installing)?;
        log::info!("Service worker installing");

        let count = match self.cache.install().await {
            Ok(count) => count,
            Err(e) => {
                log::error!("Install failed: {e}");
                self.transition(WorkerState::Redundant)?;
                return Err(e);
            }
        };
        self.transition(WorkerState::Installed)?;
        log::info!("Service worker installed");

        if self.lifecycle.skip_waiting {
            self.skip_waiting().await;
        }
        Ok(count)
    }

    /// Activate: delete stale caches, then optionally claim open windows.
    ///
    /// # Errors
    ///
    /// Returns an error if stale caches cannot be cleaned up; the worker
    /// returns to `Installed` so activation can be retried.
    pub async fn activate(&self) -> Result<Vec<String>> {
        self.transition(WorkerState::Activating)?;

        let deleted = match self.cache.activate().await {
            Ok(deleted) => deleted,
            Err(e) => {
                log::error!("Activation failed: {e}");
                self.transition(WorkerState::Installed)?;
                return Err(e);
            }
        };
        self.transition(WorkerState::Activated)?;
        log::info!("Service worker activated");

        if self.lifecycle.claim_clients
            && let Err(e) = self.clients.claim().await
        {
            log::warn!("Failed to claim clients: {e}");
        }
        Ok(deleted)
    }

    /// Fetch: answered from the cache once active, straight from the network before that.
    ///
    /// # Errors
    ///
    /// Returns the network error on a cache miss that cannot be fetched.
    pub async fn fetch(&self, request: &Request) -> Result<Response> {
        if self.state().is_active() {
            self.cache.fetch(request).await
        } else {
            self.network.fetch(request).await
        }
    }

    /// Push: always results in a display request.
    pub async fn push(&self, data: Option<&[u8]>) -> Notification {
        self.push.handle(data).await
    }

    /// Notification click: close it and route to a window.
    ///
    /// # Errors
    ///
    /// Returns an error if the window focus/open request fails.
    pub async fn notification_click(&self, click: &NotificationClick) -> Result<ClickOutcome> {
        self.router.handle(click).await
    }

    /// Message: handles `SKIP_WAITING` and `TEST_NOTIFICATION`, ignores the rest.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` keeps the handler signature uniform.
    pub async fn message(&self, value: &serde_json::Value) -> Result<Option<WorkerMessage>> {
        log::info!("Service worker received message: {value}");
        let message = WorkerMessage::parse(value);
        match &message {
            Some(WorkerMessage::SkipWaiting) => self.skip_waiting().await,
            Some(WorkerMessage::TestNotification { payload }) => {
                self.push
                    .display(PushPayload::from_value(payload.clone()))
                    .await;
            }
            None => {}
        }
        Ok(message)
    }

    async fn skip_waiting(&self) {
        if let Err(e) = self.registration.skip_waiting().await {
            log::warn!("Failed to skip waiting: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientCall;
    use crate::testing::StubNetwork;
    use serde_json::json;

    struct Harness {
        worker: ServiceWorker,
        caches: Arc<MemoryCacheStorage>,
        network: Arc<StubNetwork>,
        notifier: Arc<MemoryNotifier>,
        clients: Arc<MemoryClients>,
        registration: Arc<MemoryRegistration>,
    }

    fn shell() -> StubNetwork {
        StubNetwork::new()
            .with_page("/", "<html>root</html>")
            .with_page("/index.html", "<html>index</html>")
            .with_page("/manifest.json", "{}")
    }

    fn harness_with(config: GatewayConfig, network: StubNetwork) -> Harness {
        let caches = Arc::new(MemoryCacheStorage::new());
        let network = Arc::new(network);
        let notifier = Arc::new(MemoryNotifier::new());
        let clients = Arc::new(MemoryClients::new());
        let registration = Arc::new(MemoryRegistration::new());
        let platform = Platform {
            caches: Arc::clone(&caches) as Arc<dyn CacheStorage>,
            network: Arc::clone(&network) as Arc<dyn Network>,
            notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
            clients: Arc::clone(&clients) as Arc<dyn Clients>,
            registration: Arc::clone(&registration) as Arc<dyn Registration>,
        };
        Harness {
            worker: ServiceWorker::new(config, platform).unwrap(),
            caches,
            network,
            notifier,
            clients,
            registration,
        }
    }

    fn harness() -> Harness {
        harness_with(GatewayConfig::default(), shell())
    }

    #[tokio::test]
    async fn install_then_activate() {
        let h = harness();
        h.caches
            .put_all("ktm-bakery-v0", vec![(Request::get("/"), Response::new(200))])
            .await
            .unwrap();

        let installed = h.worker.dispatch(WorkerEvent::Install).await.unwrap();
        assert_eq!(installed, EventOutcome::Installed(3));
        assert_eq!(h.worker.state(), WorkerState::Installed);
        assert!(h.registration.skipped_waiting());

        let activated = h.worker.dispatch(WorkerEvent::Activate).await.unwrap();
        assert_eq!(
            activated,
            EventOutcome::Activated(vec!["ktm-bakery-v0".to_string()])
        );
        assert_eq!(h.worker.state(), WorkerState::Activated);
        assert_eq!(h.caches.keys().await.unwrap(), ["ktm-bakery-v1"]);
        assert!(h.clients.claimed());
    }

    #[tokio::test]
    async fn lifecycle_shortcuts_can_be_disabled() {
        let config = GatewayConfig::default()
            .with_skip_waiting(false)
            .with_claim_clients(false);
        let h = harness_with(config, shell());

        h.worker.install().await.unwrap();
        h.worker.activate().await.unwrap();

        assert!(!h.registration.skipped_waiting());
        assert!(!h.clients.claimed());
    }

    #[tokio::test]
    async fn failed_install_makes_worker_redundant() {
        let h = harness_with(GatewayConfig::default(), StubNetwork::new().with_page("/", "root"));

        assert!(matches!(
            h.worker.install().await,
            Err(Error::AssetFetch { .. })
        ));
        assert_eq!(h.worker.state(), WorkerState::Redundant);
        assert!(h.caches.keys().await.unwrap().is_empty());
        assert!(!h.registration.skipped_waiting());
        assert!(matches!(
            h.worker.activate().await,
            Err(Error::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn activate_before_install_is_rejected() {
        let h = harness();
        let err = h.worker.activate().await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                from: WorkerState::Parsed,
                to: WorkerState::Activating
            }
        ));
    }

    #[tokio::test]
    async fn fetch_before_activation_goes_to_network() {
        let h = harness();
        h.worker.install().await.unwrap();
        let before = h.network.calls().len();

        h.worker.fetch(&Request::get("/index.html")).await.unwrap();

        assert_eq!(h.network.calls().len(), before + 1);
    }

    #[tokio::test]
    async fn fetch_after_activation_uses_cache() {
        let h = harness();
        h.worker.install().await.unwrap();
        h.worker.activate().await.unwrap();
        let before = h.network.calls().len();

        let outcome = h
            .worker
            .dispatch(WorkerEvent::Fetch(Request::get("/")))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            EventOutcome::Response(Response::new(200).with_body("<html>root</html>"))
        );
        assert_eq!(h.network.calls().len(), before);
    }

    #[tokio::test]
    async fn absolute_page_request_is_served_offline() {
        let h = harness();
        h.worker.install().await.unwrap();
        h.worker.activate().await.unwrap();
        let before = h.network.calls().len();

        let response = h
            .worker
            .fetch(&Request::get("http://localhost:8080/index.html"))
            .await
            .unwrap();

        assert_eq!(response.body.as_ref(), b"<html>index</html>");
        assert_eq!(h.network.calls().len(), before);
    }

    #[tokio::test]
    async fn push_order_end_to_end() {
        let h = harness();
        let data = Bytes::from_static(br#"{"title":"Order #42","body":"2x croissant","orderId":42}"#);

        let outcome = h.worker.dispatch(WorkerEvent::Push(Some(data))).await.unwrap();

        let EventOutcome::Notified(shown) = outcome else {
            panic!("expected a notification");
        };
        assert_eq!(shown.title, "Order #42");
        assert_eq!(shown.body, "2x croissant");
        assert_eq!(shown.tag, "ktm-order");
        assert_eq!(
            serde_json::to_value(&shown.data).unwrap()["orderId"],
            json!(42)
        );
        assert_eq!(h.notifier.displayed().len(), 1);
    }

    #[tokio::test]
    async fn push_without_payload_end_to_end() {
        let h = harness();

        h.worker.dispatch(WorkerEvent::Push(None)).await.unwrap();

        let shown = h.notifier.displayed();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "KTM Bakery");
        assert_eq!(shown[0].body, "New order received!");
    }

    #[tokio::test]
    async fn repeated_pushes_replace_by_tag() {
        let h = harness();
        h.worker.push(Some(br#"{"title":"Order #1"}"#.as_slice())).await;
        h.worker.push(Some(br#"{"title":"Order #2"}"#.as_slice())).await;

        let shown = h.notifier.displayed();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "Order #2");
    }

    #[tokio::test]
    async fn push_then_view_click_opens_orders() {
        let h = harness();
        let shown = h.worker.push(None).await;

        let click = NotificationClick {
            action: "view".to_string(),
            tag: shown.tag.clone(),
            data: shown.data,
        };
        let outcome = h
            .worker
            .dispatch(WorkerEvent::NotificationClick(click))
            .await
            .unwrap();

        assert!(matches!(outcome, EventOutcome::Clicked(ClickOutcome::Opened { .. })));
        assert!(h.notifier.displayed().is_empty());
        assert_eq!(
            h.clients.calls(),
            [ClientCall::Open {
                url: "http://localhost:8080/#orders".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn skip_waiting_message() {
        let config = GatewayConfig::default().with_skip_waiting(false);
        let h = harness_with(config, shell());

        let outcome = h
            .worker
            .dispatch(WorkerEvent::Message(json!({"type": "SKIP_WAITING"})))
            .await
            .unwrap();

        assert_eq!(outcome, EventOutcome::Message(Some(WorkerMessage::SkipWaiting)));
        assert!(h.registration.skipped_waiting());
    }

    #[tokio::test]
    async fn test_notification_message() {
        let h = harness();

        h.worker
            .message(&json!({"type": "TEST_NOTIFICATION", "payload": {"body": "Test order"}}))
            .await
            .unwrap();

        let shown = h.notifier.displayed();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "KTM Bakery");
        assert_eq!(shown[0].body, "Test order");
    }

    #[tokio::test]
    async fn unknown_message_is_ignored() {
        let h = harness();

        let outcome = h.worker.message(&json!({"type": "PING"})).await.unwrap();

        assert_eq!(outcome, None);
        assert!(h.notifier.displayed().is_empty());
        assert!(!h.registration.skipped_waiting());
    }

    #[test]
    fn status_reports_generation() {
        let h = harness();
        let status = h.worker.status();
        assert_eq!(status.state, WorkerState::Parsed);
        assert_eq!(status.generation, "ktm-bakery-v1");
    }
}
