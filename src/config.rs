//! Configuration for the cache, lifecycle, notification and routing policies.

use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::notification::NotificationAction;

/// Icon shown when a push payload does not name one.
pub const DEFAULT_ICON: &str = "https://cdn-icons-png.flaticon.com/512/1046/1046784.png";

/// Cache generation and the app-shell assets stored under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name of the current cache generation. Every other cache is stale.
    pub generation: String,
    /// Asset URLs fetched and stored at install time.
    pub assets: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            generation: "ktm-bakery-v1".to_string(),
            assets: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/manifest.json".to_string(),
            ],
        }
    }
}

/// Whether a new worker takes over immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Skip the waiting phase once install completes.
    pub skip_waiting: bool,
    /// Take control of open windows once activation completes.
    pub claim_clients: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            skip_waiting: true,
            claim_clients: true,
        }
    }
}

/// Defaults and fixed fields for displayed notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Title used when the payload has none.
    pub default_title: String,
    /// Body used when the payload has none.
    pub default_body: String,
    /// Icon URL used when the payload has none.
    pub default_icon: String,
    /// Badge URL used when the payload has none.
    pub default_badge: String,
    /// Replacement key shared by every notification.
    pub tag: String,
    /// Vibration pattern in milliseconds.
    pub vibrate: Vec<u32>,
    /// Keep the notification on screen until the user acts on it.
    pub require_interaction: bool,
    /// Action buttons offered on every notification.
    pub actions: Vec<NotificationAction>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_title: "KTM Bakery".to_string(),
            default_body: "New order received!".to_string(),
            default_icon: DEFAULT_ICON.to_string(),
            default_badge: DEFAULT_ICON.to_string(),
            tag: "ktm-order".to_string(),
            vibrate: vec![200, 100, 200, 100, 200],
            require_interaction: true,
            actions: vec![
                NotificationAction::new("view", "View Order"),
                NotificationAction::new("dismiss", "Dismiss"),
            ],
        }
    }
}

/// In-app locations that notification clicks navigate to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Origin the app is served from.
    pub origin: String,
    /// Location opened by a bare click on the notification body.
    pub root: String,
    /// Location opened by the view and complete actions.
    pub orders: String,
    /// Navigate a focused window to the orders location.
    pub navigate_focused: bool,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".to_string(),
            root: "/".to_string(),
            orders: "/#orders".to_string(),
            navigate_focused: true,
        }
    }
}

impl RoutesConfig {
    /// Parses the configured origin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the origin is not an absolute URL.
    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&self.origin).map_err(|e| Error::InvalidUrl {
            url: self.origin.clone(),
            reason: e.to_string(),
        })
    }
}

/// Everything the worker needs, immutable once the worker is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Cache generation and asset list.
    pub cache: CacheConfig,
    /// Activation policy.
    pub lifecycle: LifecycleConfig,
    /// Notification defaults.
    pub notification: NotificationConfig,
    /// Click navigation targets.
    pub routes: RoutesConfig,
}

impl GatewayConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cache generation tag.
    #[must_use]
    pub fn with_generation(mut self, generation: impl Into<String>) -> Self {
        self.cache.generation = generation.into();
        self
    }

    /// Sets the app-shell asset list.
    #[must_use]
    pub fn with_assets<I, S>(mut self, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cache.assets = assets.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the app origin.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.routes.origin = origin.into();
        self
    }

    /// Sets whether install skips the waiting phase.
    #[must_use]
    pub const fn with_skip_waiting(mut self, skip: bool) -> Self {
        self.lifecycle.skip_waiting = skip;
        self
    }

    /// Sets whether activation claims open windows.
    #[must_use]
    pub const fn with_claim_clients(mut self, claim: bool) -> Self {
        self.lifecycle.claim_clients = claim;
        self
    }
}

/// Dev harness bind address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9730,
        }
    }
}

/// Complete application configuration: the worker plus the dev harness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Worker configuration.
    #[serde(flatten)]
    pub gateway: GatewayConfig,
    /// Dev harness configuration.
    pub server: ServerConfig,
}

impl AppConfig {
    /// Returns the default config file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ktm-bakery-sw")
            .join("config.toml")
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text is not valid configuration.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_gateway_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.cache.generation, "ktm-bakery-v1");
        assert_eq!(config.cache.assets, ["/", "/index.html", "/manifest.json"]);
        assert!(config.lifecycle.skip_waiting);
        assert!(config.lifecycle.claim_clients);
        assert_eq!(config.notification.tag, "ktm-order");
        assert_eq!(config.notification.vibrate, [200, 100, 200, 100, 200]);
        assert_eq!(config.routes.orders, "/#orders");
    }

    #[test]
    fn builder_pattern() {
        let config = GatewayConfig::new()
            .with_generation("ktm-bakery-v2")
            .with_assets(["/", "/app.js"])
            .with_origin("https://bakery.example")
            .with_skip_waiting(false)
            .with_claim_clients(false);

        assert_eq!(config.cache.generation, "ktm-bakery-v2");
        assert_eq!(config.cache.assets, ["/", "/app.js"]);
        assert_eq!(config.routes.origin, "https://bakery.example");
        assert!(!config.lifecycle.skip_waiting);
        assert!(!config.lifecycle.claim_clients);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [cache]
            generation = "ktm-bakery-v3"

            [notification]
            default_title = "K.T.M Bakery"

            [server]
            port = 8000
            "#,
        )
        .unwrap();

        assert_eq!(config.gateway.cache.generation, "ktm-bakery-v3");
        assert_eq!(config.gateway.cache.assets.len(), 3);
        assert_eq!(config.gateway.notification.default_title, "K.T.M Bakery");
        assert_eq!(config.gateway.notification.default_body, "New order received!");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn config_serializes_to_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized = AppConfig::from_toml(&toml_str).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[routes]\norigin = \"https://ktm.example\"").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.gateway.routes.origin, "https://ktm.example");
    }

    #[test]
    fn load_rejects_malformed_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cache\ngeneration = ").unwrap();

        assert!(matches!(AppConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn origin_url_rejects_relative() {
        let routes = RoutesConfig {
            origin: "/not-absolute".to_string(),
            ..RoutesConfig::default()
        };
        assert!(matches!(routes.origin_url(), Err(Error::InvalidUrl { .. })));
    }

    #[test]
    fn default_path_is_namespaced() {
        let path = AppConfig::default_path();
        assert!(path.to_string_lossy().contains("ktm-bakery-sw"));
        assert!(path.ends_with("config.toml"));
    }
}
