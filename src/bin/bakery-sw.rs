use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use ktm_bakery_sw::{
    AppConfig, Clients, HttpNetwork, MemoryCacheStorage, MemoryClients, MemoryNotifier,
    MemoryRegistration, Notifier, Platform, ServiceWorker,
};

fn print_usage() {
    eprintln!("Usage: bakery-sw [OPTIONS]");
    eprintln!();
    eprintln!("Runs the bakery service worker behind an HTTP harness.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <PATH>     Config file (default: {})", AppConfig::default_path().display());
    eprintln!("  --host <HOST>       Harness bind address (default: 127.0.0.1)");
    eprintln!("  --port <PORT>       Harness port (default: 9730)");
    eprintln!("  --origin <URL>      App origin to fetch assets from");
    eprintln!("  -h, --help          Show this help");
}

/// Returns the value following a flag, exiting with a message if it is missing.
fn flag_value(args: &[String], i: &mut usize, flag: &str) -> String {
    *i += 1;
    if let Some(value) = args.get(*i) {
        value.clone()
    } else {
        eprintln!("Error: {flag} requires a value");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn main() -> ktm_bakery_sw::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let mut config_path = AppConfig::default_path();
    let mut host = None;
    let mut port = None;
    let mut origin = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "--config" => config_path = PathBuf::from(flag_value(&args, &mut i, "--config")),
            "--host" => host = Some(flag_value(&args, &mut i, "--host")),
            "--port" => {
                let value = flag_value(&args, &mut i, "--port");
                if let Ok(p) = value.parse() {
                    port = Some(p);
                } else {
                    eprintln!("Error: invalid port {value:?}");
                    std::process::exit(1);
                }
            }
            "--origin" => origin = Some(flag_value(&args, &mut i, "--origin")),
            other => {
                eprintln!("Error: unknown argument {other:?}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut config = AppConfig::load(&config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(origin) = origin {
        config.gateway.routes.origin = origin;
    }
    log::info!(
        "Cache generation {} for origin {}",
        config.gateway.cache.generation,
        config.gateway.routes.origin
    );

    let notifier = Arc::new(MemoryNotifier::new());
    let clients = Arc::new(MemoryClients::new());
    let platform = Platform {
        caches: Arc::new(MemoryCacheStorage::new()),
        network: Arc::new(HttpNetwork::new(&config.gateway.routes.origin)?),
        notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
        clients: Arc::clone(&clients) as Arc<dyn Clients>,
        registration: Arc::new(MemoryRegistration::new()),
    };
    let worker = Arc::new(ServiceWorker::new(config.gateway, platform)?);

    // An unreachable origin leaves the worker redundant; the harness still
    // serves so the failure can be inspected through /api/state.
    match worker.install().await {
        Ok(_) => {
            if let Err(e) = worker.activate().await {
                log::error!("Activation failed: {e}");
            }
        }
        Err(e) => log::error!("Install failed: {e}"),
    }

    serve(worker, notifier, clients, &config.server.host, config.server.port).await
}

#[cfg(feature = "server")]
async fn serve(
    worker: Arc<ServiceWorker>,
    notifier: Arc<MemoryNotifier>,
    clients: Arc<MemoryClients>,
    host: &str,
    port: u16,
) -> ktm_bakery_sw::Result<()> {
    use ktm_bakery_sw::api::{ApiState, run_api_server};
    use tokio_util::sync::CancellationToken;

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Received SIGINT");
        }
        on_signal.cancel();
    });

    let state = ApiState {
        worker,
        notifier,
        clients,
    };
    run_api_server(state, host, port, shutdown)
        .await
        .map_err(|e| ktm_bakery_sw::Error::Io(std::io::Error::other(e)))
}

#[cfg(not(feature = "server"))]
async fn serve(
    _worker: Arc<ServiceWorker>,
    _notifier: Arc<MemoryNotifier>,
    _clients: Arc<MemoryClients>,
    _host: &str,
    _port: u16,
) -> ktm_bakery_sw::Result<()> {
    eprintln!("Harness support not compiled in");
    std::process::exit(1);
}
