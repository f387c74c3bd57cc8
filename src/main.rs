use olx_sniper::config::{Config, SeenBackendKind, SeenSettings};
use olx_sniper::health;
use olx_sniper::http::HttpClient;
use olx_sniper::notify::{Notifier, RetryPolicy};
use olx_sniper::poller::Poller;
use olx_sniper::scrapers::OlxExtractor;
use olx_sniper::seen::{JsonFileBackend, MemoryBackend, SeenBackend, SeenStore, SqliteBackend};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("🎯 OLX Sniper Bot");
    info!("==========================================");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(port) = config.health_port {
        tokio::spawn(async move {
            if let Err(e) = health::serve(port).await {
                error!("Health endpoint stopped: {:#}", e);
            }
        });
    }

    if config.api.is_complete() {
        warn!(
            api_base = %config.api.base,
            "API credentials are set but API mode is not supported, scraping HTML instead"
        );
    }

    let client = Arc::new(HttpClient::new(&config.http)?);
    let extractor = OlxExtractor::new(config.extract.clone())?;
    let store = SeenStore::load(open_backend(&config.seen).await).await;
    let notifier = Notifier::new(
        client.clone(),
        config.webhook_url.clone(),
        config.bot_username.clone(),
        RetryPolicy::default(),
    );

    info!("📡 Search URL: {}", config.poller.search_url);
    info!(
        "🗂️  Seen store: {} ids, keeping at most {}",
        store.len(),
        config.poller.seen_max
    );

    Poller::new(client, extractor, notifier, store, config.poller).run().await;
    Ok(())
}

async fn open_backend(settings: &SeenSettings) -> Box<dyn SeenBackend> {
    match settings.backend {
        SeenBackendKind::Json => Box::new(JsonFileBackend::new(&settings.path)),
        SeenBackendKind::Memory => Box::new(MemoryBackend::default()),
        SeenBackendKind::Sqlite => match SqliteBackend::open(&settings.path).await {
            Ok(backend) => Box::new(backend),
            Err(e) => {
                error!(
                    "Could not open {}: {}. Seen ids will not survive a restart",
                    settings.path.display(),
                    e
                );
                Box::new(MemoryBackend::default())
            }
        },
    }
}
