//! Mini Memcache demo
//!
//! Fills a cache, immortalizes one item and watches the auditor expire the rest.
//! Parameters come from the `MEMCACHE_*` environment variables.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mini_memcache::{Cache, CacheConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_memcache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: capacity={}, default_lifetime={:?}, audit_interval={:?}, audit_delay={:?}",
        config.capacity, config.default_lifetime, config.audit_interval, config.audit_delay
    );
    let watch_for = config.default_lifetime + config.audit_interval * 2;

    let cache = Cache::with_config(config).context("failed to start cache")?;
    cache.auditor().handle_errors(|err| tracing::warn!(error = %err, "auditor error"));

    cache.put("a", "hey".to_string())?;
    cache.put_tagged("b", "hijack".to_string(), [1])?;
    cache.put_tagged("c", "kii".to_string(), [1, 2])?;
    cache.immortalize("a")?;
    info!("Keys after insert: {:?}", cache.list_keys());

    tokio::time::sleep(watch_for).await;
    info!("Keys after {:?}: {:?}", watch_for, cache.list_keys());

    cache.close().await;
    info!("Final stats: {:?}", cache.stats());
    Ok(())
}
