use std::sync::Arc;

use anyhow::Context;

use warden_callback::config::CallbackConfig;
use warden_callback::store::{FilePgtStore, PgtStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warden_observability::init();

    let config = CallbackConfig::from_env()?;
    let store = FilePgtStore::open(&config.store_path)
        .with_context(|| format!("failed to open pgt store at {}", config.store_path.display()))?;

    if let Some(max_age) = config.max_age {
        let purged = store.purge_older_than(max_age)?;
        tracing::info!(purged, "purged stale proxy-granting tickets");
    }

    let store: Arc<dyn PgtStore> = Arc::new(store);
    if let Some(max_age) = config.max_age {
        warden_callback::purge::spawn_purger(Arc::clone(&store), max_age, config.purge_interval);
    }

    let app = warden_callback::app::build_app(store);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(store = %config.store_path.display(), "listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
