//! Pokedex binary
//!
//! Pages through the Pokémon list with a pagestore `Store`, printing each
//! page as the items selector emits it.

use anyhow::Context;
use pagestore_core::PageAction;
use pagestore_runtime::metrics::MetricsServer;
use pagestore_runtime::{Store, StoreConfig};
use pokedex::{PokeApiClient, PokedexConfig};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Grace period on top of the HTTP timeout before giving up on a load
const LOAD_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pokedex=info,pagestore_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PokedexConfig::from_env().context("Failed to load configuration")?;
    tracing::info!(
        api = %config.api_base_url,
        page_size = config.page_size,
        pages = config.pages,
        "Starting pokedex"
    );

    let mut metrics = config
        .metrics_addr
        .map_or_else(MetricsServer::render_only, MetricsServer::new);
    metrics.start().context("Failed to start metrics")?;

    let client = PokeApiClient::new(&config).context("Failed to build API client")?;
    let store = Store::with_config(
        client,
        StoreConfig::default().with_initial_limit(config.page_size),
    )?;

    let offset = store.offset();
    let _printer = store.items().subscribe(move |page| {
        if page.is_empty() {
            return;
        }
        println!("\n=== Offset {} ===", offset.latest());
        for pokemon in page.iter() {
            match pokemon.id() {
                Some(id) => println!("#{id:>4}  {}", pokemon.name),
                None => println!("       {}", pokemon.name),
            }
        }
    });

    let wait = config.request_timeout() + LOAD_GRACE;
    for page in 0..config.pages {
        if page > 0 {
            store.increase_offset(config.page_size);
        }

        let outcome = store
            .send_and_wait_for(PageAction::RequestLoad, PageAction::is_load_outcome, wait)
            .await?;

        if let PageAction::LoadFailed(error) = outcome {
            // Already logged by the store; stop paging
            eprintln!("Load failed: {error}");
            break;
        }
    }

    if config.metrics_addr.is_none() {
        if let Some(rendered) = metrics.render() {
            tracing::debug!("Metrics:\n{rendered}");
        }
    } else {
        tracing::info!("Serving metrics until interrupted (Ctrl+C)");
        tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
    }

    Ok(())
}
