//! Worker entry point.
//!
//! Reads one batch of item events as a JSON array, from a file path given
//! as the first argument or from stdin, and syncs each item against the
//! store. Exit status reflects whether the whole batch settled; vetoed
//! items are reported but do not fail the run.

use std::process::ExitCode;

use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use skubridge_core::Item;
use skubridge_sync::Config;
use skubridge_sync::index::PgSkuIndex;
use skubridge_sync::pipeline;
use skubridge_sync::shopify::{ProductManager, RestProductApi};
use skubridge_sync::throttle::{BucketConfig, RedisTokenStore, Throttle};
use skubridge_sync::types_table::TypeTable;

/// One bucket per store; every worker process sharing the store's quota
/// must use the same key.
const BUCKET_KEY: &str = "skubridge:shopify:bucket";

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "worker failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(config.database_url.expose_secret())
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let redis = redis::Client::open(config.redis_url.as_str())?;
    let conn = redis::aio::ConnectionManager::new(redis).await?;
    let store = RedisTokenStore::new(conn, BUCKET_KEY, BucketConfig::shopify_admin());
    let throttle = Throttle::new(store, config.worker_budget);

    let api = RestProductApi::new(&config.shopify, throttle.clone());
    let manager = ProductManager::new(api, PgSkuIndex::new(pool));
    let types = TypeTable::load(&config.types_path);
    info!(rows = types.len(), "type table loaded");

    let items = read_items(std::env::args().nth(1))?;
    info!(items = items.len(), "processing batch");

    let outcome = pipeline::process_batch(&manager, &types, &items).await;
    // Whatever happened, no waiter may outlive this invocation.
    throttle.shutdown();
    let report = outcome?;

    info!(
        published = report.published,
        retired = report.retired,
        vetoed = report.vetoed.len(),
        "batch complete"
    );
    for veto in &report.vetoed {
        warn!(item = %veto.item_id, reason = %veto.reason, "item was not published");
    }
    Ok(())
}

fn read_items(path: Option<String>) -> Result<Vec<Item>, Box<dyn std::error::Error>> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => std::io::read_to_string(std::io::stdin())?,
    };
    Ok(serde_json::from_str(&raw)?)
}
