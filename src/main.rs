use std::sync::Arc;

use statflow::api::{self, ApiState};
use statflow::config::{Config, StoreKind};
use statflow::dataset::{self, ReadyLatch};
use statflow::engine::JobEngine;
use statflow::store::{JsonFileStore, ResultStore, SqliteStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let config = Config::from_env();

    // Honor RUST_LOG when set, default to info otherwise
    let mut builder = if config.rust_log.is_some() {
        env_logger::Builder::from_default_env()
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
    };
    builder.try_init().ok();

    log::info!("starting statflow");
    log::info!("   dataset: {}", config.dataset_path);
    log::info!("   results: {}", config.results_dir);
    log::info!("   listen:  {}", config.listen_addr);

    let store: Arc<dyn ResultStore> = match config.store_kind {
        StoreKind::JsonFiles => Arc::new(JsonFileStore::new(&config.results_dir)?),
        StoreKind::Sqlite => {
            let db_path = std::path::Path::new(&config.results_dir).join("results.db");
            std::fs::create_dir_all(&config.results_dir)?;
            Arc::new(SqliteStore::new(db_path)?)
        }
    };
    log::info!("result store backend: {}", store.backend_type());

    let ready = Arc::new(ReadyLatch::new());
    let view = Arc::new(dataset::load_csv(&config.dataset_path)?);
    let engine = Arc::new(JobEngine::start(
        view,
        Arc::clone(&store),
        Arc::clone(&ready),
        config.workers,
    )?);
    // Dataset is frozen; release the parked workers
    ready.set();

    let router = api::router(ApiState {
        engine: Arc::clone(&engine),
        store,
    });

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    log::info!("listening on {}", config.listen_addr);
    axum::serve(listener, router).await?;

    Ok(())
}
