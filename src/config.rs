use std::env;

/// Which result-store backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    JsonFiles,
    Sqlite,
}

/// Configuration loaded from environment variables
pub struct Config {
    /// Explicit worker count; defaults to hardware parallelism when unset
    pub workers: Option<usize>,
    pub dataset_path: String,
    pub results_dir: String,
    pub store_kind: StoreKind,
    pub listen_addr: String,
    pub rust_log: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// All variables are optional. STATFLOW_WORKERS caps the worker pool;
    /// when unset the pool sizes itself to the host's available parallelism.
    pub fn from_env() -> Self {
        let workers = env::var("STATFLOW_WORKERS")
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok());

        let dataset_path = env::var("STATFLOW_DATASET")
            .unwrap_or_else(|_| "nutrition_activity_obesity_usa_subset.csv".to_string());

        let results_dir =
            env::var("STATFLOW_RESULTS_DIR").unwrap_or_else(|_| "results".to_string());

        let store_kind = match env::var("STATFLOW_STORE").as_deref() {
            Ok("sqlite") => StoreKind::Sqlite,
            _ => StoreKind::JsonFiles,
        };

        let listen_addr =
            env::var("STATFLOW_LISTEN").unwrap_or_else(|_| "127.0.0.1:5000".to_string());

        let rust_log = env::var("RUST_LOG").ok();

        Self {
            workers,
            dataset_path,
            results_dir,
            store_kind,
            listen_addr,
            rust_log,
        }
    }
}
