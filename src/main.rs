//! rehab-server: serves the records API from the in-memory store
//!
//! Configuration is read from the YAML file named by `REHAB_CONFIG`;
//! defaults apply when it is unset. Log filtering follows `RUST_LOG`.

use anyhow::Result;
use rehab::prelude::*;
use tracing_subscriber::EnvFilter;

const CONFIG_VAR: &str = "REHAB_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rehab=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env_or_default(CONFIG_VAR)?;

    let store = InMemoryStore::new();
    seed_defaults(&store, &config).await?;

    ServerBuilder::new()
        .with_config(config)
        .with_store(store)
        .with_catalog(default_catalog()?)
        .serve()
        .await
}
