pub mod migrate;
pub mod rebuild;
pub mod seed;

use anyhow::Context as _;
use docmigrate::UnitRegistry;
use docmigrate_core::MigrateConfig;
use docmigrate_store::MongoStore;
use tracing::debug;

/// Everything a connected command needs: one store handle for the whole run
pub struct Context {
    pub config: MigrateConfig,
    pub store: MongoStore,
    pub registry: UnitRegistry,
}

impl Context {
    pub async fn connect(config: &MigrateConfig) -> anyhow::Result<Self> {
        let url = config.require_database_url()?;
        debug!(
            url = config.masked_database_url().as_deref().unwrap_or_default(),
            "Connecting to database"
        );

        let store = MongoStore::connect(url)
            .await
            .context("Unable to connect to database")?;

        Ok(Self {
            config: config.clone(),
            store,
            registry: UnitRegistry::new(),
        })
    }
}
