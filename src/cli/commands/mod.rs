pub mod admin;
pub mod migrate;
pub mod serve;
pub mod sweep;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::{PgStore, Store};
use crate::services::{Dependencies, Services};

/// Production service graph over the shared Postgres pool.
pub(crate) fn services(config: &AppConfig) -> anyhow::Result<(Arc<dyn Store>, Services)> {
    let store: Arc<dyn Store> = Arc::new(PgStore::from_manager()?);
    let services = Services::new(Dependencies::from_config(config, store.clone()));
    Ok((store, services))
}
