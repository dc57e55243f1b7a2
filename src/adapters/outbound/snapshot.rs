use std::path::PathBuf;

use async_trait::async_trait;

use crate::adapters::outbound::gateway::parse_catalog;
use crate::core::{
    Credential, Error as CoreError, Result as CoreResult, domain::PricingCatalog,
    ports::CatalogSource,
};

/// Catalog read from a saved `models.json` listing instead of the live gateway.
#[derive(Debug, Clone)]
pub struct SnapshotCatalogSource {
    path: PathBuf,
}

impl SnapshotCatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for SnapshotCatalogSource {
    async fn fetch_catalog(&self, _credential: Option<&Credential>) -> CoreResult<PricingCatalog> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|err| {
            CoreError::CatalogUnavailable(format!("failed to read {}: {err}", self.path.display()))
        })?;
        parse_catalog(&bytes)
    }

    fn requires_credential(&self) -> bool {
        false
    }
}
