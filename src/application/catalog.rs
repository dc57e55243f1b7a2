use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use tracing::{info, warn};

use crate::core::{
    Credential, Error as CoreError, Result as CoreResult,
    domain::PricingCatalog,
    ports::{CatalogSource, Clock},
};

/// Time-bounded memoization of the pricing catalog, keyed by credential.
///
/// Entries are replaced wholesale. Two concurrent refreshes of the same key both
/// fetch and the last write wins.
pub struct CatalogCache {
    source: Arc<dyn CatalogSource>,
    clock: Arc<dyn Clock>,
    ttl_ms: u128,
    entries: RwLock<HashMap<Option<Credential>, CacheEntry>>,
}

struct CacheEntry {
    value: Arc<PricingCatalog>,
    fetched_at: u128,
}

impl CatalogCache {
    pub fn new(source: Arc<dyn CatalogSource>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            source,
            clock,
            ttl_ms: ttl.as_millis(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn requires_credential(&self) -> bool {
        self.source.requires_credential()
    }

    /// Returns the cached catalog for `credential`, fetching when absent or expired.
    pub async fn load(&self, credential: Option<&Credential>) -> CoreResult<Arc<PricingCatalog>> {
        let key = credential.cloned();
        if let Some(hit) = self.lookup(&key)? {
            return Ok(hit);
        }

        let catalog = Arc::new(self.source.fetch_catalog(credential).await?);
        info!(models = catalog.len(), "pricing catalog refreshed");

        let entry = CacheEntry {
            value: catalog.clone(),
            fetched_at: self.clock.now_ms(),
        };
        self.entries
            .write()
            .map_err(|_| CoreError::System("catalog cache lock poisoned".into()))?
            .insert(key, entry);
        Ok(catalog)
    }

    /// Like [`Self::load`], but an unavailable catalog degrades to an empty one.
    pub async fn load_or_empty(&self, credential: Option<&Credential>) -> Arc<PricingCatalog> {
        match self.load(credential).await {
            Ok(catalog) => catalog,
            Err(err) => {
                warn!(error = %err, "pricing catalog unavailable; costs will be reported as unknown");
                Arc::new(PricingCatalog::empty())
            }
        }
    }

    fn lookup(&self, key: &Option<Credential>) -> CoreResult<Option<Arc<PricingCatalog>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CoreError::System("catalog cache lock poisoned".into()))?;
        let now = self.clock.now_ms();
        Ok(entries
            .get(key)
            .filter(|entry| now.saturating_sub(entry.fetched_at) < self.ttl_ms)
            .map(|entry| entry.value.clone()))
    }
}
