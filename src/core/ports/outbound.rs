use async_trait::async_trait;

use crate::core::{
    credential::Credential,
    domain::{ChatReply, ChatRequest, PricingCatalog},
    error::Result,
};

/// One chat-completion round trip against the gateway.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Sends a single request. Non-success statuses and transport failures come back as
    /// [`crate::core::Error::Gateway`].
    async fn chat_completion(&self, credential: &Credential, request: &ChatRequest)
    -> Result<ChatReply>;
}

/// Where pricing data comes from (live gateway listing or a static snapshot).
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fails with [`crate::core::Error::CatalogUnavailable`].
    async fn fetch_catalog(&self, credential: Option<&Credential>) -> Result<PricingCatalog>;

    /// Whether fetching goes over the network and therefore needs a credential up front.
    fn requires_credential(&self) -> bool {
        true
    }
}

/// Abstraction for getting the current time.
pub trait Clock: Send + Sync {
    /// Milliseconds on a monotonic-enough wall clock.
    fn now_ms(&self) -> u128;
}
