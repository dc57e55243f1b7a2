use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::config::GatewayConfig;
use crate::core::{
    Credential, Error as CoreError, Result as CoreResult,
    domain::{ChatReply, ChatRequest, ModelPricing, PricingCatalog, UsageCounters},
    ports::{CatalogSource, ChatGateway},
};

/// HTTP client for the hosted chat-completion gateway and its model listing.
#[derive(Clone)]
pub struct OpenRouterGateway {
    inner: Arc<OpenRouterGatewayInner>,
}

struct OpenRouterGatewayInner {
    completions_url: String,
    models_url: String,
    referer: Option<String>,
    title: Option<String>,
    http_client: reqwest::Client,
}

impl OpenRouterGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(anyhow!("Gateway base URL may not be empty"));
        }
        let http_client = build_http_client()?;
        Ok(Self {
            inner: Arc::new(OpenRouterGatewayInner {
                completions_url: config.completions_url(),
                models_url: config.models_url(),
                referer: config.referer.clone(),
                title: config.title.clone(),
                http_client,
            }),
        })
    }

    fn with_headers(
        &self,
        mut builder: RequestBuilder,
        credential: Option<&Credential>,
    ) -> RequestBuilder {
        if let Some(credential) = credential {
            builder = builder.bearer_auth(credential.expose());
        }
        if let Some(referer) = &self.inner.referer {
            builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.inner.title {
            builder = builder.header("X-Title", title);
        }
        builder
    }
}

impl std::fmt::Debug for OpenRouterGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterGateway")
            .field("completions_url", &self.inner.completions_url)
            .field("models_url", &self.inner.models_url)
            .finish()
    }
}

#[async_trait]
impl ChatGateway for OpenRouterGateway {
    async fn chat_completion(
        &self,
        credential: &Credential,
        request: &ChatRequest,
    ) -> CoreResult<ChatReply> {
        let response = self
            .with_headers(
                self.inner.http_client.post(&self.inner.completions_url),
                Some(credential),
            )
            .json(request)
            .send()
            .await
            .map_err(|err| CoreError::transport(err.to_string()))?;

        let status = response.status();
        debug!(model = %request.model, status = status.as_u16(), "chat completion returned");
        if status != StatusCode::OK {
            return Err(CoreError::gateway_status(status.as_u16()));
        }

        let body: CompletionBody = response
            .json()
            .await
            .map_err(|err| CoreError::transport(format!("malformed completion response: {err}")))?;
        body.into_reply()
    }
}

#[async_trait]
impl CatalogSource for OpenRouterGateway {
    async fn fetch_catalog(&self, credential: Option<&Credential>) -> CoreResult<PricingCatalog> {
        let response = self
            .with_headers(self.inner.http_client.get(&self.inner.models_url), credential)
            .send()
            .await
            .map_err(|err| CoreError::CatalogUnavailable(err.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(CoreError::CatalogUnavailable(status.as_u16().to_string()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| CoreError::CatalogUnavailable(err.to_string()))?;
        parse_catalog(&bytes)
    }
}

#[derive(Debug, Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<UsageBody>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageBody {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

impl CompletionBody {
    fn into_reply(self) -> CoreResult<ChatReply> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::transport("malformed completion response: no choices"))?;
        let usage = self.usage.and_then(|usage| {
            Some(UsageCounters {
                prompt_tokens: usage.prompt_tokens?,
                completion_tokens: usage.completion_tokens?,
            })
        });
        Ok(ChatReply {
            content: choice.message.content.unwrap_or_default(),
            usage,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CatalogBody {
    data: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: String,
    #[serde(default)]
    pricing: CatalogPricing,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPricing {
    #[serde(default)]
    prompt: Option<PriceValue>,
    #[serde(default)]
    completion: Option<PriceValue>,
}

/// The listing encodes prices as decimal strings; snapshots sometimes hold numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PriceValue {
    Number(f64),
    Text(String),
}

impl PriceValue {
    fn per_token(value: Option<&PriceValue>) -> Option<f64> {
        let price = match value {
            None => 0.0,
            Some(PriceValue::Number(n)) => *n,
            Some(PriceValue::Text(text)) => text.trim().parse().ok()?,
        };
        (price.is_finite() && price >= 0.0).then_some(price)
    }
}

/// Parses a `{"data": [...]}` model listing into a catalog.
///
/// Missing prices count as zero. Entries with negative or unparseable prices (dynamic
/// router pseudo-models) cannot be priced and are left out.
pub fn parse_catalog(bytes: &[u8]) -> CoreResult<PricingCatalog> {
    let body: CatalogBody = serde_json::from_slice(bytes)
        .map_err(|err| CoreError::CatalogUnavailable(format!("malformed model listing: {err}")))?;

    let models = body.data.into_iter().filter_map(|entry| {
        let prompt = PriceValue::per_token(entry.pricing.prompt.as_ref());
        let completion = PriceValue::per_token(entry.pricing.completion.as_ref());
        match (prompt, completion) {
            (Some(prompt), Some(completion)) => Some(ModelPricing {
                model_id: entry.id,
                prompt_price_per_token: prompt,
                completion_price_per_token: completion,
                description: entry.description.unwrap_or_default(),
            }),
            _ => {
                debug!(model = %entry.id, "skipping model without usable pricing");
                None
            }
        }
    });
    Ok(PricingCatalog::new(models))
}

fn build_http_client() -> Result<reqwest::Client> {
    // OS-level proxy discovery can panic in sandboxed macOS environments; opt in with
    // `PROMPTBENCH_ENABLE_SYSTEM_PROXY=1`.
    let mut builder = reqwest::Client::builder();
    if std::env::var_os("PROMPTBENCH_ENABLE_SYSTEM_PROXY").is_none() {
        builder = builder.no_proxy();
    }
    builder
        .build()
        .map_err(|err| anyhow!("Failed to build HTTP client: {err}"))
}
