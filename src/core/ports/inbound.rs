//! Inbound ports (use-case ports) define the application service interface that
//! driving adapters (CLI, HTTP server) consume.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{
    conversation::ConversationState,
    cost,
    domain::{ChatReply, CostBreakdown, ModelPricing, PricingCatalog, UsageCounters},
    error::Result,
};

/// One-shot prompt, optionally sampled several times in parallel.
#[derive(Debug, Clone, Default)]
pub struct SampleRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub samples: usize,
    pub api_key: Option<String>,
}

/// One submission into an interactive session.
#[derive(Debug, Clone, Default)]
pub struct ChatTurnRequest {
    pub text: String,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    /// `1` commits the reply to history; more than one stores side-by-side candidates.
    pub samples: usize,
    pub api_key: Option<String>,
}

/// Ordered per-unit results of one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleOutcome {
    pub model: String,
    pub responses: Vec<UnitReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurnOutcome {
    pub model: String,
    /// A model reply was appended to history. A failed chat-mode unit appends its
    /// error text instead and reports `false`.
    pub committed: bool,
    pub history_len: usize,
    pub responses: Vec<UnitReport>,
}

/// Result of one fan-out unit as presented to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub usage: Option<UsageCounters>,
    pub cost: CostReport,
}

impl UnitReport {
    pub fn from_outcome(outcome: &Result<ChatReply>, model_id: &str, catalog: &PricingCatalog) -> Self {
        match outcome {
            Ok(reply) => Self {
                content: Some(reply.content.clone()),
                error: None,
                usage: reply.usage,
                cost: CostReport::for_usage(reply.usage.as_ref(), model_id, catalog),
            },
            Err(err) => Self {
                content: None,
                error: Some(err.to_string()),
                usage: None,
                cost: CostReport::UsageUnavailable,
            },
        }
    }

    /// Content for display, or the error text in its place.
    pub fn text(&self) -> &str {
        self.content
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or_default()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CostReport {
    Priced(CostBreakdown),
    UnknownModel { message: String },
    UsageUnavailable,
}

impl CostReport {
    pub fn for_usage(usage: Option<&UsageCounters>, model_id: &str, catalog: &PricingCatalog) -> Self {
        match usage {
            None => CostReport::UsageUnavailable,
            Some(usage) => match cost::cost(usage, model_id, catalog) {
                Ok(breakdown) => CostReport::Priced(breakdown),
                Err(err) => CostReport::UnknownModel {
                    message: err.to_string(),
                },
            },
        }
    }
}

/// Catalog entry prepared for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelListing {
    pub model_id: String,
    pub prompt_price_per_1k: f64,
    pub completion_price_per_1k: f64,
    pub description: String,
}

impl From<&ModelPricing> for ModelListing {
    fn from(value: &ModelPricing) -> Self {
        let (prompt, completion) = value.per_thousand_tokens();
        Self {
            model_id: value.model_id.clone(),
            prompt_price_per_1k: prompt,
            completion_price_per_1k: completion,
            description: value.description.clone(),
        }
    }
}

/// The application service that driving adapters consume.
#[async_trait]
pub trait PromptService: Send + Sync {
    /// Fire one prompt `samples` times concurrently and price each result.
    async fn sample(&self, request: SampleRequest) -> Result<SampleOutcome>;

    /// Advance an interactive session by one submission.
    async fn chat_turn(
        &self,
        state: &mut ConversationState,
        request: ChatTurnRequest,
    ) -> Result<ChatTurnOutcome>;

    /// Catalog entries with preferred models first. Empty when the catalog is unavailable.
    async fn list_models(&self, api_key: Option<String>) -> Result<Vec<ModelListing>>;

    /// Model the service falls back to when a request names none.
    fn default_model(&self) -> &str;
}
