use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Token counts reported by the gateway for a single completion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageCounters {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl UsageCounters {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// Per-token prices for one model, in the provider's native unit (USD per token).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub model_id: String,
    pub prompt_price_per_token: f64,
    pub completion_price_per_token: f64,
    #[serde(default)]
    pub description: String,
}

impl ModelPricing {
    /// Display-oriented prices per 1000 tokens as `(prompt, completion)`.
    pub fn per_thousand_tokens(&self) -> (f64, f64) {
        (
            self.prompt_price_per_token * 1000.0,
            self.completion_price_per_token * 1000.0,
        )
    }
}

/// Read-only mapping of model id to pricing, preserving the provider's listing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricingCatalog {
    entries: Vec<ModelPricing>,
    index: HashMap<String, usize>,
}

impl PricingCatalog {
    pub fn new(models: impl IntoIterator<Item = ModelPricing>) -> Self {
        let mut catalog = Self::default();
        for model in models {
            match catalog.index.get(&model.model_id) {
                // later duplicates replace earlier ones in place
                Some(&slot) => catalog.entries[slot] = model,
                None => {
                    catalog
                        .index
                        .insert(model.model_id.clone(), catalog.entries.len());
                    catalog.entries.push(model);
                }
            }
        }
        catalog
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, model_id: &str) -> Option<&ModelPricing> {
        self.index.get(model_id).map(|&slot| &self.entries[slot])
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.index.contains_key(model_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelPricing> {
        self.entries.iter()
    }

    /// Models in display order: `preferred` ids present in the catalog first (in the
    /// given order), then every remaining model in provider order.
    pub fn ordered_by_preference<'a>(&'a self, preferred: &[String]) -> Vec<&'a ModelPricing> {
        let mut seen = HashSet::new();
        let mut ordered: Vec<&ModelPricing> = preferred
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| self.get(id))
            .collect();
        ordered.extend(
            self.entries
                .iter()
                .filter(|model| !preferred.iter().any(|id| id == &model.model_id)),
        );
        ordered
    }
}

/// Monetary cost of one completion call.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub prompt_cost: f64,
    pub completion_cost: f64,
    pub total_cost: f64,
}

/// A single chat-completion request unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Content and usage extracted from a successful completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub content: String,
    pub usage: Option<UsageCounters>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pricing(id: &str, prompt: f64, completion: f64) -> ModelPricing {
        ModelPricing {
            model_id: id.into(),
            prompt_price_per_token: prompt,
            completion_price_per_token: completion,
            description: String::new(),
        }
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn catalog_keeps_provider_order_and_replaces_duplicates() {
        let catalog = PricingCatalog::new([
            pricing("a", 1.0, 1.0),
            pricing("b", 2.0, 2.0),
            pricing("a", 3.0, 3.0),
        ]);
        assert_eq!(catalog.len(), 2);
        let ids: Vec<_> = catalog.iter().map(|m| m.model_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(catalog.get("a").unwrap().prompt_price_per_token, 3.0);
    }

    #[test]
    fn preferred_models_come_first_when_present() {
        let catalog = PricingCatalog::new([
            pricing("x/one", 0.0, 0.0),
            pricing("x/two", 0.0, 0.0),
            pricing("x/three", 0.0, 0.0),
        ]);
        let preferred = vec!["x/three".to_string(), "missing".to_string()];
        let ids: Vec<_> = catalog
            .ordered_by_preference(&preferred)
            .into_iter()
            .map(|m| m.model_id.as_str())
            .collect();
        assert_eq!(ids, ["x/three", "x/one", "x/two"]);
    }

    #[test]
    fn per_thousand_prices_scale_native_units() {
        let model = pricing("m", 0.000_001_5, 0.000_002);
        let (prompt, completion) = model.per_thousand_tokens();
        assert!((prompt - 0.0015).abs() < 1e-12);
        assert!((completion - 0.002).abs() < 1e-12);
    }

    #[test]
    fn total_tokens_sums_both_counters() {
        let usage = UsageCounters {
            prompt_tokens: 12,
            completion_tokens: 30,
        };
        assert_eq!(usage.total_tokens(), 42);
    }
}
