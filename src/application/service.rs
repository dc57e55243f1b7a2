//! Application service implementation that provides the `PromptService` trait.
//! This is the primary use-case port implementation that driving adapters consume.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    application::{CatalogCache, CompletionClient},
    config::PromptbenchConfig,
    core::{
        Credential,
        conversation::{ConversationState, Phase},
        domain::{ChatReply, Message, PricingCatalog},
        error::{Error as CoreError, Result as CoreResult},
        ports::{
            ChatTurnOutcome, ChatTurnRequest, ModelListing, PromptService, SampleOutcome,
            SampleRequest, UnitReport,
        },
    },
};

/// Factory function type for resolving the gateway credential.
pub type CredentialResolver = Arc<dyn Fn(Option<String>) -> CoreResult<Credential> + Send + Sync>;

/// Request defaults applied when a caller leaves a field unset.
#[derive(Debug, Clone)]
pub struct ServiceDefaults {
    pub model: String,
    pub temperature: f32,
    pub max_samples: usize,
    pub preferred_models: Vec<String>,
}

impl From<&PromptbenchConfig> for ServiceDefaults {
    fn from(config: &PromptbenchConfig) -> Self {
        Self {
            model: config.defaults.model.clone(),
            temperature: config.defaults.temperature,
            max_samples: config.defaults.max_samples,
            preferred_models: config.preferred_models.clone(),
        }
    }
}

/// Application service that implements `PromptService`.
///
/// Holds the completion client, the pricing catalog cache and the credential
/// resolver, and is injected into driving adapters (CLI, HTTP server).
pub struct AppService {
    defaults: ServiceDefaults,
    completions: CompletionClient,
    catalog: Arc<CatalogCache>,
    credential_resolver: CredentialResolver,
}

/// Validated, defaults-applied form of an incoming request.
struct Plan {
    model: String,
    temperature: f32,
    samples: usize,
    credential: Credential,
}

impl AppService {
    pub fn new(
        defaults: ServiceDefaults,
        completions: CompletionClient,
        catalog: Arc<CatalogCache>,
        credential_resolver: CredentialResolver,
    ) -> Self {
        Self {
            defaults,
            completions,
            catalog,
            credential_resolver,
        }
    }

    fn plan(
        &self,
        model: Option<String>,
        temperature: Option<f32>,
        samples: usize,
        api_key: Option<String>,
    ) -> CoreResult<Plan> {
        let model = model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.defaults.model.clone());

        let temperature = temperature.unwrap_or(self.defaults.temperature);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(CoreError::InvalidRequest(format!(
                "temperature must be between 0.0 and 2.0, got {temperature}"
            )));
        }

        if samples == 0 || samples > self.defaults.max_samples {
            return Err(CoreError::InvalidRequest(format!(
                "samples must be between 1 and {}, got {samples}",
                self.defaults.max_samples
            )));
        }

        // Resolved last so validation errors win, but before any state changes or requests.
        let credential = (self.credential_resolver)(api_key)?;

        Ok(Plan {
            model,
            temperature,
            samples,
            credential,
        })
    }

    fn catalog_key<'a>(&self, credential: &'a Credential) -> Option<&'a Credential> {
        self.catalog.requires_credential().then_some(credential)
    }

    /// Runs the fan-out and the catalog lookup concurrently.
    async fn dispatch(
        &self,
        plan: &Plan,
        messages: Vec<Message>,
    ) -> (Vec<CoreResult<ChatReply>>, Arc<PricingCatalog>) {
        tokio::join!(
            self.completions.complete(
                messages,
                &plan.model,
                Some(plan.temperature),
                &plan.credential,
                plan.samples,
            ),
            self.catalog.load_or_empty(self.catalog_key(&plan.credential)),
        )
    }
}

/// Withdraws the submission if the turn future is dropped before its reply is
/// recorded, so the session never stays stuck awaiting.
struct PendingTurn<'a> {
    state: &'a mut ConversationState,
}

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        if self.state.phase() == Phase::AwaitingReply {
            warn!("chat turn dropped before its reply; submission withdrawn");
            let _ = self.state.abandon();
        }
    }
}

fn require_text(text: &str, field: &str) -> CoreResult<()> {
    if text.trim().is_empty() {
        return Err(CoreError::InvalidRequest(format!("{field} must not be empty")));
    }
    Ok(())
}

fn reports(
    outcomes: &[CoreResult<ChatReply>],
    model: &str,
    catalog: &PricingCatalog,
) -> Vec<UnitReport> {
    outcomes
        .iter()
        .map(|outcome| UnitReport::from_outcome(outcome, model, catalog))
        .collect()
}

#[async_trait]
impl PromptService for AppService {
    async fn sample(&self, request: SampleRequest) -> CoreResult<SampleOutcome> {
        require_text(&request.prompt, "prompt")?;
        let plan = self.plan(
            request.model,
            request.temperature,
            request.samples,
            request.api_key,
        )?;

        // A one-shot prompt is a fresh single-turn conversation.
        let messages =
            ConversationState::new().submit(request.prompt, request.system_prompt.as_deref())?;

        info!(model = %plan.model, samples = plan.samples, "sampling prompt");
        let (outcomes, catalog) = self.dispatch(&plan, messages).await;

        Ok(SampleOutcome {
            responses: reports(&outcomes, &plan.model, &catalog),
            model: plan.model,
        })
    }

    async fn chat_turn(
        &self,
        state: &mut ConversationState,
        request: ChatTurnRequest,
    ) -> CoreResult<ChatTurnOutcome> {
        require_text(&request.text, "message")?;
        let plan = self.plan(
            request.model,
            request.temperature,
            request.samples,
            request.api_key,
        )?;

        let mut turn = PendingTurn { state };
        let messages = turn
            .state
            .submit(request.text, request.system_prompt.as_deref())?;
        let (outcomes, catalog) = self.dispatch(&plan, messages).await;
        let responses = reports(&outcomes, &plan.model, &catalog);

        let committed = match (plan.samples, outcomes.first()) {
            (1, Some(Ok(reply))) => {
                turn.state.record_reply(reply.content.clone())?;
                true
            }
            (1, Some(Err(err))) => {
                turn.state.record_failure(err.to_string())?;
                false
            }
            _ => {
                let candidates = responses.iter().map(|r| r.text().to_string()).collect();
                turn.state.record_candidates(candidates)?;
                false
            }
        };

        Ok(ChatTurnOutcome {
            model: plan.model,
            committed,
            history_len: turn.state.messages().len(),
            responses,
        })
    }

    async fn list_models(&self, api_key: Option<String>) -> CoreResult<Vec<ModelListing>> {
        let credential = if self.catalog.requires_credential() {
            Some((self.credential_resolver)(api_key)?)
        } else {
            None
        };

        let catalog = self.catalog.load_or_empty(credential.as_ref()).await;
        Ok(catalog
            .ordered_by_preference(&self.defaults.preferred_models)
            .into_iter()
            .map(ModelListing::from)
            .collect())
    }

    fn default_model(&self) -> &str {
        &self.defaults.model
    }
}
