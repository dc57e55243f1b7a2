//! CLI inbound adapter that translates command-line arguments into application service calls.

mod definitions;

pub use definitions::*;

use std::{io::Write, sync::Arc};

use anyhow::{Result, anyhow, bail};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::core::{
    conversation::ConversationState,
    cost::format_usd,
    error::Error as CoreError,
    ports::{
        ChatTurnOutcome, ChatTurnRequest, CostReport, ModelListing, PromptService, SampleOutcome,
        SampleRequest, UnitReport,
    },
};

/// CLI adapter that consumes the `PromptService` to execute commands.
pub struct CliAdapter {
    service: Arc<dyn PromptService>,
}

impl CliAdapter {
    pub fn new(service: Arc<dyn PromptService>) -> Self {
        Self { service }
    }

    /// Execute a CLI command by dispatching to the appropriate service method.
    pub async fn execute(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Ask(args) => self.ask_command(args).await,
            Commands::Chat(args) => {
                let stdin = BufReader::new(tokio::io::stdin());
                self.chat_session(args, stdin, &mut std::io::stdout()).await
            }
            Commands::Models(args) => self.models_command(args).await,
            Commands::Serve(_) => {
                // Serve is handled separately in main.rs since it needs special setup
                Err(anyhow!(
                    "Serve command should be handled by the composition root"
                ))
            }
        }
    }

    async fn ask_command(&self, args: AskArgs) -> Result<()> {
        let request = SampleRequest {
            prompt: args.prompt,
            system_prompt: args.options.system_prompt,
            model: args.options.model,
            temperature: args.options.temperature,
            samples: args.samples,
            api_key: args.options.api_key,
        };
        let outcome = self.service.sample(request).await?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else {
            println!("{}", render_sample_report(&outcome));
        }
        Ok(())
    }

    /// Request-then-wait loop: each input line is one submission.
    pub async fn chat_session<R, W>(&self, args: ChatArgs, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let model = args
            .options
            .model
            .clone()
            .unwrap_or_else(|| self.service.default_model().to_string());
        writeln!(
            out,
            "Chatting with {model}. Type /reset to clear history, /exit to quit."
        )?;

        let mut state = ConversationState::new();
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let text = line.trim();
            match text {
                "" => continue,
                "/exit" | "/quit" => break,
                "/reset" => {
                    state.reset();
                    writeln!(out, "History cleared.")?;
                    continue;
                }
                _ => {}
            }

            let request = ChatTurnRequest {
                text: text.to_string(),
                system_prompt: args.options.system_prompt.clone(),
                model: Some(model.clone()),
                temperature: args.options.temperature,
                samples: args.samples,
                api_key: args.options.api_key.clone(),
            };
            match self.service.chat_turn(&mut state, request).await {
                Ok(outcome) => writeln!(out, "{}", render_chat_turn(&outcome))?,
                // Would fail identically on every later line.
                Err(err @ (CoreError::MissingCredential { .. } | CoreError::InvalidRequest(_))) => {
                    return Err(err.into());
                }
                Err(err) => writeln!(out, "{err}")?,
            }
            out.flush()?;
        }
        Ok(())
    }

    async fn models_command(&self, args: ModelsArgs) -> Result<()> {
        let listings = self.service.list_models(args.api_key).await?;

        if let Some(model_id) = args.describe {
            let Some(listing) = listings.iter().find(|l| l.model_id == model_id) else {
                bail!("Model {model_id} not found in pricing catalog");
            };
            println!("{}", render_description(listing));
            return Ok(());
        }

        if args.json {
            println!("{}", serde_json::to_string_pretty(&listings)?);
        } else if listings.is_empty() {
            println!("No models available (the pricing catalog could not be loaded).");
        } else {
            for listing in &listings {
                println!("{}", render_listing(listing));
            }
        }
        Ok(())
    }
}

pub fn render_sample_report(outcome: &SampleOutcome) -> String {
    outcome
        .responses
        .iter()
        .enumerate()
        .map(|(index, report)| {
            let mut block = format!("Response {}:\n{}", index + 1, report.text());
            if !report.is_error() {
                if let Some(usage) = &report.usage {
                    block.push_str(&format!(
                        "\nTokens: prompt: {}, completion: {}",
                        usage.prompt_tokens, usage.completion_tokens
                    ));
                }
                block.push('\n');
                block.push_str(&cost_line(&report.cost));
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn cost_line(cost: &CostReport) -> String {
    match cost {
        CostReport::Priced(breakdown) => format!(
            "Cost: total: {}, prompt: {}, completion: {}",
            format_usd(breakdown.total_cost),
            format_usd(breakdown.prompt_cost),
            format_usd(breakdown.completion_cost)
        ),
        CostReport::UnknownModel { message } => format!("Error: {message}"),
        CostReport::UsageUnavailable => "Usage information not available".to_string(),
    }
}

/// Short caption shown under a chat reply.
pub fn cost_caption(report: &UnitReport) -> String {
    match (&report.cost, &report.usage) {
        (CostReport::Priced(breakdown), Some(usage)) => format!(
            "Cost: {}, Tokens: {}",
            format_usd(breakdown.total_cost),
            usage.total_tokens()
        ),
        (CostReport::UnknownModel { message }, _) => format!("Error: {message}"),
        _ => "Usage information not available".to_string(),
    }
}

fn render_chat_turn(outcome: &ChatTurnOutcome) -> String {
    let render = |report: &UnitReport| {
        if report.is_error() {
            report.text().to_string()
        } else {
            format!("{}\n{}", report.text(), cost_caption(report))
        }
    };

    match outcome.responses.as_slice() {
        [single] => render(single),
        many => many
            .iter()
            .enumerate()
            .map(|(index, report)| format!("Candidate {}:\n{}", index + 1, render(report)))
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

pub fn render_listing(listing: &ModelListing) -> String {
    format!(
        "{}: ${:.4}/${:.4} per 1k tokens",
        listing.model_id, listing.prompt_price_per_1k, listing.completion_price_per_1k
    )
}

fn render_description(listing: &ModelListing) -> String {
    let description = listing.description.trim();
    let description = if description.is_empty() {
        "No description available."
    } else {
        description
    };
    format!("{}\n{description}", render_listing(listing))
}
