use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Promptbench CLI definition.
#[derive(Debug, Parser)]
#[command(name = "promptbench")]
#[command(
    about = "Prompt chat models through an LLM gateway, sample in parallel and track token cost",
    version
)]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        help = "Timestamps, targets and debug-level logs for promptbench"
    )]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub log_json: bool,

    #[arg(
        long,
        global = true,
        requires = "log_json",
        help = "Pretty-print JSON logs (with --log-json)"
    )]
    pub pretty: bool,

    #[arg(
        long,
        global = true,
        help = "Config file (defaults to ~/.promptbench/config.yaml when present)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "Read the pricing catalog from a models.json snapshot instead of the gateway"
    )]
    pub snapshot: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Send one prompt, optionally sampled several times in parallel.
    Ask(AskArgs),
    /// Interactive conversation over stdin (`/reset` clears history, `/exit` quits).
    Chat(ChatArgs),
    /// List the pricing catalog, preferred models first.
    Models(ModelsArgs),
    /// Serve the JSON API with in-memory chat sessions.
    Serve(ServeArgs),
}

/// Options shared by every command that talks to a chat model.
#[derive(Debug, Args, Clone, Default)]
pub struct PromptOptions {
    #[arg(long, help = "Model identifier (defaults to defaults.model from config)")]
    pub model: Option<String>,

    #[arg(long, help = "Sampling temperature between 0.0 and 2.0")]
    pub temperature: Option<f32>,

    #[arg(long = "system", help = "System prompt sent ahead of the conversation")]
    pub system_prompt: Option<String>,

    #[arg(long, help = "Gateway API key (can also come from OPENROUTER_API_KEY)")]
    pub api_key: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct AskArgs {
    #[arg(help = "Prompt text")]
    pub prompt: String,

    #[command(flatten)]
    pub options: PromptOptions,

    #[arg(long, default_value_t = 1, help = "Parallel responses to request")]
    pub samples: usize,

    #[arg(long, help = "Emit the full report as JSON")]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ChatArgs {
    #[command(flatten)]
    pub options: PromptOptions,

    #[arg(
        long,
        default_value_t = 1,
        help = "Side-by-side candidates per turn; more than 1 commits none to history"
    )]
    pub samples: usize,
}

#[derive(Debug, Args, Clone, Default)]
pub struct ModelsArgs {
    #[arg(long, value_name = "MODEL_ID", help = "Print the description of one model")]
    pub describe: Option<String>,

    #[arg(long, help = "Gateway API key (can also come from OPENROUTER_API_KEY)")]
    pub api_key: Option<String>,

    #[arg(long, help = "Emit the listing as JSON")]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1", help = "Address to bind")]
    pub host: String,

    #[arg(long, default_value_t = 8000, help = "Port to bind")]
    pub port: u16,

    #[arg(
        long,
        help = "Fallback gateway API key for requests without an Authorization header"
    )]
    pub api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_ask_command_with_global_flags() {
        let cli = Cli::parse_from([
            "promptbench",
            "ask",
            "what is 2+2?",
            "--samples",
            "3",
            "--model",
            "openai/gpt-4o",
            "--temperature",
            "0.3",
            "--system",
            "be brief",
            "-v",
            "--snapshot",
            "models.json",
        ]);

        assert!(cli.verbose);
        assert_eq!(cli.snapshot, Some(PathBuf::from("models.json")));
        match cli.command {
            Commands::Ask(ask) => {
                assert_eq!(ask.prompt, "what is 2+2?");
                assert_eq!(ask.samples, 3);
                assert_eq!(ask.options.model.as_deref(), Some("openai/gpt-4o"));
                assert_eq!(ask.options.temperature, Some(0.3));
                assert_eq!(ask.options.system_prompt.as_deref(), Some("be brief"));
                assert!(!ask.json);
            }
            _ => panic!("expected ask command"),
        }
    }

    #[test]
    fn pretty_requires_log_json() {
        assert!(Cli::try_parse_from(["promptbench", "--pretty", "models"]).is_err());
        let cli = Cli::try_parse_from(["promptbench", "--log-json", "--pretty", "models"]).unwrap();
        assert!(cli.log_json && cli.pretty);
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::parse_from(["promptbench", "serve"]);
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.host, "127.0.0.1");
                assert_eq!(args.port, 8000);
            }
            _ => panic!("expected serve command"),
        }
    }
}
