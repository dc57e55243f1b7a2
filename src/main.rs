mod tracing_setup;

use std::{
    fs,
    net::SocketAddr,
    path::Path,
    process::ExitCode,
    sync::{Arc, OnceLock},
};

use anyhow::{Context as AnyhowContext, Result};
use clap::Parser;
use uuid::Uuid;

use promptbench::{
    adapters::{
        OpenRouterGateway, SnapshotCatalogSource, SystemClock,
        inbound::{
            cli::{CliAdapter, Cli, Commands, ServeArgs},
            server::ServerAdapter,
        },
    },
    application::{AppService, CatalogCache, CompletionClient, CredentialResolver, ServiceDefaults},
    config::PromptbenchConfig,
    core::{
        Credential,
        ports::{CatalogSource, PromptService},
    },
    paths,
};
use tracing_setup::StdoutFormat;

static ENV_FILES_ONCE: OnceLock<()> = OnceLock::new();

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    ensure_env_files_loaded();

    let format = StdoutFormat::from_flags(cli.log_json, cli.pretty);
    let run_id = Uuid::new_v4().to_string();
    let _guard = tracing_setup::init(cli.verbose, format, &run_id);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("Command failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = PromptbenchConfig::load(cli.config.as_deref())?;
    if let Some(snapshot) = cli.snapshot {
        config.catalog.snapshot = Some(snapshot);
    }

    let fallback_key = match &cli.command {
        Commands::Serve(args) => args.api_key.clone(),
        _ => None,
    };
    let service = build_service(&config, fallback_key)?;

    match cli.command {
        Commands::Serve(args) => serve_command(args, service).await,
        command => CliAdapter::new(service).execute(command).await,
    }
}

/// Wires outbound adapters into the application service.
fn build_service(
    config: &PromptbenchConfig,
    fallback_key: Option<String>,
) -> Result<Arc<dyn PromptService>> {
    let gateway = Arc::new(
        OpenRouterGateway::new(&config.gateway).context("Failed to build gateway client")?,
    );
    let source: Arc<dyn CatalogSource> = match &config.catalog.snapshot {
        Some(path) => Arc::new(SnapshotCatalogSource::new(path.clone())),
        None => gateway.clone(),
    };
    let catalog = Arc::new(CatalogCache::new(
        source,
        Arc::new(SystemClock::new()),
        config.catalog.ttl(),
    ));
    let credential_resolver: CredentialResolver = Arc::new(move |explicit: Option<String>| {
        Credential::from_cli_or_env(explicit.or_else(|| fallback_key.clone()))
    });

    Ok(Arc::new(AppService::new(
        ServiceDefaults::from(config),
        CompletionClient::new(gateway),
        catalog,
        credential_resolver,
    )))
}

async fn serve_command(args: ServeArgs, service: Arc<dyn PromptService>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;
    println!("Serving promptbench API on http://{addr}");
    ServerAdapter::new(service).run(addr).await
}

/// Seeds the environment from `./.env`, then `~/.env`, never overriding variables
/// that are already set.
fn ensure_env_files_loaded() {
    ENV_FILES_ONCE.get_or_init(|| {
        load_env_file(Path::new(".env"));
        if let Some(path) = paths::env_file() {
            load_env_file(&path);
        }
    });
}

fn load_env_file(path: &Path) {
    if let Ok(contents) = fs::read_to_string(path) {
        apply_env_contents(&contents);
    }
}

fn apply_env_contents(contents: &str) {
    for line in contents.lines() {
        if let Some((key, value)) = parse_env_assignment(line)
            && std::env::var_os(&key).is_none()
        {
            unsafe {
                std::env::set_var(&key, &value);
            }
        }
    }
}

fn parse_env_assignment(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed).trim();

    let (key, value) = trimmed.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let value = normalize_env_value(value.trim());
    Some((key.to_string(), value))
}

fn normalize_env_value(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
    {
        return trimmed[1..trimmed.len() - 1].to_string();
    }
    trimmed.to_string()
}
