use std::fs;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use walkdir::WalkDir;

/// Dependencies and layers that the domain core must stay independent of.
const CORE_FORBIDDEN: &[&str] = &["crate::adapters", "crate::application", "reqwest", "axum"];

/// Application code may use ports, never concrete adapters.
const APPLICATION_FORBIDDEN: &[&str] = &["crate::adapters", "reqwest", "axum"];

#[derive(Parser)]
#[command(author, version, about = "Workspace maintenance tasks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run layering guardrails over the library sources.
    CheckArchitecture,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::CheckArchitecture => check_architecture(),
    }
}

fn check_architecture() -> Result<()> {
    let mut offenders = Vec::new();
    for needle in CORE_FORBIDDEN {
        offenders.extend(find_pattern("src/core", needle)?);
    }
    for needle in APPLICATION_FORBIDDEN {
        offenders.extend(find_pattern("src/application", needle)?);
    }

    if offenders.is_empty() {
        println!("architecture check passed");
        Ok(())
    } else {
        Err(anyhow!(
            "Layering violations found:\n  {}",
            offenders.join("\n  ")
        ))
    }
}

fn find_pattern(dir: &str, needle: &str) -> Result<Vec<String>> {
    let mut offenders = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                offenders.push(format!("{dir} (walk error: {e})"));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|ext| ext.to_str()) != Some("rs") {
            continue;
        }
        let content = fs::read_to_string(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        if let Some(line) = non_test_lines(&content).find(|line| line.contains(needle)) {
            offenders.push(format!(
                "{} references '{needle}': {}",
                entry.path().display(),
                line.trim()
            ));
        }
    }
    Ok(offenders)
}

/// Lines before the first `#[cfg(test)]`; test modules may use adapters as fakes.
fn non_test_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .take_while(|line| !line.trim_start().starts_with("#[cfg(test)]"))
}
