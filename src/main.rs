mod commands;
mod config;
mod engine;
mod form;
mod llm;
mod models;
mod session;
mod transcript;
mod ui;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::engine::ConversationEngine;
use crate::form::FormFields;
use crate::llm::LlmClient;
use crate::session::SessionContext;

#[derive(Parser)]
#[command(name = "promptpad")]
#[command(version)]
#[command(about = "Prompt-configurable LLM chat playground", long_about = None)]
struct Cli {
    /// Model label override (see `promptpad models`)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available model labels
    Models,
    /// Run a single streamed turn without the TUI
    Ask { text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    if let Some(label) = cli.model {
        // Unregistered labels fail here, before anything else runs.
        models::resolve(&label)?;
        config.default_model = label;
    }

    match cli.command {
        Some(Commands::Models) => {
            for spec in models::catalog() {
                println!("{:<18} {}", spec.label, spec.qualified());
            }
            Ok(())
        }
        Some(Commands::Ask { text }) => ask(config, text).await,
        None => {
            let spec = models::resolve(&config.default_model)?;
            config.require_api_key(spec.provider)?;
            ui::run(config).await
        }
    }
}

/// One streamed turn straight to stdout.
async fn ask(config: Config, text: String) -> Result<()> {
    if text.trim().is_empty() {
        bail!("nothing to ask: message text is empty");
    }

    let spec = models::resolve(&config.default_model)?;
    config.require_api_key(spec.provider)?;

    let engine = ConversationEngine::new(LlmClient::new(config.clone())?);
    let mut session = SessionContext::new(config.prompt_mode, &config.default_model);
    let fields = FormFields::default();

    let mut turn = engine.submit_user_turn(&mut session, &fields, text).await?;
    let mut stdout = std::io::stdout();
    while let Some(fragment) = turn.next_fragment().await {
        print!("{fragment}");
        stdout.flush()?;
    }
    engine.complete_turn(&mut session, turn.finish())?;
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ask_rejects_blank_text() {
        let err = ask(Config::default(), "   ".to_string()).await.unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
