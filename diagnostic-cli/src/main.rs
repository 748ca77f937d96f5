use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

use diagnostic_engine::{DiagnosticService, EngineConfig, EngineError, KnowledgeBase};
use error_common::ClassifiedError;
use logger_redacted::{init_tracing, LogFormat, LoggerConfig};

/// CareSense clinical decision-support engine
#[derive(Parser, Debug)]
#[command(name = "caresense")]
#[command(about = "Symptom matching, risk scoring and image-finding synthesis")]
#[command(version)]
struct Cli {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long, env = "CARESENSE_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run inference on a JSON request and print the result
    Infer {
        /// Request file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        request: String,
    },
    /// Load and validate a knowledge base file
    ValidateKb {
        path: PathBuf,
    },
    /// List the symptom vocabulary
    Vocabulary,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logger = LoggerConfig::from_env();
    if cli.verbose {
        logger = logger.verbose();
    }
    if cli.json_logs {
        logger.format = LogFormat::Json;
    }
    if let Err(e) = init_tracing(&logger) {
        eprintln!("{}: {}", "Failed to initialize logging".bright_red(), e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_failure(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = EngineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Infer { request } => {
            let raw = read_request(&request).await?;
            let service = DiagnosticService::new(config)?;
            let result = service.infer_json(&raw).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::ValidateKb { path } => {
            let kb = KnowledgeBase::from_path(&path)?;
            println!(
                "✅ {} {} (version {}, {} symptoms, {} diseases)",
                "Knowledge base is valid:".bright_green(),
                path.display(),
                kb.version(),
                kb.symptoms().count(),
                kb.diseases().len()
            );
        }
        Command::Vocabulary => {
            let kb = KnowledgeBase::load(config.knowledge_base_path.as_deref())?;
            for symptom in kb.symptoms() {
                println!(
                    "{:<24} {:<18} {}",
                    symptom.id.bright_cyan(),
                    symptom.system.bright_white(),
                    symptom.aliases.join(", ")
                );
            }
            info!(symptoms = kb.symptoms().count(), "Listed vocabulary");
        }
    }

    Ok(())
}

async fn read_request(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut raw = String::new();
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .context("failed to read request from stdin")?;
        return Ok(raw);
    }

    let path = Path::new(source);
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read request file {}", path.display()))
}

/// Engine failures are printed as the structured error response on stdout
fn report_failure(e: &anyhow::Error) {
    match e.downcast_ref::<EngineError>() {
        Some(engine_error) => {
            error!(error_kind = %engine_error.kind(), "Command failed");
            let response = engine_error.to_response();
            match serde_json::to_string_pretty(&response) {
                Ok(json) => println!("{}", json),
                Err(_) => eprintln!("{}: {}", "Error".bright_red(), engine_error),
            }
        }
        None => {
            error!("Command failed: {:#}", e);
            eprintln!("{}: {:#}", "Error".bright_red(), e);
        }
    }
}
