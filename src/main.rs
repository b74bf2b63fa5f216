// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use plexor::{builtin_plugins, reader, ConfigError, NamerRegistry, ProtocolRegistry};

#[derive(Parser)]
#[command(name = "plexor", version, about = "Router configuration compiler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a configuration document and report whether it is valid.
    Check {
        /// Path to the YAML or JSON configuration file.
        file: String,
        /// Emit the result as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Check { file, json } => check(&file, json).await,
    }
}

async fn check(file: &str, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read configuration file '{}'", file))?;

    let protocols = ProtocolRegistry::new();
    let namers = NamerRegistry::new();
    builtin_plugins::register_defaults(&protocols, &namers)?;

    match reader::compile(&text, &protocols, &namers) {
        Ok(linker) => {
            if json {
                let routers: Vec<_> = linker
                    .routers
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "label": r.label,
                            "protocol": r.protocol.name(),
                            "dstPrefix": r.dst_prefix.to_string(),
                            "addrs": r.addrs(),
                        })
                    })
                    .collect();
                let report = serde_json::json!({
                    "valid": true,
                    "admin": linker.admin.addr,
                    "routers": routers,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                info!(file, routers = linker.routers.len(), "configuration is valid");
                for router in &linker.routers {
                    println!(
                        "router '{}' ({}) dstPrefix={} addrs={:?}",
                        router.label,
                        router.protocol.name(),
                        router.dst_prefix,
                        router.addrs()
                    );
                }
            }
            Ok(())
        }
        Err(errors) => {
            if json {
                let report = serde_json::json!({
                    "valid": false,
                    "errors": errors,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                error!(file, errors = errors.len(), "configuration rejected");
                for e in &errors {
                    eprintln!("{}: {}", category_label(e), e);
                }
            }
            std::process::exit(1);
        }
    }
}

fn category_label(error: &ConfigError) -> &'static str {
    match error.category() {
        plexor::ErrorCategory::FieldLevel => "field",
        plexor::ErrorCategory::CrossObject => "conflict",
        plexor::ErrorCategory::Structural => "structure",
        plexor::ErrorCategory::Plugin => "plugin",
        plexor::ErrorCategory::Syntax => "syntax",
    }
}
