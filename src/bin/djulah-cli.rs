use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use djulah_gateway::config::{load_config, ConfigError};

#[derive(Parser)]
#[command(name = "djulah-cli")]
#[command(about = "Operator CLI for the Djulah API gateway", long_about = None)]
struct Cli {
    /// Base URL of a running gateway.
    #[arg(short, long, env = "GATEWAY_URL", default_value = "http://localhost:5000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the health endpoint
    Health,
    /// Show the welcome banner and advertised endpoints
    Info,
    /// Download the OpenAPI document
    Docs,
    /// Load and validate configuration without starting the server
    CheckConfig {
        #[arg(short, long, env = "GATEWAY_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let base = cli.url.trim_end_matches('/');
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{base}/api/health")).send().await?;
            print_response(res).await?;
        }
        Commands::Info => {
            let res = client.get(format!("{base}/api")).send().await?;
            print_response(res).await?;
        }
        Commands::Docs => {
            let res = client.get(format!("{base}/api-docs.json")).send().await?;
            print_response(res).await?;
        }
        Commands::CheckConfig { config } => {
            let _ = dotenvy::dotenv();
            match load_config(config.as_deref()) {
                Ok(mut loaded) => {
                    if loaded.database.url.is_some() {
                        loaded.database.url = Some("<redacted>".to_string());
                    }
                    println!("{}", toml::to_string_pretty(&loaded)?);
                    eprintln!("Configuration OK");
                }
                Err(ConfigError::Validation(errors)) => {
                    for error in errors {
                        eprintln!("error: {error}");
                    }
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {status}");
        if let Ok(text) = res.text().await {
            eprintln!("Response: {text}");
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
