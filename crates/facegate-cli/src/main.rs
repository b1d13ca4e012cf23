use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use clap::{Parser, Subcommand};
use facegate_core::{ConfigUpdate, VerificationReport};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "facegate", about = "Face verification service client")]
struct Cli {
    /// Base URL of a running facegated instance.
    #[arg(long, global = true, default_value = "http://127.0.0.1:5100")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify that a profile photo and an ID photo show the same person
    Verify {
        /// Path to the profile photo (JPEG or PNG)
        profile: PathBuf,
        /// Path to the ID photo (JPEG or PNG)
        id: PathBuf,
    },
    /// Check daemon liveness
    Health,
    /// Show or update verification settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current settings
    Show,
    /// Update one or more settings
    Set {
        #[arg(long)]
        tolerance: Option<f32>,
        #[arg(long)]
        confidence_threshold: Option<f32>,
        #[arg(long)]
        max_content_length: Option<usize>,
    },
}

fn data_uri(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mime = match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("bmp") => "image/bmp",
        _ => "image/jpeg",
    };
    Ok(format!(
        "data:{mime};base64,{}",
        general_purpose::STANDARD.encode(bytes)
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Verify { profile, id } => {
            let body = serde_json::json!({
                "profile_image": data_uri(&profile)?,
                "id_image": data_uri(&id)?,
            });
            let response = client
                .post(format!("{}/verify", cli.server))
                .json(&body)
                .send()
                .await
                .context("sending verify request")?;
            let report: VerificationReport =
                response.json().await.context("parsing verify response")?;

            println!("{}", serde_json::to_string_pretty(&report)?);
            if let Some(error) = report.error {
                bail!("verification failed: {error}");
            }
            if !report.is_match {
                std::process::exit(1);
            }
        }
        Commands::Health => {
            let status: serde_json::Value = client
                .get(format!("{}/health", cli.server))
                .send()
                .await
                .context("reaching the daemon")?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let config: serde_json::Value = client
                    .get(format!("{}/config", cli.server))
                    .send()
                    .await
                    .context("fetching configuration")?
                    .json()
                    .await?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::Set {
                tolerance,
                confidence_threshold,
                max_content_length,
            } => {
                let update = ConfigUpdate {
                    tolerance,
                    confidence_threshold,
                    max_content_length,
                };
                let response = client
                    .post(format!("{}/config", cli.server))
                    .json(&update)
                    .send()
                    .await
                    .context("updating configuration")?;
                let status = response.status();
                let body: serde_json::Value = response.json().await?;
                println!("{}", serde_json::to_string_pretty(&body)?);
                if !status.is_success() {
                    bail!("configuration update rejected");
                }
            }
        },
    }

    Ok(())
}
