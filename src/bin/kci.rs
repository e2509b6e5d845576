//! kci: import Keycloak realms with a pool of workers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use realm_import::config::{Config, ConfigFile, file::default_path};
use realm_import::engine::{Dispatcher, Progress};
use realm_import::generate::{generate_realms, write_realm_files};
use realm_import::identity::KeycloakClient;
use realm_import::model::RealmRepresentation;
use realm_import::telemetry::{TelemetryConfig, init_telemetry};
use tracing::info;

#[derive(Parser)]
#[command(name = "kci", about = "Keycloak realm importer")]
struct Cli {
    /// Config file (default: ~/.kci.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import realm files into a Keycloak instance
    Import {
        /// Realm export files (JSON)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Generate synthetic realm files
    Generate {
        /// Number of realms to generate
        #[arg(long, default_value_t = 1)]
        realms: usize,
        /// Number of clients per realm
        #[arg(long, default_value_t = 10)]
        clients: usize,
        /// Number of users per realm
        #[arg(long, default_value_t = 10)]
        users: usize,
        /// Target directory
        #[arg(long, default_value = ".")]
        target: PathBuf,
    },
    /// Show or modify the persisted configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show a configuration value
    Get { key: String },
    /// Set a configuration value
    Set {
        key: String,
        /// Value to set
        #[arg(long)]
        value: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_path);

    match cli.command {
        Command::Import { files } => cmd_import(&config_path, files).await,
        Command::Generate {
            realms,
            clients,
            users,
            target,
        } => {
            let realms = generate_realms(realms, clients, users);
            let written = write_realm_files(&target, &realms)?;
            println!("{} realm file(s) written to {}", written.len(), target.display());
            Ok(())
        }
        Command::Config { action } => match action {
            ConfigAction::Get { key } => {
                let file = ConfigFile::load(&config_path)?;
                println!("{}", file.get(&key).unwrap_or_default());
                Ok(())
            }
            ConfigAction::Set { key, value } => {
                let mut file = ConfigFile::load(&config_path)?;
                file.set(&key, &value);
                file.save(&config_path)?;
                Ok(())
            }
        },
    }
}

async fn cmd_import(config_path: &Path, files: Vec<PathBuf>) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "kci".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let api = Arc::new(KeycloakClient::new(&config.keycloak_url, config.http_timeout)?);
    info!(workers = config.workers, "starting import");
    let mut dispatcher =
        Dispatcher::connect(api, config.credentials(), config.dispatcher()).await?;

    let results = dispatcher
        .results()
        .ok_or_else(|| anyhow::anyhow!("result stream already taken"))?;
    let progress = tokio::spawn(Progress::default().run(results));

    dispatcher.start();
    let imported = import_files(&mut dispatcher, &files).await;
    dispatcher.stop().await;

    let summary = progress.await?;
    imported?;

    println!(
        "IMPORT IS COMPLETE. {} objects processed, {} retries, {} errors",
        summary.processed, summary.retries, summary.errors
    );
    if summary.errors > 0 {
        anyhow::bail!("{} object(s) failed to import", summary.errors);
    }
    Ok(())
}

async fn import_files(
    dispatcher: &mut Dispatcher<KeycloakClient>,
    files: &[PathBuf],
) -> anyhow::Result<()> {
    for path in files {
        let content = tokio::fs::read(path).await?;
        let realm: RealmRepresentation = serde_json::from_slice(&content)
            .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
        dispatcher.import_realm(realm).await?;
    }
    Ok(())
}
