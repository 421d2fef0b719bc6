use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use powervs_client::config::Config;
use powervs_client::powervs::models::PvmInstanceCreate;
use powervs_client::secret::{get_api_key, ApiKey, DirectorySecretStore};
use powervs_client::{format_provider_id, Bootstrapper, Client, ClientSession};
use serde::Serialize;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Default directory of mounted secrets
const DEFAULT_SECRETS_DIR: &str = "/var/run/secrets";

/// Manage IBM Power Virtual Server instances
#[derive(Parser, Debug)]
#[command(name = "powervs", version, about, long_about = None)]
struct Args {
    /// Power VS cloud instance (service instance GUID)
    #[arg(long, env = "POWERVS_CLOUD_INSTANCE_ID", global = true)]
    cloud_instance_id: Option<String>,

    /// Secret holding the API key
    #[arg(long, global = true)]
    secret_name: Option<String>,

    /// Namespace of the secret
    #[arg(long, global = true)]
    namespace: Option<String>,

    /// Directory with mounted secrets (<dir>/<namespace>/<name>/<key>)
    #[arg(long, global = true)]
    secrets_dir: Option<PathBuf>,

    /// Environment variable to read the API key from, checked before the secret
    #[arg(long, default_value = "IBMCLOUD_API_KEY", global = true)]
    api_key_env: String,

    /// Log Power API response bodies
    #[arg(long, global = true)]
    debug: bool,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List instances
    Instances,
    /// Show one instance by id
    Instance { id: String },
    /// Show one instance by server name
    InstanceByName { name: String },
    /// Create instances from a JSON body
    Create {
        #[arg(long)]
        params: PathBuf,
    },
    /// Delete an instance
    Delete { id: String },
    /// List networks
    Networks,
    /// List images
    Images,
    /// List Power VS service instances in the account
    ServiceInstances,
    /// Print the provider id for an instance id
    ProviderId { id: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stderr());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .init();

    tracing::debug!("powervs started with log level: {:?}", level);

    Some(guard)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn load_api_key(args: &Args, config: &Config) -> Result<ApiKey> {
    if let Ok(key) = std::env::var(&args.api_key_env) {
        if !key.is_empty() {
            return Ok(ApiKey::new(key));
        }
    }

    let secrets_dir = args
        .secrets_dir
        .clone()
        .or_else(|| config.secrets_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRETS_DIR));
    let name = args
        .secret_name
        .clone()
        .unwrap_or_else(|| config.effective_secret_name());
    let namespace = args
        .namespace
        .clone()
        .unwrap_or_else(|| config.effective_namespace());

    let store = DirectorySecretStore::new(secrets_dir);
    get_api_key(&store, &name, &namespace)
        .await
        .with_context(|| format!("Failed to read API key from secret {}/{}", namespace, name))
}

async fn full_session(args: &Args, bootstrapper: &Bootstrapper, api_key: ApiKey) -> Result<ClientSession> {
    let cloud_instance_id = args
        .cloud_instance_id
        .as_deref()
        .context("--cloud-instance-id is required for this command")?;

    bootstrapper
        .full(api_key, cloud_instance_id)
        .await
        .context("Failed to initialize Power VS session")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    if let Command::ProviderId { id } = &args.command {
        println!("{}", format_provider_id(id));
        return Ok(());
    }

    let config = Config::load();
    let api_key = load_api_key(&args, &config).await?;
    let bootstrapper = Bootstrapper::new(config.endpoints())?.with_debug(args.debug);

    if let Command::ServiceInstances = &args.command {
        let session = bootstrapper.minimal(api_key)?;
        return print_json(&session.get_cloud_service_instances().await?);
    }

    let session = full_session(&args, &bootstrapper, api_key).await?;

    match &args.command {
        Command::Instances => print_json(&session.get_instances().await?),
        Command::Instance { id } => print_json(&session.get_instance(id).await?),
        Command::InstanceByName { name } => match session.get_instance_by_name(name).await {
            Ok(instance) => print_json(&instance),
            Err(e) if e.is_instance_not_found() => {
                anyhow::bail!("No instance named {}", name)
            }
            Err(e) => Err(e.into()),
        },
        Command::Create { params } => {
            let content = std::fs::read_to_string(params)
                .with_context(|| format!("Failed to read {:?}", params))?;
            let body: PvmInstanceCreate =
                serde_json::from_str(&content).context("Invalid instance parameters")?;
            print_json(&session.create_instance(&body).await?)
        }
        Command::Delete { id } => {
            session.delete_instance(id).await?;
            println!("Deleted {}", format_provider_id(id));
            Ok(())
        }
        Command::Networks => print_json(&session.get_networks().await?),
        Command::Images => print_json(&session.get_images().await?),
        Command::ServiceInstances | Command::ProviderId { .. } => Ok(()),
    }
}
