use anyhow::{Context, Result};
use campus::config::{self, ClientConfig};
use campus::{get_client, load_embedded, Verb};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Command-line client for the Campus API
#[derive(Parser, Debug)]
#[command(name = "campus", version, about, long_about = None)]
struct Args {
    /// API base URL (overrides config file and CAMPUS_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token (overrides config file and CAMPUS_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Call an operation on a resource, e.g. `call GET users/alice`
    Call {
        verb: Verb,
        path: String,
        /// JSON request body
        #[arg(long)]
        data: Option<String>,
    },
    /// List every resource path with its operations
    Tree,
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

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();
    let file = open_log_file(&log_path)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("campus started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn open_log_file(log_path: &Path) -> Result<File> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }

    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("campus").join("campus.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".campus").join("campus.log");
    }
    PathBuf::from("campus.log")
}

/// Defaults < config file < environment < flags
fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut merged = config::default_values()?;

    let file = args.config.clone().or_else(config::user_config_path);
    if let Some(path) = file {
        let layer = config::load_file(&path)
            .with_context(|| format!("failed to load config file {}", path.display()))?;
        config::merge(&mut merged, layer);
    }

    config::merge(&mut merged, config::env_overrides(|var| std::env::var(var).ok()));

    let mut flags = serde_json::Map::new();
    if let Some(base_url) = &args.base_url {
        flags.insert("base_url".to_string(), json!(base_url));
    }
    if let Some(token) = &args.token {
        flags.insert("token".to_string(), json!(token));
    }
    config::merge(&mut merged, Value::Object(flags));

    Ok(ClientConfig::from_value(merged)?)
}

fn print_tree() -> Result<()> {
    let (_, tree) = load_embedded().context("embedded resource tree is invalid")?;
    for (path, node) in tree.root().walk() {
        let operations: Vec<&str> = node.operations().map(|v| v.as_str()).collect();
        if operations.is_empty() {
            println!("{}", path);
        } else {
            println!("{}  [{}]", path, operations.join(", "));
        }
    }
    Ok(())
}

async fn call(args: &Args, verb: Verb, path: &str, data: Option<&str>) -> Result<()> {
    let config = load_config(args).context("invalid configuration")?;
    tracing::info!("Using {} ({})", config.base_url, config.version);

    let body = data
        .map(|d| serde_json::from_str::<Value>(d))
        .transpose()
        .context("`--data` is not valid JSON")?;

    let root = get_client(config)?;
    let resource = root.at(path)?;
    let response = resource
        .invoke(verb, body)
        .await
        .with_context(|| format!("{} {} failed", verb, resource))?;

    if !response.is_null() {
        println!("{}", serde_json::to_string_pretty(&response)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    match &args.command {
        Command::Tree => print_tree(),
        Command::Call { verb, path, data } => call(&args, *verb, path, data.as_deref()).await,
    }
}
