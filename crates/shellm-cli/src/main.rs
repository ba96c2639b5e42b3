use std::env;
use std::io::{Read, Write};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;

use shellm::agent::{process_query, Agent, QueryRequest};
use shellm::config::Config;
use shellm::providers::base::GenerateParams;
use shellm::providers::configs::{
    CerebrasProviderConfig, GroqProviderConfig, ProviderConfig, CEREBRAS_DEFAULT_MODEL,
    GROQ_DEFAULT_MODEL,
};
use shellm::providers::registry::{create_provider, ProviderRegistry, ProviderType};
use shellm::tools::Toolbox;
use shellm::trace::Trace;

#[derive(Parser)]
#[command(author, version, about = "Turn natural language into shell commands", long_about = None)]
struct Cli {
    /// Override the configured tool-call round limit
    #[arg(long)]
    max_rounds: Option<usize>,
}

/// One request on stdin, as sent by the shell integration.
#[derive(Deserialize)]
struct StdinRequest {
    query: String,
    cwd: Option<String>,
    #[serde(default = "default_shell")]
    shell: String,
    #[serde(default = "default_os")]
    os: String,
}

fn default_shell() -> String {
    "zsh".to_string()
}

fn default_os() -> String {
    "linux".to_string()
}

/// Read the request from stdin. Anything unparseable means the caller is
/// broken; exit silently so no garbage lands on the command line.
fn read_request() -> Option<StdinRequest> {
    let mut raw = String::new();
    std::io::stdin().read_to_string(&mut raw).ok()?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str::<StdinRequest>(raw) {
        Ok(request) if !request.query.trim().is_empty() => Some(request),
        Ok(_) => None,
        Err(e) => {
            tracing::error!("invalid request on stdin: {e}");
            None
        }
    }
}

/// Recent terminal history from the environment, capped to the last
/// `limit` lines.
fn load_history(limit: usize) -> String {
    let Ok(history) = env::var("SHELLM_HISTORY") else {
        return String::new();
    };
    let lines: Vec<&str> = history.lines().collect();
    let start = lines.len().saturating_sub(limit);
    lines[start..].join("\n")
}

fn request_timeout() -> Duration {
    let seconds = env::var("SHELLM_TIMEOUT")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(30);
    Duration::from_secs(seconds)
}

/// Register every provider whose credential is present.
fn build_registry(config: &Config) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    if let Ok(api_key) = env::var("GROQ_API_KEY") {
        let model = config
            .model
            .clone()
            .or_else(|| env::var("SHELLM_GROQ_MODEL").ok())
            .unwrap_or_else(|| GROQ_DEFAULT_MODEL.to_string());
        let groq_config = GroqProviderConfig::new(api_key, model).with_timeout(request_timeout());
        match create_provider(ProviderConfig::Groq(groq_config)) {
            Ok(provider) => registry.register(ProviderType::Groq, provider),
            Err(e) => tracing::error!("groq: {e}"),
        }
    }

    if let Ok(api_key) = env::var("CEREBRAS_API_KEY") {
        let model = config
            .model
            .clone()
            .or_else(|| env::var("SHELLM_CEREBRAS_MODEL").ok())
            .unwrap_or_else(|| CEREBRAS_DEFAULT_MODEL.to_string());
        match create_provider(ProviderConfig::Cerebras(CerebrasProviderConfig {
            api_key,
            model,
        })) {
            Ok(provider) => registry.register(ProviderType::Cerebras, provider),
            Err(e) => tracing::warn!("cerebras: {e}"),
        }
    }

    registry
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("shellm=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    dotenv::dotenv().ok();

    let Some(request) = read_request() else {
        std::process::exit(1);
    };

    let config = Config::load(None);

    let cwd = match request.cwd {
        Some(cwd) => cwd,
        None => env::current_dir()?.to_string_lossy().into_owned(),
    };
    let query = QueryRequest {
        query: request.query,
        cwd: cwd.clone(),
        shell: request.shell,
        os: request.os,
        history: load_history(config.history_lines),
    };

    let mut registry = build_registry(&config);
    registry.initialize_all().await;

    let provider = match registry.take(config.provider) {
        Ok(provider) => provider,
        Err(e) => {
            print!("# Error: {e}");
            std::io::stdout().flush()?;
            return Ok(());
        }
    };

    let mut agent = Agent::new(provider)
        .with_toolbox(Toolbox::new(&cwd, config.max_file_lines))
        .with_max_rounds(cli.max_rounds.unwrap_or(config.max_rounds))
        .with_trace(Trace::from_flag(config.debug));

    let command = process_query(&agent, &query, &GenerateParams::default()).await;
    agent.cleanup().await;

    // No trailing newline: the shell integration splices this directly
    // into the prompt buffer
    print!("{command}");
    std::io::stdout().flush()?;
    Ok(())
}
