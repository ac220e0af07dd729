// toolloop-cli/src/main.rs
mod models {
    pub mod cli;
}
mod rendering;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use colored::*;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, time::LocalTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use toolloop_core::coercion::weather_report_schema;
use toolloop_core::tools::weather::{weather_registry, USER_ID_KEY};
use toolloop_core::{
    Agent, AgentConfig, CancellationToken, ChatMessage, ExecutionContext, LoopError,
    ProviderRegistry, StructuredOutputCoercer,
};

use crate::models::cli::Cli;

const CONFIG_FILENAME: &str = "ToolLoop.toml";
const LOG_FILE_NAME: &str = "toolloop.log";
const USER_ID_ENV_VAR: &str = "TOOLLOOP_USER_ID";

/// Walks up from `start` to the first directory holding a `ToolLoop.toml`.
fn find_config_file(start: &Path) -> Result<PathBuf> {
    let mut current = start;
    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.is_file() {
            return Ok(config_path);
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => {
                return Err(anyhow!(
                    "Could not find '{}' in {} or any parent directory.",
                    CONFIG_FILENAME,
                    start.display()
                ));
            }
        }
    }
}

fn load_cli_config(explicit_path: Option<&Path>) -> Result<(AgentConfig, PathBuf)> {
    let config_path = match explicit_path {
        Some(path) => path.to_path_buf(),
        None => {
            let current_dir = env::current_dir().context("Failed to get current directory")?;
            find_config_file(&current_dir)?
        }
    };
    info!("Using configuration file at: {:?}", config_path);
    let config_toml_content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
    let agent_config = AgentConfig::from_toml_str(&config_toml_content)
        .context("Failed to parse or validate configuration content")?;
    Ok((agent_config, config_path))
}

/// The host decides who is asking; the model never sees this value.
fn build_context(user_id: Option<String>) -> ExecutionContext {
    let mut builder = ExecutionContext::builder();
    if let Some(id) = user_id.filter(|id| !id.trim().is_empty()) {
        builder = builder.insert(USER_ID_KEY, id.trim());
    }
    builder.build()
}

fn read_prompt_from_stdin() -> Result<String> {
    print!("{} ", "Ask about the weather:".yellow().bold());
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut buffer = String::new();
    io::stdin()
        .read_line(&mut buffer)
        .context("Failed to read line from stdin")?;
    let prompt = buffer.trim().to_string();
    if prompt.is_empty() {
        bail!("No question given.");
    }
    Ok(prompt)
}

fn init_logging(verbose: u8) -> Result<(WorkerGuard, PathBuf)> {
    let default_level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(default_level.into()));

    let log_dir = dirs::cache_dir()
        .or_else(dirs::runtime_dir)
        .unwrap_or_else(env::temp_dir)
        .join("toolloop");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let log_path = log_dir.join(LOG_FILE_NAME);

    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let time_format = time::format_description::parse(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]",
    )
    .context("Failed to parse log time format")?;
    let local_timer = LocalTime::new(time_format);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_timer(local_timer.clone());

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(local_timer)
        .with_target(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    info!(
        "Logging initialized. Level determined by RUST_LOG or -v flags (default: {}). Logging to stderr and {}",
        default_level,
        log_path.display()
    );
    Ok((guard, log_path))
}

async fn run(cli: Cli) -> Result<()> {
    let registry = Arc::new(weather_registry()?);

    if cli.list_tools {
        for line in rendering::format_tool_list(&registry) {
            println!("{}", line);
        }
        return Ok(());
    }

    let (config, config_path) = load_cli_config(cli.config.as_deref())?;
    debug!(path = %config_path.display(), "Configuration loaded.");

    let mut loop_config = config.loop_settings.clone();
    if let Some(max_rounds) = cli.max_rounds {
        if max_rounds == 0 {
            bail!("--max-rounds must be at least 1.");
        }
        loop_config.max_rounds = max_rounds;
    }

    let http_client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    let providers = ProviderRegistry::from_config(&config, http_client, |id, provider_conf| {
        Ok(provider_conf.resolve_api_key().unwrap_or_else(|e| {
            warn!(provider_id = %id, error = %e, "API key not available; continuing without one");
            String::new()
        }))
    })?;
    let provider = match &cli.provider {
        Some(id) => providers.get(id)?,
        None => providers.default()?,
    };
    info!(provider = %provider.name(), "Selected provider.");

    let user_id = cli.user_id.clone().or_else(|| env::var(USER_ID_ENV_VAR).ok());
    let context = build_context(user_id);

    let prompt = match cli.prompt_text() {
        Some(prompt) => prompt,
        None => read_prompt_from_stdin()?,
    };

    let agent = Agent::new(provider.clone(), registry, loop_config.clone())
        .with_system_prompt(config.system_prompt.clone());

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run.");
            interrupt.cancel();
        }
    });

    let output = match agent
        .run(vec![ChatMessage::user(prompt)], &context, &cancel)
        .await
    {
        Ok(output) => output,
        Err(LoopError::MissingExecutionContext { tool, key }) => {
            return Err(anyhow!(
                "Tool '{}' needs the '{}' context value. Pass --user-id <ID> or set {}.",
                tool,
                key,
                USER_ID_ENV_VAR
            ));
        }
        Err(e) => return Err(anyhow!(e).context("Agent run encountered an error")),
    };
    info!(rounds = output.rounds, "Agent run completed.");

    rendering::print_tool_summary(&output.applied_tool_results);
    rendering::print_final_answer(&output.final_message);

    if cli.structured {
        let coercer = StructuredOutputCoercer::new(provider, loop_config.oracle_timeout());
        let record = coercer
            .coerce(&output.final_message, &weather_report_schema(), &cancel)
            .await
            .context("Failed to produce a structured weather report")?;
        rendering::print_structured(&record)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _log_guard = match init_logging(cli.verbose) {
        Ok((guard, _)) => guard,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red(), e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Operation failed: {:#}", e);
            eprintln!("{} {:#}", "Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}
