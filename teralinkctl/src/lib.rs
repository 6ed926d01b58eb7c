use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use teralink_core::{
    load_bot_config, load_bot_config_with, ActionLink, BotConfig, ChatRef, DeliveryStyle,
    Dispatcher, Pipeline, PipelineError, RunLoop, RunLoopConfig, TelegramTransport,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] teralink_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("{}", .0.user_message())]
    Pipeline(PipelineError),
    #[error("one or more checks failed")]
    CheckFailed,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "TeraBox direct-link bot", long_about = None)]
pub struct Cli {
    /// Path to teralink.toml
    #[arg(long, default_value = "configs/teralink.toml")]
    pub config: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Starts the bot and polls until terminated
    Run,
    /// Resolves one link and prints what the bot would send
    Resolve(ResolveArgs),
    /// Validates the configuration without contacting any service
    Check,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Message text containing the link
    pub text: String,
    /// Format the result as a channel publication instead of a private reply
    #[arg(long)]
    pub channel_post: bool,
}

/// Installs the stderr log subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

pub fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Run => {
            let config = load_bot_config(&cli.config)?;
            run_bot(config)?;
        }
        Commands::Resolve(args) => {
            let config = load_bot_config(&cli.config)?;
            let report = resolve_once(&config, args)?;
            render(&report, cli.format)?;
            if let Some(err) = report.error {
                return Err(AppError::Pipeline(err));
            }
        }
        Commands::Check => {
            let report = check_config(&cli.config, |key| std::env::var(key).ok());
            render(&report, cli.format)?;
            if report
                .iter()
                .any(|entry| matches!(entry.status, CheckStatus::Error))
            {
                return Err(AppError::CheckFailed);
            }
        }
    }

    Ok(())
}

fn run_bot(config: BotConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let transport = Arc::new(TelegramTransport::new(&config.telegram));
        let dispatcher = Arc::new(Dispatcher::from_config(&config, transport.clone()));
        info!(
            source = %config.channels.source,
            channel = %config.channels.target,
            policy = ?config.selection.policy,
            "dispatcher ready"
        );
        RunLoop::new(transport, dispatcher, RunLoopConfig::from_config(&config))
            .run()
            .await;
    });
    Ok(())
}

fn resolve_once(config: &BotConfig, args: &ResolveArgs) -> Result<ResolveReport> {
    let pipeline = Pipeline::from_config(config);
    let Some(link) = pipeline.accept(&args.text) else {
        return Ok(ResolveReport::failed(None, PipelineError::InputRejected));
    };
    let style = if args.channel_post {
        DeliveryStyle::ChannelPost
    } else {
        DeliveryStyle::Reply
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let report = match runtime.block_on(pipeline.run(&link, style)) {
        Ok(delivery) => ResolveReport {
            link: Some(delivery.link),
            text: delivery.message.text,
            actions: delivery.message.actions,
            error: None,
        },
        Err(err) => ResolveReport::failed(Some(link), err),
    };
    Ok(report)
}

fn check_config<F>(path: &Path, lookup: F) -> Vec<CheckEntry>
where
    F: Fn(&str) -> Option<String>,
{
    let config = match load_bot_config_with(path, lookup) {
        Ok(config) => config,
        Err(err) => {
            return vec![CheckEntry::error(
                "config",
                format!("{}: {err}", path.display()),
            )]
        }
    };

    let mut report = vec![CheckEntry::ok("config", path.display().to_string())];
    report.push(CheckEntry::ok(
        "telegram",
        format!(
            "{} (token {})",
            config.telegram.api_base,
            redact(&config.telegram.bot_token)
        ),
    ));
    report.push(CheckEntry::ok(
        "resolver",
        format!(
            "{} ({} {}, timeout {}s)",
            config.resolver.endpoint,
            config.resolver.api_key_header,
            redact(&config.resolver.api_key),
            config.resolver.timeout_seconds
        ),
    ));
    if config.resolver.timeout_seconds < 30 || config.resolver.timeout_seconds > 60 {
        report.push(CheckEntry::warn(
            "resolver.timeout_seconds",
            format!(
                "{}s is outside the usual 30-60s window",
                config.resolver.timeout_seconds
            ),
        ));
    }
    report.push(CheckEntry::ok(
        "channels",
        format!(
            "{} -> {}, members of {}",
            ChatRef::parse(&config.channels.source),
            ChatRef::parse(&config.channels.target),
            ChatRef::parse(&config.channels.auth_channel)
        ),
    ));
    report.push(CheckEntry::ok(
        "selection",
        format!(
            "{:?} policy, streaming marker {}",
            config.selection.policy, config.selection.streaming_marker
        ),
    ));
    report
}

fn redact(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}***")
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

impl<T: DisplayFallback> DisplayFallback for Vec<T> {
    fn display(&self) -> String {
        self.iter()
            .map(DisplayFallback::display)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct ResolveReport {
    pub link: Option<String>,
    pub text: String,
    pub actions: Vec<ActionLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PipelineError>,
}

impl ResolveReport {
    fn failed(link: Option<String>, error: PipelineError) -> Self {
        Self {
            link,
            text: error.user_message().to_string(),
            actions: Vec::new(),
            error: Some(error),
        }
    }
}

impl DisplayFallback for ResolveReport {
    fn display(&self) -> String {
        let mut lines = Vec::new();
        if let Some(link) = &self.link {
            lines.push(format!("link: {link}"));
        }
        lines.push(self.text.clone());
        for action in &self.actions {
            lines.push(format!("[{}] {}", action.label, action.url));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct CheckEntry {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warn,
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warn => "WARN",
            CheckStatus::Error => "ERROR",
        };
        write!(f, "{}", label)
    }
}

impl CheckEntry {
    fn ok(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
            detail: detail.into(),
        }
    }

    fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warn,
            detail: detail.into(),
        }
    }

    fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Error,
            detail: detail.into(),
        }
    }
}

impl DisplayFallback for CheckEntry {
    fn display(&self) -> String {
        format!("[{}] {}: {}", self.status, self.name, self.detail)
    }
}
