use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use beacon_config::{Config, ConfigManager};
use beacon_observability::{create_session_span, Observability};
use beacon_sync::{
    ConnectionStatus, Envelope, EventSync, Identity, Notice, Notifier, Room, Subscription,
    SyncConfig, WsConnector, WILDCARD,
};
use tokio::sync::mpsc;
use tracing::Instrument;

#[derive(Parser)]
#[command(name = "beacon-cli")]
#[command(about = "Real-time event listener for the admin backend")]
#[command(version)]
struct Cli {
    /// Enable debug mode
    #[arg(long, short, default_value = "false")]
    debug: bool,

    /// Config file path (default: $BEACON_HOME/config.json or ~/.beacon/config.json)
    #[arg(long, env = "BEACON_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 连接服务器并实时打印事件
    Listen(ListenArgs),
    /// 配置管理命令
    Config(ConfigArgs),
}

#[derive(Args, Clone, Default)]
struct ListenArgs {
    /// 用户 ID（覆盖配置文件）
    #[arg(long)]
    user_id: Option<String>,

    /// 房间: admin 或 standard（覆盖配置文件）
    #[arg(long)]
    room: Option<String>,

    /// 语言（覆盖配置文件）
    #[arg(long)]
    locale: Option<String>,

    /// API 地址（覆盖配置文件）
    #[arg(long)]
    api_base_url: Option<String>,

    /// 只打印指定类型的事件，可重复；默认打印全部
    #[arg(long = "event", value_name = "TYPE")]
    events: Vec<String>,

    /// 退出时打印 Prometheus 指标
    #[arg(long, default_value = "false")]
    metrics: bool,
}

#[derive(Args, Clone)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// 获取配置值
    Get {
        /// 配置键 (如: client.api_base_url, identity.locale)
        key: String,
    },
    /// 设置配置值
    Set {
        /// 配置键 (如: client.api_base_url, identity.locale)
        key: String,
        /// 配置值
        value: String,
    },
    /// 初始化默认配置
    Init {
        /// 强制覆盖已有配置
        #[arg(long, default_value = "false")]
        force: bool,
    },
    /// 显示当前配置
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config.as_deref() {
        Some(path) => beacon_config::expand_tilde(path).unwrap_or_else(|| PathBuf::from(path)),
        None => ConfigManager::default_config_path()?,
    };

    if cli.debug {
        eprintln!("{}", "[DEBUG] Debug mode enabled".dimmed());
        eprintln!("{}", format!("[DEBUG] Config path: {:?}", config_path).dimmed());
    }

    match cli.command {
        Commands::Listen(args) => listen(args, config_path, cli.debug).await,
        Commands::Config(args) => handle_config(args, config_path).await,
    }
}

impl ListenArgs {
    /// 命令行参数覆盖配置文件中的值
    fn apply(&self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(user_id) = &self.user_id {
            config.set_value("identity.user_id", user_id)?;
        }
        if let Some(room) = &self.room {
            config.set_value("identity.room", room)?;
        }
        if let Some(locale) = &self.locale {
            config.set_value("identity.locale", locale)?;
        }
        if let Some(base) = &self.api_base_url {
            config.set_value("client.api_base_url", base)?;
        }
        ConfigManager::validate(config)?;
        Ok(())
    }
}

fn sync_config(config: &Config) -> SyncConfig {
    let defaults = SyncConfig::default();
    SyncConfig {
        api_base_url: config.client.api_base_url.clone(),
        ws_path: config.client.ws_path.clone(),
        keepalive_interval: Duration::from_secs(config.client.keepalive_interval_secs),
        reconnect_delay: Duration::from_secs(config.client.reconnect_delay_secs),
        notifications_enabled: config.notifications.enabled,
        notable_events: config
            .notifications
            .event_types
            .as_ref()
            .map(|types| types.iter().cloned().collect::<HashSet<_>>())
            .unwrap_or(defaults.notable_events),
    }
}

fn identity(config: &Config) -> anyhow::Result<Option<Identity>> {
    let Some(user_id) = config
        .identity
        .user_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
    else {
        return Ok(None);
    };
    let room: Room = config.identity.room.parse().map_err(anyhow::Error::msg)?;
    Ok(Some(
        Identity::new(user_id, room).with_locale(config.identity.locale.as_str()),
    ))
}

/// 在终端高亮显示通知
struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notice: &Notice) {
        println!(
            "{}",
            format!("🔔 [{}] {}", notice.event_type, notice.message)
                .yellow()
                .bold()
        );
    }
}

fn print_event(event: &Envelope) {
    let payload = serde_json::Value::Object(event.payload.clone());
    println!("{} {}", event.event_type.cyan().bold(), payload);
}

fn print_status(status: ConnectionStatus) {
    let line = match status {
        ConnectionStatus::Open => "● connected".green(),
        ConnectionStatus::Connecting => "◌ connecting...".yellow(),
        ConnectionStatus::Closing => "◌ closing...".dimmed(),
        ConnectionStatus::Disconnected => "○ disconnected".red(),
    };
    eprintln!("{}", line);
}

async fn listen(args: ListenArgs, config_path: PathBuf, debug: bool) -> anyhow::Result<()> {
    let mut manager = ConfigManager::load(&config_path).await?;
    let mut config = manager.snapshot().await;
    args.apply(&mut config)?;

    let mut obs_config = beacon_observability::Config::from(&config).with_metrics(args.metrics);
    if debug {
        obs_config = obs_config.with_sync_level("debug");
    }
    let obs = Observability::init(obs_config).await?;

    let Some(initial) = identity(&config)? else {
        println!(
            "{}",
            "❌ No user id configured. Use --user-id or `beacon-cli config set identity.user_id <id>`"
                .red()
        );
        return Ok(());
    };
    if config.client.api_base_url.is_none() {
        println!(
            "{}",
            "❌ No API base configured. Use --api-base-url or `beacon-cli config set client.api_base_url <url>`"
                .red()
        );
        return Ok(());
    }

    let span = create_session_span(&initial.user_id, initial.room.as_str());
    run_session(args.clone(), config, initial, &mut manager)
        .instrument(span)
        .await?;

    if args.metrics {
        println!("{}", "📈 Metrics:".cyan().bold());
        println!("{}", obs.render_metrics());
    }
    obs.shutdown();
    Ok(())
}

async fn run_session(
    args: ListenArgs,
    config: Config,
    initial: Identity,
    manager: &mut ConfigManager,
) -> anyhow::Result<()> {
    let sync = EventSync::with_transport(
        sync_config(&config),
        Arc::new(WsConnector),
        Arc::new(TerminalNotifier),
    );

    let subscriptions: Vec<Subscription> = if args.events.is_empty() {
        vec![sync.subscribe(WILDCARD, print_event)]
    } else {
        args.events
            .iter()
            .map(|event_type| sync.subscribe(event_type.as_str(), print_event))
            .collect()
    };

    let mut status = sync.watch_status();
    let status_task = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            print_status(current);
        }
    });

    // 配置文件变更时重新绑定身份：语言变化走 change_language，用户变化会重连
    let (reload_tx, mut reload_rx) = mpsc::unbounded_channel();
    let overrides = args.clone();
    if let Err(e) = manager.watch(move |reloaded| {
        let mut next = reloaded.clone();
        if let Err(e) = overrides.apply(&mut next) {
            tracing::warn!("Ignoring reloaded config: {}", e);
            return;
        }
        let _ = reload_tx.send(next);
    }) {
        tracing::warn!("Config hot-reload unavailable: {}", e);
    }

    println!(
        "{}",
        format!(
            "📡 Listening as {} ({}, {}), press Ctrl-C to stop",
            initial.user_id, initial.room, initial.locale
        )
        .green()
    );
    sync.connect(initial);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(next) = reload_rx.recv() => match identity(&next) {
                Ok(Some(identity)) => {
                    tracing::info!("Config reloaded, binding {} ({})", identity.user_id, identity.room);
                    sync.connect(identity);
                }
                Ok(None) => {
                    tracing::info!("Config reloaded without a user id, logging out");
                    sync.clear_identity();
                }
                Err(e) => tracing::warn!("Ignoring reloaded identity: {}", e),
            },
        }
    }

    println!("{}", "👋 Shutting down".dimmed());
    manager.unwatch()?;
    drop(subscriptions);
    sync.shutdown().await;
    let _ = status_task.await;
    Ok(())
}

async fn handle_config(args: ConfigArgs, config_path: PathBuf) -> anyhow::Result<()> {
    match args.command {
        ConfigCommands::Get { key } => {
            let manager = ConfigManager::load(&config_path).await?;
            let config = manager.snapshot().await;

            match config.get_value(&key) {
                Some(value) => {
                    println!("{}", format!("{} = {}", key, value).green());
                }
                None => {
                    println!("{}", format!("❌ Key not set or unknown: {}", key).red());
                    std::process::exit(1);
                }
            }
        }
        ConfigCommands::Set { key, value } => {
            let manager = ConfigManager::load(&config_path).await?;

            if let Err(e) = manager
                .update(|config| config.set_value(&key, &value))
                .await
            {
                eprintln!("{}", format!("❌ Failed to set value: {}", e).red());
                std::process::exit(1);
            }

            println!("{}", format!("✅ Set {} = {}", key, value).green());
        }
        ConfigCommands::Init { force } => {
            if config_path.exists() && !force {
                println!("{}", format!("⚠️  Config already exists at {:?}", config_path).yellow());
                println!("{}", "Use --force to overwrite".dimmed());
                return Ok(());
            }

            beacon_config::ensure_beacon_dir().await?;

            let manager = ConfigManager::new(Config::default(), config_path.clone());
            manager.save().await?;

            println!("{}", format!("✅ Config initialized at {:?}", config_path).green());
            println!("{}", "You can edit this file to customize your settings".dimmed());
        }
        ConfigCommands::Show => {
            let manager = ConfigManager::load(&config_path).await?;
            let config = manager.snapshot().await;

            println!(
                "{}",
                format!("📋 Current Configuration ({:?}):", manager.path())
                    .cyan()
                    .bold()
            );
            println!();

            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
    }

    Ok(())
}
