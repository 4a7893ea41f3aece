use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info, warn};
use wg_manager::config::{Settings, SettingsManager};
use wg_manager::logging::{init_logging, options_from_settings};
use wg_manager::tunnel::sim::{EngineScript, SimulatedEngine};
use wg_manager::tunnel::{EngineEvent, RuntimeStats, Subscription, TunnelDetail};
use wg_manager::{TunnelConfiguration, TunnelEvent, TunnelId, TunnelStatus, TunnelsManager};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LogLevelArg {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevelArg> for tracing::Level {
    fn from(level: LogLevelArg) -> Self {
        match level {
            LogLevelArg::Trace => tracing::Level::TRACE,
            LogLevelArg::Debug => tracing::Level::DEBUG,
            LogLevelArg::Info => tracing::Level::INFO,
            LogLevelArg::Warn => tracing::Level::WARN,
            LogLevelArg::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, after_help = "Examples:\n  wgctl check office.conf\n  wgctl --output json show office.conf\n  wgctl simulate office.conf --wait\n  wgctl simulate office.conf --fail \"handshake timeout\"\n  wgctl list --dir /etc/wireguard")]
struct Args {
    /// Log level (overrides the settings file)
    #[arg(short, long, value_enum, env = "WGCTL_LOG_LEVEL")]
    log_level: Option<LogLevelArg>,

    /// Emit JSON logs
    #[arg(long, env = "WGCTL_JSON_LOGS")]
    json_logs: bool,

    /// Output format for command results (table|json)
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Settings file (default: the per-user config directory)
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and validate a wg-quick file
    Check { file: PathBuf },
    /// Print the detail rows of a tunnel
    Show { file: PathBuf },
    /// Activate and deactivate a tunnel against the simulated engine,
    /// printing every notification
    Simulate {
        file: PathBuf,

        /// Make the engine fail activation with this reason
        #[arg(long, value_name = "REASON", conflicts_with = "wait")]
        fail: Option<String>,

        /// Make the engine wait for a network before activating
        #[arg(long)]
        wait: bool,

        /// Simulated engine latency in milliseconds
        #[arg(long, default_value_t = 250)]
        delay_ms: u64,

        /// Runtime refreshes to perform while the tunnel is active, one per
        /// manager.runtime_refresh_interval_ms
        #[arg(long, default_value_t = 1)]
        refreshes: u32,
    },
    /// List every `*.conf` tunnel in a directory
    List {
        /// Directory to scan (default: storage.tunnels_dir from settings)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct Message<'a> {
    status: &'a str,
    detail: &'a str,
}

fn print_msg(fmt: OutputFormat, status: &str, detail: &str) -> Result<()> {
    match fmt {
        OutputFormat::Table => println!("{status}: {detail}"),
        OutputFormat::Json => {
            let msg = Message { status, detail };
            println!("{}", serde_json::to_string_pretty(&msg)?);
        }
    }
    Ok(())
}

fn print_event(fmt: OutputFormat, event: &TunnelEvent) -> Result<()> {
    match fmt {
        OutputFormat::Json => println!("{}", serde_json::to_string(event)?),
        OutputFormat::Table => match event {
            TunnelEvent::Added { name, .. } => println!("{name}: added"),
            TunnelEvent::Removed { name, .. } => println!("{name}: removed"),
            TunnelEvent::ConfigChanged { name, .. } => println!("{name}: configuration changed"),
            TunnelEvent::StatusChanged {
                name,
                old,
                new,
                failure: Some(reason),
                ..
            } => println!("{name}: {old} -> {new} (failed: {reason})"),
            TunnelEvent::StatusChanged {
                name, old, new, ..
            } => println!("{name}: {old} -> {new}"),
        },
    }
    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let manager = match path {
        Some(path) => SettingsManager::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => SettingsManager::load_default().context("loading default settings")?,
    };
    Ok(manager.settings().clone())
}

/// Read a wg-quick file; the tunnel is named after the file stem.
fn load_tunnel(path: &Path) -> Result<TunnelConfiguration> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| anyhow!("cannot derive a tunnel name from {}", path.display()))?;
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    TunnelConfiguration::from_wg_quick(name, &text)
        .with_context(|| format!("parsing {}", path.display()))
}

fn check(path: &Path, output: OutputFormat) -> Result<()> {
    let configuration = load_tunnel(path)?;
    print_msg(
        output,
        "ok",
        &format!(
            "{}: {} address(es), {} peer(s)",
            configuration.name,
            configuration.interface.addresses.len(),
            configuration.peers.len()
        ),
    )
}

fn show(path: &Path, output: OutputFormat) -> Result<()> {
    let configuration = load_tunnel(path)?;
    let detail = TunnelDetail::build(&configuration, TunnelStatus::Inactive, None, None);
    print_detail(output, &detail)
}

fn print_detail(output: OutputFormat, detail: &TunnelDetail) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&detail)?),
        OutputFormat::Table => {
            for row in &detail.rows {
                if row.is_title {
                    println!("{}: {}", row.key, row.value);
                } else {
                    println!("  {}: {}", row.key, row.value);
                }
            }
        }
    }
    Ok(())
}

/// Print events until a status change satisfies `done`.
async fn follow(
    sub: &mut Subscription,
    output: OutputFormat,
    done: impl Fn(TunnelStatus) -> bool,
) -> Result<(TunnelStatus, Option<String>)> {
    while let Some(event) = sub.recv().await {
        debug!(tunnel = event.tunnel_name(), "Tunnel event received");
        print_event(output, &event)?;
        if let TunnelEvent::StatusChanged { new, failure, .. } = event {
            if done(new) {
                return Ok((new, failure));
            }
        }
    }
    bail!("event stream closed before the tunnel settled")
}

async fn simulate(
    path: &Path,
    settings: &Settings,
    output: OutputFormat,
    script: EngineScript,
    refreshes: u32,
) -> Result<()> {
    let configuration = load_tunnel(path)?;
    let (engine, rx) = SimulatedEngine::new(script);
    let manager =
        TunnelsManager::with_options(Arc::new(engine.clone()), settings.manager_options());
    let pump = manager.attach_engine(rx);
    let mut sub = manager.subscribe();

    let id = manager.create(configuration)?;
    manager.start_activation(id).await?;
    let (status, failure) = follow(&mut sub, output, |s| {
        matches!(s, TunnelStatus::Active | TunnelStatus::Inactive)
    })
    .await?;

    if status == TunnelStatus::Active {
        // Poll the engine the way a detail view refreshes while shown
        let interval = settings.manager.runtime_refresh_interval();
        for round in 1..=u64::from(refreshes) {
            engine.emit(
                id,
                EngineEvent::Stats(RuntimeStats {
                    tx_bytes: 148 * round,
                    rx_bytes: 1024 * round,
                    last_handshake: None,
                }),
            );
            tokio::time::sleep(interval).await;
            let detail = refresh(&manager, id, output).await?;
            print_detail(output, &detail)?;
        }
        manager.start_deactivation(id).await?;
        follow(&mut sub, output, |s| s == TunnelStatus::Inactive).await?;
    }

    manager.remove(id)?;
    for event in sub.drain() {
        print_event(output, &event)?;
    }
    manager.shutdown().await;
    pump.abort();

    if let Some(reason) = failure {
        bail!("activation failed: {reason}");
    }
    Ok(())
}

/// One detail-view refresh: report drift, then rebuild the rows from the
/// current snapshot.
async fn refresh(manager: &TunnelsManager, id: TunnelId, output: OutputFormat) -> Result<TunnelDetail> {
    if manager.runtime_configuration_drift(id).await?.is_some() {
        print_msg(
            output,
            "drift",
            "runtime configuration differs from the stored one",
        )?;
    } else {
        debug!(id = %id, "Runtime configuration matches stored configuration");
    }
    let snapshot = manager
        .get(id)
        .ok_or_else(|| anyhow!("tunnel {id} disappeared"))?;
    Ok(TunnelDetail::from_snapshot(&snapshot))
}

#[derive(Serialize)]
struct ListEntry {
    name: String,
    status: TunnelStatus,
    peers: usize,
    on_demand: String,
}

fn list(dir: &Path, output: OutputFormat) -> Result<()> {
    let (engine, _rx) = SimulatedEngine::manual();
    let manager = TunnelsManager::new(Arc::new(engine));

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading tunnels directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "conf"))
        .collect();
    paths.sort();

    for path in paths {
        let imported =
            load_tunnel(&path).and_then(|c| manager.create(c).map_err(anyhow::Error::from));
        if let Err(e) = imported {
            warn!(path = %path.display(), error = %e, "Skipping tunnel");
        }
    }

    let entries: Vec<ListEntry> = manager
        .list()
        .into_iter()
        .map(|t| ListEntry {
            peers: t.configuration.peers.len(),
            on_demand: t
                .activate_on_demand
                .as_ref()
                .map(|s| s.detail_text())
                .unwrap_or_else(|| "Off".to_string()),
            name: t.name,
            status: t.status,
        })
        .collect();

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Table => {
            if entries.is_empty() {
                println!("no tunnels in {}", dir.display());
            }
            for entry in &entries {
                println!(
                    "{:<24} {:<12} {} peer(s)",
                    entry.name, entry.status, entry.peers
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(args.settings.as_deref())?;

    let mut log_options = options_from_settings(&settings);
    if let Some(level) = args.log_level {
        log_options.level = level.into();
    }
    if args.json_logs {
        log_options.json_format = true;
    }
    let _guard = init_logging(log_options);

    let output = args.output;
    match args.command {
        Command::Check { file } => check(&file, output)?,
        Command::Show { file } => show(&file, output)?,
        Command::Simulate {
            file,
            fail,
            wait,
            delay_ms,
            refreshes,
        } => {
            let delay = Duration::from_millis(delay_ms);
            let script = match (fail, wait) {
                (Some(reason), _) => EngineScript::Fail { delay, reason },
                (None, true) => EngineScript::WaitForNetwork { delay },
                (None, false) => EngineScript::Succeed { delay },
            };
            simulate(&file, &settings, output, script, refreshes).await?;
        }
        Command::List { dir } => {
            let dir = dir.unwrap_or_else(|| settings.storage.tunnels_dir());
            list(&dir, output)?;
        }
    }

    info!("wgctl command completed");
    Ok(())
}
