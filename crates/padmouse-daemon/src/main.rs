//! padmouse daemon entry point.
//!
//! Loads the configuration, starts the device session, and runs until
//! Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ DeviceSession::start()    -- uinput pointer + dispatch worker thread
//!  └─ HotplugMonitor::spawn()   -- scans /dev/input, connect/disconnect
//!       └─ EvdevBus reader      -- one thread per bound gamepad
//!  └─ ctrl_c
//!  └─ DeviceSession::shutdown() -- release gamepad, drain, destroy pointer
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use padmouse_daemon::infrastructure::storage::config::{self, AppConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Drive the mouse pointer with an Xbox One S gamepad.
#[derive(Debug, Parser)]
#[command(
    name = "padmouse",
    about = "Translates gamepad input into virtual mouse motion, scrolling, and clicks",
    version
)]
struct Cli {
    /// Config file to load instead of `$XDG_CONFIG_HOME/padmouse/config.toml`.
    #[arg(long, env = "PADMOUSE_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, overriding `daemon.log_level`.
    ///
    /// `RUST_LOG` takes precedence over both.
    #[arg(long, env = "PADMOUSE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log every pointer action the dispatch worker applies.
    #[arg(long)]
    verbose_actions: bool,

    /// Leave the gamepad ungrabbed so other programs still see its events.
    #[arg(long)]
    no_grab: bool,
}

impl Cli {
    /// Loads the config file and applies command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if a value is out of range.
    fn load_config(&self) -> anyhow::Result<AppConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => config::load_config().context("failed to load config")?,
        };

        if let Some(level) = &self.log_level {
            cfg.daemon.log_level = level.clone();
        }
        if self.verbose_actions {
            cfg.daemon.verbose_actions = true;
        }
        if self.no_grab {
            cfg.device.grab = false;
        }
        Ok(cfg)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = cli.load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.daemon.log_level)),
        )
        .init();

    info!("padmouse starting");
    run(cfg).await?;
    info!("padmouse stopped");
    Ok(())
}

#[cfg(target_os = "linux")]
async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    use std::sync::Arc;

    use padmouse_daemon::application::emit_pointer::VirtualPointer;
    use padmouse_daemon::application::session::DeviceSession;
    use padmouse_daemon::infrastructure::input_bus::hotplug::HotplugMonitor;
    use padmouse_daemon::infrastructure::input_bus::linux::{EvdevBus, EvdevScanner};
    use padmouse_daemon::infrastructure::virtual_pointer::linux::UinputPointer;

    let (bus, removals) = EvdevBus::new(cfg.device.grab);
    let pointer_name = cfg.pointer.name.clone();
    let session = DeviceSession::start(Arc::new(bus), cfg.dispatch(), move |caps| {
        UinputPointer::create(&pointer_name, caps).map(|p| Box::new(p) as Box<dyn VirtualPointer>)
    })
    .context("failed to start device session")?;
    let session = Arc::new(session);

    let monitor = HotplugMonitor::new(
        Arc::clone(&session),
        EvdevScanner,
        removals,
        cfg.rescan_interval(),
    )
    .spawn()
    .context("failed to start hotplug monitor")?;

    info!("padmouse ready.  Press Ctrl-C to exit.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutdown signal received");

    // Teardown joins threads; keep it off the async workers.
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let result = session.shutdown();
        monitor.stop();
        let stats = result.context("session shutdown failed")?;
        info!("final queue stats: {stats}");
        Ok(())
    })
    .await
    .context("shutdown task failed")??;

    Ok(())
}

#[cfg(not(target_os = "linux"))]
async fn run(_cfg: AppConfig) -> anyhow::Result<()> {
    anyhow::bail!("padmouse needs Linux evdev and uinput")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
