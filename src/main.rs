//! Goblin Shell Daemon
//!
//! Owns the state behind a Wayland desktop shell: status bar data,
//! control center widgets, the volume/brightness OSD, reminders, and
//! todos. Renderers connect over a unix socket and receive shell events;
//! all system interaction (nmcli, bluetoothctl, pactl, sensors) happens
//! here, off the main loop, marshaled back over one update channel.

mod config;
mod dbus;
mod ipc;
mod reminders;
mod services;
mod shell;
mod tasks;
mod todos;
mod watcher;

use anyhow::Result;
use config::{Config, Paths};
use dbus::notifications::NotificationService;
use dbus::power::PowerService;
use dbus::DbusManager;
use services::hwmon::HwMonitor;
use services::{audio, battery, hwmon, media, network};
use shell::{Shell, ShellCtx, ShellUpdate};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tasks::TaskManager;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const BATTERY_INTERVAL: Duration = Duration::from_secs(1);
const HWMON_INTERVAL: Duration = Duration::from_secs(3);
const UPTIME_INTERVAL: Duration = Duration::from_secs(60);
const NETSPEED_INTERVAL: Duration = Duration::from_secs(1);
const MEDIA_INTERVAL: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    // Initialize logging - silence noisy crates
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "goblin=debug,info,zbus=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting goblin shell daemon");

    let paths = Paths::resolve()?;
    let config = Config::load_or_generate(&paths);
    match config::apply_theme(&config, &paths) {
        Ok(applied) => info!("theme '{}' set", applied.theme),
        Err(e) => warn!("unable to set theme: {:#}", e),
    }

    let tasks = Arc::new(TaskManager::new()?);
    let (events, _) = broadcast::channel(256);
    let (update_tx, update_rx) = mpsc::channel::<ShellUpdate>();

    ipc::start(&tasks, events.clone(), update_tx.clone())?;

    let _reload_watcher = watcher::start(&paths.styles_dir(), &paths.config_dir, update_tx.clone())?;

    // Both buses are optional: a session without a notification daemon or
    // logind still gets a working shell.
    let notifier = init_notifier(&tasks);
    let power = init_power(&tasks);

    let ctx = ShellCtx {
        tasks: tasks.clone(),
        events,
        updates: update_tx.clone(),
        notifier,
        power,
    };
    let mut shell = Shell::new(config, paths);

    spawn_pollers(&tasks, &update_tx);

    // Ctrl-C lands on the update bus like everything else.
    let signal_updates = update_tx.clone();
    let _ = tasks.spawn_logged("signal", async move {
        tokio::signal::ctrl_c().await?;
        let _ = signal_updates.send(ShellUpdate::Quit);
        Ok(())
    });

    info!("goblin shell daemon running");
    while let Ok(update) = update_rx.recv() {
        shell.apply(update, &ctx);
        if shell.should_quit() {
            break;
        }
    }

    info!("Shutting down");
    tasks.shutdown();
    Ok(())
}

/// Session-bus notification service, if the session has one.
fn init_notifier(tasks: &TaskManager) -> Option<Arc<NotificationService>> {
    let handle = tasks
        .run(async {
            let dbus = DbusManager::new().await?;
            NotificationService::new(dbus.connection()).await
        })
        .ok()?;
    match handle.join() {
        Ok(Ok(service)) => Some(Arc::new(service)),
        Ok(Err(e)) => {
            warn!("desktop notifications unavailable: {:#}", e);
            None
        }
        Err(_) => None,
    }
}

/// System-bus logind proxy, if reachable.
fn init_power(tasks: &TaskManager) -> Option<Arc<PowerService>> {
    let handle = tasks
        .run(async {
            let dbus = DbusManager::system().await?;
            PowerService::new(dbus.connection()).await
        })
        .ok()?;
    match handle.join() {
        Ok(Ok(service)) => Some(Arc::new(service)),
        Ok(Err(e)) => {
            warn!("power management unavailable: {:#}", e);
            None
        }
        Err(_) => None,
    }
}

/// Start every fixed-interval sampler.
///
/// Each one samples off the main loop and reports with a [`ShellUpdate`];
/// a failed spawn only costs that poller, never the daemon.
fn spawn_pollers(tasks: &TaskManager, updates: &Sender<ShellUpdate>) {
    // One-second heartbeat: clock, countdown timer, reminder checks.
    let tick_tx = updates.clone();
    let _ = tasks.spawn_logged("second-tick", async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            if tick_tx.send(ShellUpdate::SecondTick).is_err() {
                return Ok(());
            }
        }
    });

    // Battery, 1s, safe default when no sensor exists.
    let battery_tx = updates.clone();
    let _ = tasks.spawn_logged("battery-poll", async move {
        let supply_dir = PathBuf::from("/sys/class/power_supply");
        loop {
            let dir = supply_dir.clone();
            let status = tokio::task::spawn_blocking(move || battery::sample(&dir))
                .await
                .unwrap_or_default();
            if battery_tx.send(ShellUpdate::Battery(status)).is_err() {
                return Ok(());
            }
            tokio::time::sleep(BATTERY_INTERVAL).await;
        }
    });

    // Hardware monitor, 3s. The sampler keeps sysinfo state between runs
    // so CPU usage has a baseline.
    let hw_tx = updates.clone();
    let monitor = Arc::new(Mutex::new(HwMonitor::new()));
    let _ = tasks.spawn_logged("hwmon-poll", async move {
        loop {
            let monitor = monitor.clone();
            let sample = tokio::task::spawn_blocking(move || {
                monitor.lock().ok().map(|mut m| m.sample())
            })
            .await
            .ok()
            .flatten();
            if let Some(sample) = sample {
                if hw_tx.send(ShellUpdate::Hardware(sample)).is_err() {
                    return Ok(());
                }
            }
            tokio::time::sleep(HWMON_INTERVAL).await;
        }
    });

    // Uptime, 60s.
    let uptime_tx = updates.clone();
    let _ = tasks.spawn_logged("uptime-poll", async move {
        loop {
            if uptime_tx
                .send(ShellUpdate::Uptime(hwmon::uptime_pretty()))
                .is_err()
            {
                return Ok(());
            }
            tokio::time::sleep(UPTIME_INTERVAL).await;
        }
    });

    // Link throughput, 1s, only when a wireless interface exists.
    let net_dir = Path::new("/sys/class/net");
    if let Some(iface) = network::default_wifi_iface(net_dir) {
        info!("sampling link throughput on {}", iface);
        let mut sampler = network::LinkThroughput::new(net_dir, &iface);
        let net_tx = updates.clone();
        let _ = tasks.spawn_logged("netspeed-poll", async move {
            loop {
                if let Some((rx, tx)) = sampler.sample() {
                    if net_tx.send(ShellUpdate::NetSpeed { rx, tx }).is_err() {
                        return Ok(());
                    }
                }
                tokio::time::sleep(NETSPEED_INTERVAL).await;
            }
        });
    }

    // Media player, 5s.
    let media_tx = updates.clone();
    let _ = tasks.spawn_logged("media-poll", async move {
        loop {
            if media_tx
                .send(ShellUpdate::Media(media::info().await))
                .is_err()
            {
                return Ok(());
            }
            tokio::time::sleep(MEDIA_INTERVAL).await;
        }
    });

    // Volume OSD trigger: follow the sound server's own change feed.
    let sink_tx = updates.clone();
    let _ = tasks.spawn_logged("pactl-subscribe", async move {
        let tx = sink_tx;
        audio::watch_sink_changes(|| {
            let _ = tx.send(ShellUpdate::SinkEvent);
        })
        .await
    });

    // Prime renderer-facing state once at startup.
    let prime_tx = updates.clone();
    let _ = tasks.spawn_logged("initial-state", async move {
        if let Some(percent) = audio::volume().await {
            let muted = audio::muted().await;
            let _ = prime_tx.send(ShellUpdate::VolumeRead {
                percent,
                muted,
                show_osd: false,
            });
        }
        let _ = prime_tx.send(ShellUpdate::AudioSinksRefreshed {
            sinks: audio::sinks().await,
            default_sink: audio::default_sink().await,
        });
        if let Some((level, max)) = services::brightness::level().await {
            let _ = prime_tx.send(ShellUpdate::BrightnessRead {
                level,
                max,
                show_osd: false,
            });
        }
        let _ = prime_tx.send(ShellUpdate::BluetoothPower(
            services::bluetooth::powered().await,
        ));
        let _ = prime_tx.send(ShellUpdate::WifiActive(network::active_ssid().await));
        Ok(())
    });
}
