//! Shell state management
//!
//! Central state for the bar, control center, and OSD, and the single
//! update bus everything funnels through. Background tasks never touch
//! shell state directly; they send a [`ShellUpdate`] and the main loop
//! applies it here, then broadcasts [`ShellEvent`]s to renderers.

pub mod osd;
pub mod timer;

use crate::config::{self, Config, Paths};
use crate::dbus::notifications::NotificationService;
use crate::dbus::power::PowerService;
use crate::reminders::{parse_hhmm, ReminderScheduler};
use crate::services::battery::BatteryStatus;
use crate::services::{audio, bluetooth, brightness, media, network};
use crate::tasks::TaskManager;
use crate::todos::TodoStore;
use chrono::Local;
use goblin_ipc::{
    BluetoothDevice, HwSample, MediaInfo, OsdKind, ShellCommand, ShellEvent, WifiNetwork,
};
use osd::OsdState;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;
use timer::{CountdownTimer, TickOutcome};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// How long a Bluetooth discovery scan runs; the scan lock is released on
/// this timer whether or not the scan itself has finished.
pub const BT_SCAN_DURATION: Duration = Duration::from_secs(5);

/// Everything that can arrive on the main loop's update channel.
///
/// This is the idle-callback analog: the only way background work reaches
/// shell state.
#[derive(Debug)]
pub enum ShellUpdate {
    /// A renderer issued a command over IPC
    Command(ShellCommand),
    /// A renderer connected and needs a state sync
    RendererConnected,
    /// One-second heartbeat: clock, timer, reminder checks
    SecondTick,
    /// An OSD hide timer fired for the given show generation
    OsdHideTimeout(u64),
    Battery(BatteryStatus),
    Hardware(HwSample),
    Uptime(String),
    NetSpeed { rx: u64, tx: u64 },
    WifiScanned(Vec<WifiNetwork>),
    WifiStatus(String),
    WifiActive(Option<String>),
    WifiPowerSet(bool),
    BluetoothScanned(Vec<BluetoothDevice>),
    /// The fixed scan window elapsed; clears the scan lock
    BluetoothScanWindowElapsed,
    BluetoothPower(bool),
    AudioSinksRefreshed {
        sinks: Vec<goblin_ipc::AudioSink>,
        default_sink: Option<String>,
    },
    /// Volume was (re)read; `show_osd` when a change should pop the OSD
    VolumeRead {
        percent: u32,
        muted: bool,
        show_osd: bool,
    },
    /// `pactl subscribe` reported a sink change
    SinkEvent,
    BrightnessRead {
        level: u32,
        max: u32,
        show_osd: bool,
    },
    Media(Option<MediaInfo>),
    ConfigFileChanged,
    CssFileChanged(PathBuf),
    Quit,
}

/// Handles the shell hands to background work: the task loop, the event
/// broadcast, and the way back onto the update bus.
#[derive(Clone)]
pub struct ShellCtx {
    pub tasks: Arc<TaskManager>,
    pub events: broadcast::Sender<ShellEvent>,
    pub updates: Sender<ShellUpdate>,
    pub notifier: Option<Arc<NotificationService>>,
    pub power: Option<Arc<PowerService>>,
}

impl ShellCtx {
    fn emit(&self, event: ShellEvent) {
        // No connected renderer is fine; state is authoritative here.
        let _ = self.events.send(event);
    }

    /// Fire a desktop notification, best-effort.
    fn notify(&self, summary: &str, body: &str) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        let summary = summary.to_string();
        let body = body.to_string();
        let _ = self.tasks.spawn_logged("notify", async move {
            notifier.show_simple(&summary, &body).await.map(|_| ())
        });
    }

    /// Marshal a result back onto the update bus from a task.
    fn push_from_task(updates: &Sender<ShellUpdate>, update: ShellUpdate) {
        let _ = updates.send(update);
    }
}

/// Central shell state. Mutated exclusively on the main loop thread.
pub struct Shell {
    pub config: Config,
    paths: Paths,
    pub todos: TodoStore,
    pub reminders: ReminderScheduler,
    pub osd: OsdState,
    pub timer: CountdownTimer,
    control_center_visible: bool,
    calendar_visible: bool,
    wifi_scan_lock: bool,
    bt_scan_lock: bool,
    should_quit: bool,
}

impl Shell {
    pub fn new(config: Config, paths: Paths) -> Self {
        let todos = TodoStore::load(paths.todos_cache());
        let reminders = ReminderScheduler::load(paths.reminders_cache());
        Self {
            config,
            paths,
            todos,
            reminders,
            osd: OsdState::default(),
            timer: CountdownTimer::default(),
            control_center_visible: false,
            calendar_visible: false,
            wifi_scan_lock: false,
            bt_scan_lock: false,
            should_quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn control_center_visible(&self) -> bool {
        self.control_center_visible
    }

    pub fn calendar_visible(&self) -> bool {
        self.calendar_visible
    }

    fn sync_state(&self) -> ShellEvent {
        ShellEvent::SyncState {
            control_center_visible: self.control_center_visible,
            calendar_visible: self.calendar_visible,
            todos: self.todos.sorted_for_display(),
            group_mode: self.todos.group_mode(),
            reminders: self.reminders.entries_sorted(),
            ws_icons: self.config.ws_icons.clone(),
            font: self.config.font.clone(),
        }
    }

    /// Apply one update. The only entry point for state mutation.
    pub fn apply(&mut self, update: ShellUpdate, ctx: &ShellCtx) {
        match update {
            ShellUpdate::Command(cmd) => self.handle_command(cmd, ctx),
            ShellUpdate::RendererConnected => ctx.emit(self.sync_state()),
            ShellUpdate::SecondTick => self.on_second_tick(ctx),
            ShellUpdate::OsdHideTimeout(generation) => {
                if self.osd.handle_hide_timeout(generation) {
                    ctx.emit(ShellEvent::OsdHide);
                }
            }
            ShellUpdate::Battery(status) => ctx.emit(ShellEvent::Battery {
                percent: status.percent,
                charging: status.charging,
            }),
            ShellUpdate::Hardware(sample) => ctx.emit(ShellEvent::Hardware(sample)),
            ShellUpdate::Uptime(pretty) => ctx.emit(ShellEvent::Uptime { pretty }),
            ShellUpdate::NetSpeed { rx, tx } => ctx.emit(ShellEvent::NetSpeed {
                rx_bytes_per_sec: rx,
                tx_bytes_per_sec: tx,
            }),
            ShellUpdate::WifiScanned(networks) => {
                self.wifi_scan_lock = false;
                ctx.emit(ShellEvent::WifiNetworks { networks });
            }
            ShellUpdate::WifiStatus(message) => {
                ctx.emit(ShellEvent::WifiStatus { message });
            }
            ShellUpdate::WifiActive(ssid) => ctx.emit(ShellEvent::WifiActiveSsid { ssid }),
            ShellUpdate::WifiPowerSet(enabled) => {
                ctx.emit(ShellEvent::WifiPowerChanged { enabled });
                if enabled {
                    // A fresh radio wants a fresh list.
                    self.start_wifi_scan(ctx);
                }
            }
            ShellUpdate::BluetoothScanned(devices) => {
                ctx.emit(ShellEvent::BluetoothDevices { devices });
            }
            ShellUpdate::BluetoothScanWindowElapsed => {
                self.bt_scan_lock = false;
                ctx.emit(ShellEvent::BluetoothScanComplete);
            }
            ShellUpdate::BluetoothPower(enabled) => {
                ctx.emit(ShellEvent::BluetoothPower { enabled });
            }
            ShellUpdate::AudioSinksRefreshed {
                sinks,
                default_sink,
            } => ctx.emit(ShellEvent::AudioSinks {
                sinks,
                default_sink,
            }),
            ShellUpdate::VolumeRead {
                percent,
                muted,
                show_osd,
            } => {
                ctx.emit(ShellEvent::VolumeChanged { percent, muted });
                if show_osd {
                    self.show_osd(OsdKind::Volume, percent as f64, ctx);
                }
            }
            ShellUpdate::SinkEvent => {
                let updates = ctx.updates.clone();
                let _ = ctx.tasks.spawn_logged("volume-read", async move {
                    let percent = audio::volume().await.unwrap_or(0);
                    let muted = audio::muted().await;
                    ShellCtx::push_from_task(
                        &updates,
                        ShellUpdate::VolumeRead {
                            percent,
                            muted,
                            show_osd: true,
                        },
                    );
                    Ok(())
                });
            }
            ShellUpdate::BrightnessRead {
                level,
                max,
                show_osd,
            } => {
                ctx.emit(ShellEvent::BrightnessChanged { level, max });
                if show_osd && max > 0 {
                    let percent = level as f64 / max as f64 * 100.0;
                    self.show_osd(OsdKind::Brightness, percent, ctx);
                }
            }
            ShellUpdate::Media(info) => ctx.emit(ShellEvent::MediaChanged { info }),
            ShellUpdate::ConfigFileChanged => self.reload_config(ctx),
            ShellUpdate::CssFileChanged(path) => {
                info!("stylesheet modified: {:?}", path);
                ctx.emit(ShellEvent::CssReloaded {
                    path: path.to_string_lossy().into_owned(),
                });
            }
            ShellUpdate::Quit => {
                self.should_quit = true;
            }
        }
    }

    /// Toggle the control center, suppressing the OSD while it is open and
    /// closing the calendar popup.
    pub fn toggle_control_center(&mut self, ctx: &ShellCtx) {
        self.control_center_visible = !self.control_center_visible;
        if self.osd.set_suppressed(self.control_center_visible) {
            ctx.emit(ShellEvent::OsdHide);
        }
        if self.calendar_visible {
            self.calendar_visible = false;
            ctx.emit(ShellEvent::CalendarVisible { visible: false });
        }
        ctx.emit(ShellEvent::ControlCenterVisible {
            visible: self.control_center_visible,
        });
    }

    /// Toggle the calendar popup, closing the control center.
    pub fn toggle_calendar(&mut self, ctx: &ShellCtx) {
        self.calendar_visible = !self.calendar_visible;
        if self.control_center_visible {
            self.control_center_visible = false;
            if self.osd.set_suppressed(false) {
                ctx.emit(ShellEvent::OsdHide);
            }
            ctx.emit(ShellEvent::ControlCenterVisible { visible: false });
        }
        ctx.emit(ShellEvent::CalendarVisible {
            visible: self.calendar_visible,
        });
    }

    fn show_osd(&mut self, kind: OsdKind, value: f64, ctx: &ShellCtx) {
        let Some(generation) = self.osd.show(kind) else {
            return;
        };
        ctx.emit(ShellEvent::OsdShow { kind, value });

        let updates = ctx.updates.clone();
        let _ = ctx.tasks.spawn_logged("osd-hide", async move {
            tokio::time::sleep(Duration::from_millis(osd::HIDE_DELAY_MS)).await;
            ShellCtx::push_from_task(&updates, ShellUpdate::OsdHideTimeout(generation));
            Ok(())
        });
    }

    fn on_second_tick(&mut self, ctx: &ShellCtx) {
        let now = Local::now();
        ctx.emit(ShellEvent::Clock {
            date: now.format("%A %m/%d/%Y").to_string(),
        });

        match self.timer.tick() {
            TickOutcome::Running { remaining_secs } => ctx.emit(ShellEvent::TimerTick {
                remaining_secs,
                display: timer::format_time(remaining_secs),
                running: true,
            }),
            TickOutcome::Finished => {
                ctx.emit(ShellEvent::TimerFinished);
                ctx.notify("Timer", "Timer finished!");
            }
            TickOutcome::Idle => {}
        }

        let due = self.reminders.pop_due(now);
        if !due.is_empty() {
            for entry in &due {
                ctx.emit(ShellEvent::ReminderDue {
                    name: entry.name.clone(),
                });
                ctx.notify("Reminder", &format!("Reminder: {}", entry.name));
            }
            self.emit_reminders(ctx);
        }
    }

    fn emit_reminders(&self, ctx: &ShellCtx) {
        ctx.emit(ShellEvent::RemindersChanged {
            reminders: self.reminders.entries_sorted(),
        });
    }

    fn emit_todos(&self, ctx: &ShellCtx) {
        ctx.emit(ShellEvent::TodosChanged {
            todos: self.todos.sorted_for_display(),
            group_mode: self.todos.group_mode(),
        });
    }

    fn start_wifi_scan(&mut self, ctx: &ShellCtx) {
        if self.wifi_scan_lock {
            ctx.emit(ShellEvent::WifiStatus {
                message: "scan already in progress".into(),
            });
            return;
        }
        self.wifi_scan_lock = true;
        ctx.emit(ShellEvent::WifiScanStarted);

        let updates = ctx.updates.clone();
        let spawned = ctx.tasks.spawn_logged("wifi-scan", async move {
            network::rescan().await;
            let networks = network::list_networks().await;
            if networks.is_empty() {
                let message = if network::wifi_supported().await {
                    "No networks found".to_string()
                } else {
                    "WiFi is not supported on this machine".to_string()
                };
                ShellCtx::push_from_task(&updates, ShellUpdate::WifiStatus(message));
            }
            ShellCtx::push_from_task(&updates, ShellUpdate::WifiActive(network::active_ssid().await));
            ShellCtx::push_from_task(&updates, ShellUpdate::WifiScanned(networks));
            Ok(())
        });
        if spawned.is_err() {
            self.wifi_scan_lock = false;
        }
    }

    fn start_bluetooth_scan(&mut self, ctx: &ShellCtx) {
        // Prevent concurrent scans.
        if self.bt_scan_lock {
            return;
        }
        self.bt_scan_lock = true;
        ctx.emit(ShellEvent::BluetoothScanStarted);

        let updates = ctx.updates.clone();
        let _ = ctx.tasks.spawn_logged("bt-scan", async move {
            let devices = bluetooth::scan(BT_SCAN_DURATION).await;
            ShellCtx::push_from_task(&updates, ShellUpdate::BluetoothScanned(devices));
            Ok(())
        });

        // The lock is released on this timer regardless of whether the
        // scan has truly finished.
        let updates = ctx.updates.clone();
        let unlock = ctx.tasks.spawn_logged("bt-scan-unlock", async move {
            tokio::time::sleep(BT_SCAN_DURATION).await;
            ShellCtx::push_from_task(&updates, ShellUpdate::BluetoothScanWindowElapsed);
            Ok(())
        });
        if unlock.is_err() {
            self.bt_scan_lock = false;
        }
    }

    fn reload_config(&mut self, ctx: &ShellCtx) {
        info!("config modified, reloading");
        self.config = Config::load_or_generate(&self.paths);
        match config::apply_theme(&self.config, &self.paths) {
            Ok(applied) => {
                info!("theme '{}' set (live)", applied.theme);
                ctx.emit(ShellEvent::ThemeApplied {
                    theme: applied.theme,
                    fallback: applied.fallback,
                });
            }
            Err(e) => warn!("unable to apply theme: {:#}", e),
        }
        ctx.emit(self.sync_state());
    }

    fn handle_command(&mut self, cmd: ShellCommand, ctx: &ShellCtx) {
        match cmd {
            ShellCommand::ToggleControlCenter => self.toggle_control_center(ctx),
            ShellCommand::ToggleCalendar => self.toggle_calendar(ctx),

            ShellCommand::SetVolume { percent } => {
                let updates = ctx.updates.clone();
                let _ = ctx.tasks.spawn_logged("set-volume", async move {
                    audio::set_volume(percent).await;
                    let percent = audio::volume().await.unwrap_or(percent);
                    let muted = audio::muted().await;
                    ShellCtx::push_from_task(
                        &updates,
                        ShellUpdate::VolumeRead {
                            percent,
                            muted,
                            show_osd: true,
                        },
                    );
                    Ok(())
                });
            }
            ShellCommand::ToggleMute => {
                let updates = ctx.updates.clone();
                let _ = ctx.tasks.spawn_logged("toggle-mute", async move {
                    audio::toggle_mute().await;
                    let percent = audio::volume().await.unwrap_or(0);
                    let muted = audio::muted().await;
                    ShellCtx::push_from_task(
                        &updates,
                        ShellUpdate::VolumeRead {
                            percent,
                            muted,
                            show_osd: true,
                        },
                    );
                    Ok(())
                });
            }
            ShellCommand::SetDefaultSink { name } => {
                let updates = ctx.updates.clone();
                let _ = ctx.tasks.spawn_logged("set-default-sink", async move {
                    audio::set_default_sink(&name).await;
                    let sinks = audio::sinks().await;
                    let default_sink = audio::default_sink().await;
                    ShellCtx::push_from_task(
                        &updates,
                        ShellUpdate::AudioSinksRefreshed {
                            sinks,
                            default_sink,
                        },
                    );
                    Ok(())
                });
            }
            ShellCommand::RefreshSinks => {
                let updates = ctx.updates.clone();
                let _ = ctx.tasks.spawn_logged("refresh-sinks", async move {
                    let sinks = audio::sinks().await;
                    let default_sink = audio::default_sink().await;
                    ShellCtx::push_from_task(
                        &updates,
                        ShellUpdate::AudioSinksRefreshed {
                            sinks,
                            default_sink,
                        },
                    );
                    Ok(())
                });
            }
            ShellCommand::SetBrightness { level } => {
                let updates = ctx.updates.clone();
                let _ = ctx.tasks.spawn_logged("set-brightness", async move {
                    brightness::set_level(level).await;
                    if let Some((level, max)) = brightness::level().await {
                        ShellCtx::push_from_task(
                            &updates,
                            ShellUpdate::BrightnessRead {
                                level,
                                max,
                                show_osd: true,
                            },
                        );
                    }
                    Ok(())
                });
            }

            ShellCommand::WifiScan => self.start_wifi_scan(ctx),
            ShellCommand::WifiConnect {
                ssid,
                security,
                password,
                remember,
            } => {
                let updates = ctx.updates.clone();
                let _ = ctx.tasks.spawn_logged("wifi-connect", async move {
                    let open = security.eq_ignore_ascii_case("open");
                    let outcome =
                        network::connect(&ssid, open, password.as_deref(), remember).await;
                    let message = match outcome {
                        network::ConnectOutcome::Connected => format!("connected to {}", ssid),
                        network::ConnectOutcome::PasswordRequired => {
                            format!("password required for {}", ssid)
                        }
                        network::ConnectOutcome::Failed(reason) => {
                            format!("failed to connect to {}: {}", ssid, reason)
                        }
                    };
                    ShellCtx::push_from_task(&updates, ShellUpdate::WifiStatus(message));
                    ShellCtx::push_from_task(
                        &updates,
                        ShellUpdate::WifiActive(network::active_ssid().await),
                    );
                    Ok(())
                });
            }
            ShellCommand::WifiDisconnect { name } => {
                let updates = ctx.updates.clone();
                let _ = ctx.tasks.spawn_logged("wifi-disconnect", async move {
                    network::disconnect(&name).await;
                    ShellCtx::push_from_task(
                        &updates,
                        ShellUpdate::WifiActive(network::active_ssid().await),
                    );
                    Ok(())
                });
            }
            ShellCommand::WifiForget { ssid } => {
                let updates = ctx.updates.clone();
                let _ = ctx.tasks.spawn_logged("wifi-forget", async move {
                    network::forget(&ssid).await;
                    ShellCtx::push_from_task(
                        &updates,
                        ShellUpdate::WifiActive(network::active_ssid().await),
                    );
                    Ok(())
                });
            }
            ShellCommand::SetWifiPower { enabled } => {
                let updates = ctx.updates.clone();
                let _ = ctx.tasks.spawn_logged("wifi-power", async move {
                    if network::set_power(enabled).await {
                        ShellCtx::push_from_task(&updates, ShellUpdate::WifiPowerSet(enabled));
                    }
                    Ok(())
                });
            }

            ShellCommand::BluetoothScan => self.start_bluetooth_scan(ctx),
            ShellCommand::SetBluetoothPower { enabled } => {
                let updates = ctx.updates.clone();
                let _ = ctx.tasks.spawn_logged("bt-power", async move {
                    bluetooth::set_powered(enabled).await;
                    ShellCtx::push_from_task(
                        &updates,
                        ShellUpdate::BluetoothPower(bluetooth::powered().await),
                    );
                    Ok(())
                });
            }
            ShellCommand::BluetoothPair { address } => {
                let _ = ctx.tasks.spawn_logged("bt-pair", async move {
                    bluetooth::pair(&address).await;
                    Ok(())
                });
            }
            ShellCommand::BluetoothConnect { address } => {
                let updates = ctx.updates.clone();
                let _ = ctx.tasks.spawn_logged("bt-connect", async move {
                    bluetooth::connect_device(&address).await;
                    ShellCtx::push_from_task(
                        &updates,
                        ShellUpdate::BluetoothScanned(bluetooth::devices().await),
                    );
                    Ok(())
                });
            }
            ShellCommand::BluetoothDisconnect { address } => {
                let updates = ctx.updates.clone();
                let _ = ctx.tasks.spawn_logged("bt-disconnect", async move {
                    bluetooth::disconnect_device(&address).await;
                    ShellCtx::push_from_task(
                        &updates,
                        ShellUpdate::BluetoothScanned(bluetooth::devices().await),
                    );
                    Ok(())
                });
            }
            ShellCommand::BluetoothForget { address } => {
                let updates = ctx.updates.clone();
                let _ = ctx.tasks.spawn_logged("bt-forget", async move {
                    bluetooth::forget_device(&address).await;
                    ShellCtx::push_from_task(
                        &updates,
                        ShellUpdate::BluetoothScanned(bluetooth::devices().await),
                    );
                    Ok(())
                });
            }

            ShellCommand::MediaPlayPause => self.media_command(ctx, media::play_pause),
            ShellCommand::MediaNext => self.media_command(ctx, media::next),
            ShellCommand::MediaPrevious => self.media_command(ctx, media::previous),

            ShellCommand::AddTodo {
                text,
                category,
                priority,
            } => {
                if self.todos.add(&text, &category, &priority) {
                    self.emit_todos(ctx);
                }
            }
            ShellCommand::ToggleTodo { index } => {
                if self.todos.toggle(index) {
                    self.emit_todos(ctx);
                }
            }
            ShellCommand::RemoveTodo { index } => {
                if self.todos.remove(index) {
                    self.emit_todos(ctx);
                }
            }
            ShellCommand::ClearTodos => {
                self.todos.clear();
                self.emit_todos(ctx);
            }
            ShellCommand::SetTodoGroupMode { mode } => {
                self.todos.set_group_mode(mode);
                self.emit_todos(ctx);
            }

            ShellCommand::AddReminder { time, name } => {
                match parse_hhmm(Local::now(), &time) {
                    Ok(trigger) => {
                        self.reminders.add(trigger, name);
                        self.emit_reminders(ctx);
                    }
                    Err(e) => warn!("rejected reminder time '{}': {}", time, e),
                }
            }
            ShellCommand::PopReminder => {
                if self.reminders.pop_next().is_some() {
                    self.emit_reminders(ctx);
                }
            }
            ShellCommand::RemoveReminder { trigger, name } => {
                self.reminders.remove(trigger, &name);
                self.emit_reminders(ctx);
            }
            ShellCommand::ClearReminders => {
                self.reminders.clear();
                self.emit_reminders(ctx);
            }

            ShellCommand::TimerStart => {
                self.timer.start();
                self.emit_timer(ctx);
            }
            ShellCommand::TimerPause => {
                self.timer.pause();
                self.emit_timer(ctx);
            }
            ShellCommand::TimerReset => {
                self.timer.reset();
                self.emit_timer(ctx);
            }
            ShellCommand::TimerAddSecs { secs } => {
                self.timer.add_secs(secs);
                self.emit_timer(ctx);
            }
            ShellCommand::TimerSet { input } => {
                let parsed = if input.contains(':') {
                    timer::timestamp_to_sec(&input)
                } else {
                    input.trim().parse().ok()
                };
                match parsed {
                    Some(secs) => {
                        self.timer.reset();
                        self.timer.add_secs(secs);
                        self.emit_timer(ctx);
                    }
                    None => warn!("rejected timer input '{}'", input),
                }
            }

            ShellCommand::LaunchApp { command } => {
                info!("launching: {}", command);
                let _ = ctx.tasks.spawn_logged("launch-app", async move {
                    tokio::process::Command::new("sh")
                        .arg("-c")
                        .arg(&command)
                        .spawn()
                        .map(|_| ())
                        .map_err(Into::into)
                });
            }

            ShellCommand::Power { action } => {
                let Some(power) = ctx.power.clone() else {
                    warn!("power action requested but logind is unavailable");
                    return;
                };
                let _ = ctx.tasks.spawn_logged("power", async move {
                    power.perform(action).await
                });
            }

            ShellCommand::Quit => self.should_quit = true,
        }
    }

    fn emit_timer(&self, ctx: &ShellCtx) {
        ctx.emit(ShellEvent::TimerTick {
            remaining_secs: self.timer.remaining_secs(),
            display: timer::format_time(self.timer.remaining_secs()),
            running: self.timer.is_running(),
        });
    }

    fn media_command<F, Fut>(&self, ctx: &ShellCtx, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = bool> + Send + 'static,
    {
        let updates = ctx.updates.clone();
        let _ = ctx.tasks.spawn_logged("media", async move {
            action().await;
            ShellCtx::push_from_task(&updates, ShellUpdate::Media(media::info().await));
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn test_shell() -> (TempDir, Shell, ShellCtx, broadcast::Receiver<ShellEvent>) {
        let dir = TempDir::new().unwrap();
        let paths = Paths {
            config_dir: dir.path().join("config"),
            cache_dir: dir.path().join("cache"),
        };
        let shell = Shell::new(Config::default(), paths);

        let (events, rx) = broadcast::channel(64);
        let (updates, _update_rx) = mpsc::channel();
        let ctx = ShellCtx {
            tasks: Arc::new(TaskManager::new().unwrap()),
            events,
            updates,
            notifier: None,
            power: None,
        };
        (dir, shell, ctx, rx)
    }

    fn drain(rx: &mut broadcast::Receiver<ShellEvent>) -> Vec<ShellEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn control_center_suppresses_osd() {
        let (_dir, mut shell, ctx, mut rx) = test_shell();

        shell.toggle_control_center(&ctx);
        assert!(shell.control_center_visible());
        assert!(shell.osd.is_suppressed());

        // A volume change while the control center is open must not pop
        // the OSD.
        shell.apply(
            ShellUpdate::VolumeRead {
                percent: 40,
                muted: false,
                show_osd: true,
            },
            &ctx,
        );

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, ShellEvent::ControlCenterVisible { visible: true })));
        assert!(!events.iter().any(|e| matches!(e, ShellEvent::OsdShow { .. })));

        // Closing it releases the OSD again.
        shell.toggle_control_center(&ctx);
        assert!(!shell.osd.is_suppressed());
        ctx.tasks.shutdown();
    }

    #[test]
    fn calendar_and_control_center_are_mutually_exclusive() {
        let (_dir, mut shell, ctx, mut rx) = test_shell();

        shell.toggle_control_center(&ctx);
        shell.toggle_calendar(&ctx);
        assert!(shell.calendar_visible());
        assert!(!shell.control_center_visible());

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, ShellEvent::ControlCenterVisible { visible: false })));
        assert!(events
            .iter()
            .any(|e| matches!(e, ShellEvent::CalendarVisible { visible: true })));
        ctx.tasks.shutdown();
    }

    #[test]
    fn second_tick_fires_due_reminders_in_order() {
        let (_dir, mut shell, ctx, mut rx) = test_shell();
        let now = Local::now();
        shell
            .reminders
            .add(now - chrono::Duration::minutes(2), "first");
        shell
            .reminders
            .add(now - chrono::Duration::minutes(1), "second");
        shell.reminders.add(now + chrono::Duration::hours(1), "later");

        shell.apply(ShellUpdate::SecondTick, &ctx);

        let events = drain(&mut rx);
        let due: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                ShellEvent::ReminderDue { name } => Some(name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(due, vec!["first".to_string(), "second".to_string()]);

        // The future reminder is still scheduled.
        assert_eq!(shell.reminders.entries_sorted().len(), 1);
        ctx.tasks.shutdown();
    }

    #[test]
    fn wifi_scan_results_release_the_lock() {
        let (_dir, mut shell, ctx, mut rx) = test_shell();
        shell.wifi_scan_lock = true;

        shell.apply(ShellUpdate::WifiScanned(Vec::new()), &ctx);
        assert!(!shell.wifi_scan_lock);

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, ShellEvent::WifiNetworks { .. })));
        ctx.tasks.shutdown();
    }

    #[test]
    fn bluetooth_unlock_is_time_based() {
        let (_dir, mut shell, ctx, mut rx) = test_shell();
        shell.bt_scan_lock = true;

        // The scan itself never finished; the window elapsing still
        // releases the lock.
        shell.apply(ShellUpdate::BluetoothScanWindowElapsed, &ctx);
        assert!(!shell.bt_scan_lock);
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, ShellEvent::BluetoothScanComplete)));
        ctx.tasks.shutdown();
    }

    #[test]
    fn todo_commands_emit_sorted_lists() {
        let (_dir, mut shell, ctx, mut rx) = test_shell();

        shell.apply(
            ShellUpdate::Command(ShellCommand::AddTodo {
                text: "b".into(),
                category: "".into(),
                priority: "P2".into(),
            }),
            &ctx,
        );
        shell.apply(
            ShellUpdate::Command(ShellCommand::AddTodo {
                text: "a".into(),
                category: "".into(),
                priority: "P1".into(),
            }),
            &ctx,
        );

        let events = drain(&mut rx);
        let last_list = events
            .iter()
            .rev()
            .find_map(|e| match e {
                ShellEvent::TodosChanged { todos, .. } => Some(todos.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(last_list[0].text, "a");
        assert_eq!(last_list[1].text, "b");
        ctx.tasks.shutdown();
    }

    #[test]
    fn quit_command_stops_the_loop() {
        let (_dir, mut shell, ctx, _rx) = test_shell();
        shell.apply(ShellUpdate::Command(ShellCommand::Quit), &ctx);
        assert!(shell.should_quit());
        ctx.tasks.shutdown();
    }

    #[test]
    fn renderer_connect_gets_a_sync_state() {
        let (_dir, mut shell, ctx, mut rx) = test_shell();
        shell.apply(ShellUpdate::RendererConnected, &ctx);
        let events = drain(&mut rx);
        assert!(matches!(events.as_slice(), [ShellEvent::SyncState { .. }]));
        ctx.tasks.shutdown();
    }
}
