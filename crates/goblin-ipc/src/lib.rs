//! Goblin IPC Protocol
//!
//! Shared message types for communication between the `goblin` shell daemon
//! and whatever renderer process draws the bar / control center / OSD.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Socket path for IPC communication
pub fn socket_path() -> std::path::PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .unwrap_or_else(|_| format!("/run/user/{}", unsafe { libc::getuid() }));
    std::path::PathBuf::from(runtime_dir).join("goblin-shell.sock")
}

// ============================================================================
// Shared data types
// ============================================================================

/// One row of a Wi-Fi scan, rebuilt from scratch on every scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WifiNetwork {
    pub ssid: String,
    pub security: String,
    pub connected: bool,
    pub bssid: String,
    pub channel: u32,
    pub speed: String,
    pub signal_strength: u32,
    pub bars: String,
}

/// A Bluetooth device as reported by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BluetoothDevice {
    pub address: String,
    pub name: String,
    /// Device class icon name (`bluetoothctl info` "Icon:" line), if known.
    pub device_type: Option<String>,
    pub connected: bool,
}

/// An audio output device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSink {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Hardware monitor sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HwSample {
    pub cpu_percent: u32,
    pub cpu_temp: i32,
    pub ram_percent: f32,
    pub ram_used_gib: f64,
    pub disk_percent: f32,
    pub disk_used_gib: f64,
}

/// Current media player state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub artist: String,
    pub title: String,
    pub playing: bool,
    pub position_secs: Option<f64>,
}

/// A single todo entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub text: String,
    pub completed: bool,
    pub category: String,
    pub deadline: String,
    pub priority: String,
}

/// Display grouping for the todo list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
    Category,
    Priority,
}

/// A scheduled reminder. Ordering is by trigger time, then name, which is
/// what the scheduler's min-heap relies on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReminderEntry {
    pub trigger: DateTime<Local>,
    pub name: String,
}

/// Session power actions, routed through systemd-logind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    Suspend,
    Hibernate,
    Reboot,
    PowerOff,
}

/// Which overlay the OSD is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsdKind {
    Volume,
    Brightness,
}

// ============================================================================
// Daemon → Renderer Events
// ============================================================================

/// Events sent from the shell daemon to connected renderers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ShellEvent {
    /// Initial state sync (sent on renderer connect)
    SyncState {
        control_center_visible: bool,
        calendar_visible: bool,
        todos: Vec<Todo>,
        group_mode: GroupMode,
        reminders: Vec<ReminderEntry>,
        ws_icons: Vec<String>,
        font: String,
    },

    /// The theme import file was rewritten
    ThemeApplied { theme: String, fallback: bool },

    /// A stylesheet in the styles directory changed on disk
    CssReloaded { path: String },

    /// Control center toggled
    ControlCenterVisible { visible: bool },

    /// Calendar popup toggled
    CalendarVisible { visible: bool },

    /// OSD should appear with the given level (percent of its scale)
    OsdShow { kind: OsdKind, value: f64 },

    /// OSD hide timer fired
    OsdHide,

    /// Battery sample
    Battery { percent: f64, charging: bool },

    /// Hardware monitor sample
    Hardware(HwSample),

    /// Uptime string, refreshed once a minute
    Uptime { pretty: String },

    /// Bar clock / date line, refreshed once a second
    Clock { date: String },

    /// Link throughput since the previous sample
    NetSpeed { rx_bytes_per_sec: u64, tx_bytes_per_sec: u64 },

    /// A Wi-Fi scan kicked off
    WifiScanStarted,

    /// Wi-Fi scan results
    WifiNetworks { networks: Vec<WifiNetwork> },

    /// Wi-Fi scan or connect failure, for the status label
    WifiStatus { message: String },

    /// Currently connected SSID changed
    WifiActiveSsid { ssid: Option<String> },

    /// Wi-Fi radio power state
    WifiPowerChanged { enabled: bool },

    /// A Bluetooth scan kicked off
    BluetoothScanStarted,

    /// Bluetooth device list after a scan
    BluetoothDevices { devices: Vec<BluetoothDevice> },

    /// Bluetooth scan window elapsed
    BluetoothScanComplete,

    /// Controller power state
    BluetoothPower { enabled: bool },

    /// Audio sink list and current default
    AudioSinks {
        sinks: Vec<AudioSink>,
        default_sink: Option<String>,
    },

    /// Default sink volume or mute changed
    VolumeChanged { percent: u32, muted: bool },

    /// Backlight level changed
    BrightnessChanged { level: u32, max: u32 },

    /// Media player state
    MediaChanged { info: Option<MediaInfo> },

    /// A reminder's trigger time has passed
    ReminderDue { name: String },

    /// The reminder list changed (sorted by trigger time)
    RemindersChanged { reminders: Vec<ReminderEntry> },

    /// The todo list changed (already sorted for display)
    TodosChanged {
        todos: Vec<Todo>,
        group_mode: GroupMode,
    },

    /// Countdown timer tick; `display` is the `MM:SS` / `HH:MM:SS` label
    TimerTick {
        remaining_secs: u64,
        display: String,
        running: bool,
    },

    /// Countdown timer reached zero
    TimerFinished,
}

// ============================================================================
// Renderer → Daemon Commands
// ============================================================================

/// Commands sent from a renderer to the shell daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ShellCommand {
    /// Toggle the control center (suppresses the OSD while visible)
    ToggleControlCenter,

    /// Toggle the calendar popup (hides the control center)
    ToggleCalendar,

    /// Set default sink volume (0-100)
    SetVolume { percent: u32 },

    /// Toggle default sink mute
    ToggleMute,

    /// Switch the default audio sink, moving running streams with it
    SetDefaultSink { name: String },

    /// Refresh the audio sink list
    RefreshSinks,

    /// Set backlight level (0-255 scale)
    SetBrightness { level: u32 },

    /// Rescan and list Wi-Fi networks
    WifiScan,

    /// Connect to a network, creating a profile when needed.
    /// `security` is the scan row's security column; `"open"` means no key.
    WifiConnect {
        ssid: String,
        security: String,
        password: Option<String>,
        remember: bool,
    },

    /// Take a connection down
    WifiDisconnect { name: String },

    /// Delete a saved connection profile
    WifiForget { ssid: String },

    /// Toggle the Wi-Fi radio
    SetWifiPower { enabled: bool },

    /// Run a Bluetooth discovery scan
    BluetoothScan,

    /// Power the Bluetooth controller on or off
    SetBluetoothPower { enabled: bool },

    BluetoothPair { address: String },
    BluetoothConnect { address: String },
    BluetoothDisconnect { address: String },
    BluetoothForget { address: String },

    MediaPlayPause,
    MediaNext,
    MediaPrevious,

    /// Add a todo (priority "P1"-"P4")
    AddTodo {
        text: String,
        category: String,
        priority: String,
    },

    /// Toggle completion by list index
    ToggleTodo { index: usize },

    /// Remove by list index
    RemoveTodo { index: usize },

    ClearTodos,

    SetTodoGroupMode { mode: GroupMode },

    /// Add a reminder; `time` is HHMM, today's date
    AddReminder { time: String, name: String },

    /// Drop the next-due reminder
    PopReminder,

    /// Remove a specific reminder by value
    RemoveReminder {
        trigger: DateTime<Local>,
        name: String,
    },

    ClearReminders,

    TimerStart,
    TimerPause,
    TimerReset,
    TimerAddSecs { secs: u64 },

    /// Set the timer from entry text: `MM:SS`, `HH:MM:SS`, or plain seconds
    TimerSet { input: String },

    /// Launch an external application
    LaunchApp { command: String },

    /// Suspend / reboot / power off through logind
    Power { action: PowerAction },

    /// Shut the daemon down
    Quit,
}

// ============================================================================
// Message Framing
// ============================================================================

/// A framed message with length prefix for reliable socket reads
#[derive(Debug)]
pub struct FramedMessage {
    pub data: Vec<u8>,
}

impl FramedMessage {
    /// Create a new framed message from serializable data
    pub fn new<T: Serialize>(msg: &T) -> anyhow::Result<Self> {
        let data = serde_json::to_vec(msg)?;
        Ok(Self { data })
    }

    /// Encode message with length prefix (4 bytes, big-endian)
    pub fn encode(&self) -> Vec<u8> {
        let len = self.data.len() as u32;
        let mut buf = Vec::with_capacity(4 + self.data.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }

    /// Decode a shell event from bytes
    pub fn decode_shell_event(data: &[u8]) -> anyhow::Result<ShellEvent> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Decode a shell command from bytes
    pub fn decode_shell_command(data: &[u8]) -> anyhow::Result<ShellCommand> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_shell_event() {
        let event = ShellEvent::WifiNetworks {
            networks: vec![WifiNetwork {
                ssid: "MyNetwork".into(),
                security: "WPA2".into(),
                connected: true,
                bssid: "AA:BB:CC:DD:EE:FF".into(),
                channel: 6,
                speed: "130 Mbit/s".into(),
                signal_strength: 72,
                bars: "▂▄▆_".into(),
            }],
        };

        let msg = FramedMessage::new(&event).unwrap();
        let decoded = FramedMessage::decode_shell_event(&msg.data).unwrap();

        match decoded {
            ShellEvent::WifiNetworks { networks } => {
                assert_eq!(networks.len(), 1);
                assert_eq!(networks[0].ssid, "MyNetwork");
                assert!(networks[0].connected);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_roundtrip_shell_command() {
        let cmd = ShellCommand::WifiConnect {
            ssid: "MyNetwork".into(),
            security: "WPA2".into(),
            password: Some("hunter2".into()),
            remember: false,
        };

        let msg = FramedMessage::new(&cmd).unwrap();
        let decoded = FramedMessage::decode_shell_command(&msg.data).unwrap();

        match decoded {
            ShellCommand::WifiConnect {
                ssid,
                password,
                remember,
                ..
            } => {
                assert_eq!(ssid, "MyNetwork");
                assert_eq!(password.as_deref(), Some("hunter2"));
                assert!(!remember);
            }
            _ => panic!("Wrong command type"),
        }
    }

    #[test]
    fn test_encode_prefixes_length() {
        let msg = FramedMessage::new(&ShellCommand::Quit).unwrap();
        let encoded = msg.encode();
        let len = u32::from_be_bytes(encoded[..4].try_into().unwrap()) as usize;
        assert_eq!(len, encoded.len() - 4);
    }
}
