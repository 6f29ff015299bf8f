//! NetworkManager CLI adapter
//!
//! Scans, connects, and reads link state by shelling out to `nmcli` and
//! parsing its table output. The row format is whatever the installed
//! nmcli emits; parsing is best-effort with a defined fallback (rows that
//! do not match are dropped).

use super::{run_capture, run_ok};
use goblin_ipc::WifiNetwork;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

const NMCLI_FIELDS: &str = "IN-USE,BSSID,SSID,MODE,CHAN,RATE,SIGNAL,BARS,SECURITY";

/// How long a profile activation is given to settle before we re-read state.
const ACTIVATION_SETTLE: Duration = Duration::from_secs(2);

fn ansi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").expect("static regex"))
}

fn row_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(\*)?\s*([0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5})\s+(.+?)\s+Infra\s+(\d+)\s+(\d+\s*Mbit/s)\s+(\d+)\s+([▂▄▆_]+)\s+(\S.*?)\s*$",
        )
        .expect("static regex")
    })
}

/// Strip terminal color escapes nmcli sprinkles into its table output.
pub fn strip_ansi(text: &str) -> String {
    ansi_re().replace_all(text, "").into_owned()
}

/// Parse one row of `nmcli dev wifi list`.
///
/// Rows that do not look like an infrastructure network entry yield `None`
/// and are skipped by the caller.
pub fn parse_network_row(line: &str) -> Option<WifiNetwork> {
    let cleaned = strip_ansi(line);
    let caps = row_re().captures(&cleaned)?;
    Some(WifiNetwork {
        connected: caps.get(1).is_some(),
        bssid: caps[2].to_string(),
        ssid: caps[3].trim().to_string(),
        channel: caps[4].parse().ok()?,
        speed: caps[5].to_string(),
        signal_strength: caps[6].parse().ok()?,
        bars: caps[7].to_string(),
        security: caps[8].to_string(),
    })
}

/// Ask NetworkManager to refresh its scan cache.
///
/// nmcli blocks until the scan finishes; a short timeout keeps a wedged
/// backend from stalling the caller.
pub async fn rescan() {
    let fut = run_ok("nmcli", &["device", "wifi", "rescan"]);
    if tokio::time::timeout(Duration::from_secs(1), fut).await.is_err() {
        debug!("wifi rescan timed out, proceeding with cached results");
    }
}

/// Full network listing, newest scan results.
pub async fn list_networks() -> Vec<WifiNetwork> {
    let Some(output) = run_capture("nmcli", &["-f", NMCLI_FIELDS, "dev", "wifi", "list"]).await
    else {
        return Vec::new();
    };
    output
        .lines()
        .skip(1) // header row
        .filter_map(parse_network_row)
        .collect()
}

/// Name of the first active Wi-Fi connection, if any.
pub async fn active_ssid() -> Option<String> {
    let output = run_capture("nmcli", &["-t", "-f", "NAME,TYPE", "con", "show", "--active"]).await?;
    for line in output.lines() {
        let lower = line.to_lowercase();
        if line.contains(':') && (lower.contains("wifi") || lower.contains("802-11-wireless")) {
            let name = line.split(':').next()?;
            return Some(strip_ansi(name));
        }
    }
    None
}

/// Whether this machine has any Wi-Fi capable device.
pub async fn wifi_supported() -> bool {
    match run_capture("nmcli", &["-t", "-f", "DEVICE,TYPE", "device"]).await {
        Some(output) => output.lines().any(|line| line.contains("wifi")),
        None => false,
    }
}

/// Toggle the Wi-Fi radio.
pub async fn set_power(enabled: bool) -> bool {
    let state = if enabled { "on" } else { "off" };
    run_ok("nmcli", &["radio", "wifi", state]).await
}

/// Take a connection down by profile name.
pub async fn disconnect(name: &str) -> bool {
    run_ok("nmcli", &["con", "down", name]).await
}

/// Delete a saved connection profile.
pub async fn forget(ssid: &str) -> bool {
    run_ok("nmcli", &["connection", "delete", ssid]).await
}

/// Outcome of a connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    /// Secured network with no saved profile and no password supplied.
    PasswordRequired,
    Failed(String),
}

/// Connect to a network, creating a profile when none is saved.
///
/// Secured networks try the saved profile first; open networks get a bare
/// profile. When the user opted out of remembering the network the profile
/// is created with autoconnect disabled.
pub async fn connect(
    ssid: &str,
    open_network: bool,
    password: Option<&str>,
    remember: bool,
) -> ConnectOutcome {
    if !open_network {
        if has_saved_profile(ssid).await {
            info!("activating saved profile for '{}'", ssid);
            if activate(ssid).await {
                return ConnectOutcome::Connected;
            }
        }

        let Some(password) = password else {
            return ConnectOutcome::PasswordRequired;
        };

        let mut args = vec![
            "con",
            "add",
            "type",
            "wifi",
            "con-name",
            ssid,
            "ssid",
            ssid,
            "wifi-sec.key-mgmt",
            "wpa-psk",
            "wifi-sec.psk",
            password,
        ];
        if !remember {
            args.extend(["connection.autoconnect", "no"]);
        }

        match Command::new("nmcli").args(&args).output().await {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                warn!("failed to create profile for '{}': {}", ssid, stderr);
                return ConnectOutcome::Failed(stderr);
            }
            Err(err) => return ConnectOutcome::Failed(err.to_string()),
        }
    } else {
        let args = ["con", "add", "type", "wifi", "con-name", ssid, "ssid", ssid];
        if !run_ok("nmcli", &args).await {
            return ConnectOutcome::Failed("could not create open profile".into());
        }
    }

    if activate(ssid).await {
        ConnectOutcome::Connected
    } else {
        ConnectOutcome::Failed(format!("could not activate '{}'", ssid))
    }
}

async fn has_saved_profile(ssid: &str) -> bool {
    match run_capture("nmcli", &["-t", "-f", "name", "connection", "show"]).await {
        Some(output) => output.lines().any(|line| line.trim() == ssid),
        None => false,
    }
}

async fn activate(ssid: &str) -> bool {
    if run_ok("nmcli", &["con", "up", ssid]).await {
        tokio::time::sleep(ACTIVATION_SETTLE).await;
        true
    } else {
        false
    }
}

/// First wireless interface under `/sys/class/net`.
pub fn default_wifi_iface(net_dir: &Path) -> Option<String> {
    let entries = std::fs::read_dir(net_dir).ok()?;
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("wl"))
        .collect();
    names.sort();
    names.into_iter().next()
}

/// Byte-counter based link throughput sampler.
///
/// Reads the interface's rx/tx counters and reports the per-second rate
/// since the previous sample. The first sample primes the counters and
/// reports nothing.
pub struct LinkThroughput {
    stats_dir: PathBuf,
    prev: Option<(Instant, u64, u64)>,
}

impl LinkThroughput {
    pub fn new(net_dir: &Path, iface: &str) -> Self {
        Self {
            stats_dir: net_dir.join(iface).join("statistics"),
            prev: None,
        }
    }

    /// (rx bytes/s, tx bytes/s) since the last call.
    pub fn sample(&mut self) -> Option<(u64, u64)> {
        let rx = read_counter(&self.stats_dir.join("rx_bytes"))?;
        let tx = read_counter(&self.stats_dir.join("tx_bytes"))?;
        let now = Instant::now();

        let rate = self.prev.map(|(at, prev_rx, prev_tx)| {
            let secs = now.duration_since(at).as_secs_f64().max(0.001);
            (
                ((rx.saturating_sub(prev_rx)) as f64 / secs) as u64,
                ((tx.saturating_sub(prev_tx)) as f64 / secs) as u64,
            )
        });
        self.prev = Some((now, rx, tx));
        rate
    }
}

fn read_counter(path: &Path) -> Option<u64> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_connected_network_row() {
        let line = "* AA:BB:CC:DD:EE:FF  MyNetwork  Infra  6  130 Mbit/s  72  ▂▄▆_  WPA2";
        let network = parse_network_row(line).unwrap();
        assert!(network.connected);
        assert_eq!(network.bssid, "AA:BB:CC:DD:EE:FF");
        assert_eq!(network.ssid, "MyNetwork");
        assert_eq!(network.channel, 6);
        assert_eq!(network.signal_strength, 72);
        assert_eq!(network.security, "WPA2");
        assert_eq!(network.speed, "130 Mbit/s");
        assert_eq!(network.bars, "▂▄▆_");
    }

    #[test]
    fn parses_disconnected_row_with_spaces_in_ssid() {
        let line = "  11:22:33:44:55:66  Coffee Shop Guest  Infra  11  270 Mbit/s  45  ▂▄__  WPA2 WPA3";
        let network = parse_network_row(line).unwrap();
        assert!(!network.connected);
        assert_eq!(network.ssid, "Coffee Shop Guest");
        assert_eq!(network.channel, 11);
        assert_eq!(network.security, "WPA2 WPA3");
    }

    #[test]
    fn strips_ansi_escapes_before_matching() {
        let line = "\x1b[32m* AA:BB:CC:DD:EE:FF  Home  Infra  1  54 Mbit/s  88  ▂▄▆_  WPA2\x1b[0m";
        let network = parse_network_row(line).unwrap();
        assert_eq!(network.ssid, "Home");
        assert_eq!(network.signal_strength, 88);
    }

    #[test]
    fn rejects_header_and_garbage_rows() {
        assert!(parse_network_row("IN-USE  BSSID  SSID  MODE  CHAN  RATE  SIGNAL  BARS  SECURITY").is_none());
        assert!(parse_network_row("").is_none());
        assert!(parse_network_row("not a network line at all").is_none());
        // Ad-hoc rows are not infrastructure entries.
        assert!(parse_network_row("  AA:BB:CC:DD:EE:FF  X  Ad-Hoc  6  54 Mbit/s  20  ▂___  WPA2").is_none());
    }

    #[test]
    fn throughput_sampler_primes_then_reports() {
        let dir = tempfile::TempDir::new().unwrap();
        let stats = dir.path().join("wlan0").join("statistics");
        std::fs::create_dir_all(&stats).unwrap();
        std::fs::write(stats.join("rx_bytes"), "1000\n").unwrap();
        std::fs::write(stats.join("tx_bytes"), "500\n").unwrap();

        let mut sampler = LinkThroughput::new(dir.path(), "wlan0");
        assert!(sampler.sample().is_none());

        std::fs::write(stats.join("rx_bytes"), "3000\n").unwrap();
        std::fs::write(stats.join("tx_bytes"), "600\n").unwrap();
        let (rx, tx) = sampler.sample().unwrap();
        // Elapsed time is tiny, so the rate is at least the raw delta.
        assert!(rx >= 2000);
        assert!(tx >= 100);
    }

    #[test]
    fn finds_wireless_iface_by_prefix() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("eth0")).unwrap();
        std::fs::create_dir_all(dir.path().join("wlp3s0")).unwrap();
        std::fs::create_dir_all(dir.path().join("lo")).unwrap();
        assert_eq!(
            default_wifi_iface(dir.path()).as_deref(),
            Some("wlp3s0")
        );
    }
}
