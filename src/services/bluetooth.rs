//! bluetoothctl adapter
//!
//! Device discovery and pairing by driving `bluetoothctl` as a child
//! process. Discovery runs `scan on` for a fixed window and then reads the
//! controller's device list; the scan window is enforced by the caller's
//! scan lock, cleared on a timer regardless of how the scan actually went.

use super::{run_capture, run_ok};
use goblin_ipc::BluetoothDevice;
use std::collections::BTreeSet;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Minimum plausible `XX:XX:XX:XX:XX:XX` length.
const MAC_LEN: usize = 17;

/// Whether a `bluetoothctl devices` line names a real device.
///
/// The tool mixes help text and menu output into stdout; only lines of the
/// form `Device <mac> <name>` count.
pub fn is_valid_device_line(line: &str) -> bool {
    let trimmed = line.trim();
    if !trimmed.starts_with("Device") {
        return false;
    }
    let mut parts = trimmed.splitn(3, ' ');
    let _ = parts.next();
    match parts.next() {
        Some(mac) => mac.contains(':') && mac.len() >= MAC_LEN,
        None => false,
    }
}

/// Parse a validated device line into (address, name).
pub fn parse_device_line(line: &str) -> Option<(String, String)> {
    if !is_valid_device_line(line) {
        return None;
    }
    let mut parts = line.trim().splitn(3, ' ');
    let _ = parts.next();
    let address = parts.next()?.to_string();
    let name = parts.next().unwrap_or("").to_string();
    Some((address, name))
}

/// Pull the device class icon and connection state out of
/// `bluetoothctl info <mac>` output.
pub fn parse_device_status(output: &str) -> (Option<String>, bool) {
    let device_type = output
        .lines()
        .find_map(|line| line.split("Icon: ").nth(1))
        .map(|icon| icon.trim().to_string());
    let connected = output.contains("Connected: yes");
    (device_type, connected)
}

/// Whether the controller is powered on.
pub async fn powered() -> bool {
    match run_capture("bluetoothctl", &["show"]).await {
        Some(output) => output.contains("Powered: yes"),
        None => false,
    }
}

pub async fn set_powered(enabled: bool) -> bool {
    let state = if enabled { "on" } else { "off" };
    run_ok("bluetoothctl", &["power", state]).await
}

pub async fn device_status(address: &str) -> (Option<String>, bool) {
    match run_capture("bluetoothctl", &["info", address]).await {
        Some(output) => parse_device_status(&output),
        None => (None, false),
    }
}

/// Known devices: paired first, then everything the controller has seen.
pub async fn devices() -> Vec<BluetoothDevice> {
    let paired = run_capture("bluetoothctl", &["paired-devices"])
        .await
        .unwrap_or_default();
    let all = run_capture("bluetoothctl", &["devices"])
        .await
        .unwrap_or_default();

    let mut seen = BTreeSet::new();
    let mut devices = Vec::new();
    for line in paired.lines().chain(all.lines()) {
        if let Some((address, name)) = parse_device_line(line) {
            if seen.insert(address.clone()) {
                devices.push(BluetoothDevice {
                    address,
                    name,
                    device_type: None,
                    connected: false,
                });
            }
        }
    }

    // Connection state comes from per-device info queries.
    for device in &mut devices {
        let (device_type, connected) = device_status(&device.address).await;
        device.device_type = device_type;
        device.connected = connected;
    }
    devices
}

/// Run a discovery scan for `duration`, then return the device list.
///
/// The controller is powered on and made discoverable/pairable first to
/// improve discovery; `scan on` is killed after the window since it never
/// exits on its own.
pub async fn scan(duration: Duration) -> Vec<BluetoothDevice> {
    run_ok("bluetoothctl", &["power", "on"]).await;
    run_ok("bluetoothctl", &["discoverable", "on"]).await;
    run_ok("bluetoothctl", &["pairable", "on"]).await;

    info!("starting bluetooth scan for {:?}", duration);
    match Command::new("bluetoothctl")
        .args(["scan", "on"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(mut child) => {
            tokio::time::sleep(duration).await;
            if let Err(err) = child.kill().await {
                debug!("failed to stop scan process: {}", err);
            }
        }
        Err(err) => {
            debug!("failed to start bluetooth scan: {}", err);
        }
    }
    run_ok("bluetoothctl", &["scan", "off"]).await;

    devices().await
}

pub async fn pair(address: &str) -> bool {
    run_ok("bluetoothctl", &["pair", address]).await
}

pub async fn connect_device(address: &str) -> bool {
    run_ok("bluetoothctl", &["connect", address]).await
}

pub async fn disconnect_device(address: &str) -> bool {
    run_ok("bluetoothctl", &["disconnect", address]).await
}

pub async fn forget_device(address: &str) -> bool {
    run_ok("bluetoothctl", &["remove", address]).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_real_device_lines() {
        let line = "Device F4:73:35:8B:70:1E WH-1000XM4";
        assert!(is_valid_device_line(line));
        let (address, name) = parse_device_line(line).unwrap();
        assert_eq!(address, "F4:73:35:8B:70:1E");
        assert_eq!(name, "WH-1000XM4");
    }

    #[test]
    fn rejects_help_text_and_short_macs() {
        assert!(!is_valid_device_line(""));
        assert!(!is_valid_device_line("Missing device address argument"));
        assert!(!is_valid_device_line("[bluetooth]# devices"));
        assert!(!is_valid_device_line("Device AB:CD short"));
        assert!(!is_valid_device_line("Device"));
    }

    #[test]
    fn device_without_name_still_parses() {
        let (address, name) = parse_device_line("Device 00:11:22:33:44:55").unwrap();
        assert_eq!(address, "00:11:22:33:44:55");
        assert_eq!(name, "");
    }

    #[test]
    fn status_parse_extracts_icon_and_connection() {
        let output = "Device F4:73:35:8B:70:1E (public)\n\
                      \tName: WH-1000XM4\n\
                      \tIcon: audio-headset\n\
                      \tPaired: yes\n\
                      \tConnected: yes\n";
        let (device_type, connected) = parse_device_status(output);
        assert_eq!(device_type.as_deref(), Some("audio-headset"));
        assert!(connected);
    }

    #[test]
    fn status_parse_handles_missing_icon() {
        let output = "Device 00:11:22:33:44:55 (public)\n\tConnected: no\n";
        let (device_type, connected) = parse_device_status(output);
        assert!(device_type.is_none());
        assert!(!connected);
    }
}
