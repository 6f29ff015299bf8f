//! PulseAudio / PipeWire CLI adapter
//!
//! Sink enumeration, default-sink switching, and volume control via
//! `pactl`. A long-lived `pactl subscribe` reader reports sink change
//! events so the OSD can react to volume changes made elsewhere.

use super::{run_capture, run_ok};
use anyhow::Context;
use goblin_ipc::AudioSink;
use regex::Regex;
use std::process::Stdio;
use std::sync::OnceLock;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::info;

const DEFAULT_SINK: &str = "@DEFAULT_SINK@";

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)%").expect("static regex"))
}

/// Parse `pactl list sinks` into sink entries.
///
/// The output is block-oriented: a `Sink #N` line opens a block and the
/// indented `Name:` / `Description:` lines fill it in.
pub fn parse_sinks(output: &str) -> Vec<AudioSink> {
    let mut sinks = Vec::new();
    let mut current: Option<AudioSink> = None;

    for line in output.lines() {
        if let Some(id) = line.strip_prefix("Sink #") {
            if let Some(sink) = current.take() {
                sinks.push(sink);
            }
            current = Some(AudioSink {
                id: id.trim().to_string(),
                name: String::new(),
                description: String::new(),
            });
        } else if let (Some(sink), Some((key, value))) = (current.as_mut(), line.split_once(':')) {
            match key.trim() {
                "Name" => sink.name = value.trim().to_string(),
                "Description" => sink.description = value.trim().to_string(),
                _ => {}
            }
        }
    }
    if let Some(sink) = current {
        sinks.push(sink);
    }
    sinks
}

/// First percentage in a `pactl get-sink-volume` line.
pub fn parse_volume_percent(output: &str) -> Option<u32> {
    let caps = percent_re().captures(output)?;
    caps[1].parse().ok()
}

/// List audio output devices.
pub async fn sinks() -> Vec<AudioSink> {
    match run_capture("pactl", &["list", "sinks"]).await {
        Some(output) => parse_sinks(&output),
        None => Vec::new(),
    }
}

/// Name of the current default sink.
pub async fn default_sink() -> Option<String> {
    let output = run_capture("pactl", &["get-default-sink"]).await?;
    let name = output.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Switch the default sink, migrating every running stream to it.
pub async fn set_default_sink(sink_name: &str) -> bool {
    if !run_ok("pactl", &["set-default-sink", sink_name]).await {
        return false;
    }
    info!("default sink set to {}", sink_name);

    // Streams opened against the old default stay there unless moved.
    if let Some(output) = run_capture("pactl", &["list", "short", "sink-inputs"]).await {
        for line in output.lines() {
            if let Some(input_id) = line.split_whitespace().next() {
                run_ok("pactl", &["move-sink-input", input_id, sink_name]).await;
            }
        }
    }
    true
}

/// Default sink volume as a percentage.
pub async fn volume() -> Option<u32> {
    let output = run_capture("pactl", &["get-sink-volume", DEFAULT_SINK]).await?;
    parse_volume_percent(&output)
}

pub async fn set_volume(percent: u32) -> bool {
    let value = format!("{}%", percent.min(100));
    run_ok("pactl", &["set-sink-volume", DEFAULT_SINK, &value]).await
}

pub async fn muted() -> bool {
    match run_capture("pactl", &["get-sink-mute", DEFAULT_SINK]).await {
        Some(output) => output.contains("Mute: yes"),
        None => false,
    }
}

pub async fn toggle_mute() -> bool {
    run_ok("pactl", &["set-sink-mute", DEFAULT_SINK, "toggle"]).await
}

/// Follow `pactl subscribe` and invoke the callback on every sink change.
///
/// Runs until the child exits (e.g. the sound server goes away); the
/// caller decides whether to restart it.
pub async fn watch_sink_changes(mut on_change: impl FnMut()) -> anyhow::Result<()> {
    let mut child = Command::new("pactl")
        .arg("subscribe")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .context("failed to spawn pactl subscribe")?;

    let stdout = child
        .stdout
        .take()
        .context("pactl subscribe has no stdout")?;
    let mut lines = BufReader::new(stdout).lines();

    while let Some(line) = lines.next_line().await? {
        if line.contains("'change' on sink") {
            on_change();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Sink #43
\tState: RUNNING
\tName: alsa_output.pci-0000_00_1f.3.analog-stereo
\tDescription: Built-in Audio Analog Stereo
\tDriver: PipeWire
Sink #57
\tState: SUSPENDED
\tName: bluez_output.F4_73_35_8B_70_1E.1
\tDescription: WH-1000XM4
";

    #[test]
    fn parses_sink_blocks() {
        let sinks = parse_sinks(SAMPLE);
        assert_eq!(sinks.len(), 2);
        assert_eq!(sinks[0].id, "43");
        assert_eq!(sinks[0].name, "alsa_output.pci-0000_00_1f.3.analog-stereo");
        assert_eq!(sinks[0].description, "Built-in Audio Analog Stereo");
        assert_eq!(sinks[1].id, "57");
        assert_eq!(sinks[1].description, "WH-1000XM4");
    }

    #[test]
    fn empty_output_parses_to_no_sinks() {
        assert!(parse_sinks("").is_empty());
        assert!(parse_sinks("No sinks available.\n").is_empty());
    }

    #[test]
    fn volume_percent_takes_first_match() {
        let line = "Volume: front-left: 42598 /  65% / -11.25 dB,   front-right: 42598 /  65% / -11.25 dB";
        assert_eq!(parse_volume_percent(line), Some(65));
        assert_eq!(parse_volume_percent("no percents here"), None);
    }
}
