//! playerctl adapter
//!
//! Point-in-time queries against whatever MPRIS player is active. No
//! player (playerctl exits non-zero) means no media info.

use super::{run_capture, run_ok};
use goblin_ipc::MediaInfo;
use tokio::process::Command;

/// Playback status of the active player, or `None` when there is none.
async fn status() -> Option<String> {
    let output = Command::new("playerctl")
        .arg("status")
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

async fn metadata(key: &str) -> String {
    run_capture("playerctl", &["metadata", key])
        .await
        .map(|out| out.trim().to_string())
        .unwrap_or_default()
}

/// Snapshot of the active player, if any.
pub async fn info() -> Option<MediaInfo> {
    let status = status().await?;
    let position = run_capture("playerctl", &["position"])
        .await
        .and_then(|out| out.trim().parse::<f64>().ok());

    Some(MediaInfo {
        artist: metadata("artist").await,
        title: metadata("title").await,
        playing: status == "Playing",
        position_secs: position,
    })
}

pub async fn play_pause() -> bool {
    run_ok("playerctl", &["play-pause"]).await
}

pub async fn next() -> bool {
    run_ok("playerctl", &["next"]).await
}

pub async fn previous() -> bool {
    run_ok("playerctl", &["previous"]).await
}
