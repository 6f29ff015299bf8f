//! Backlight adapter
//!
//! Reads and sets the screen backlight through `brightnessctl`. Levels
//! are in the device's raw scale; the OSD converts to its 0-255 range.

use super::{run_capture, run_ok};

async fn read_value(args: &[&str]) -> Option<u32> {
    run_capture("brightnessctl", args)
        .await?
        .trim()
        .parse()
        .ok()
}

/// Current and maximum backlight level, when a backlight exists.
pub async fn level() -> Option<(u32, u32)> {
    let current = read_value(&["get"]).await?;
    let max = read_value(&["max"]).await?;
    if max == 0 {
        return None;
    }
    Some((current, max))
}

pub async fn set_level(level: u32) -> bool {
    run_ok("brightnessctl", &["set", &level.to_string()]).await
}
