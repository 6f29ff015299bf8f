//! Battery poller
//!
//! Samples `/sys/class/power_supply` once a second. A machine without a
//! battery sensor reports the safe default of 100% / charging so the bar
//! widget renders something sensible.

use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryStatus {
    pub percent: f64,
    pub charging: bool,
}

impl Default for BatteryStatus {
    fn default() -> Self {
        // No sensor present: treat as desktop on mains power.
        Self {
            percent: 100.0,
            charging: true,
        }
    }
}

/// Sample the first `BAT*` supply under `power_supply_dir`.
pub fn sample(power_supply_dir: &Path) -> BatteryStatus {
    let Some(bat_dir) = find_battery(power_supply_dir) else {
        return BatteryStatus::default();
    };

    let percent = fs::read_to_string(bat_dir.join("capacity"))
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(100.0);

    let status = fs::read_to_string(bat_dir.join("status"))
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    // Everything except active discharge counts as plugged in.
    let charging = status != "Discharging";

    BatteryStatus { percent, charging }
}

fn find_battery(power_supply_dir: &Path) -> Option<std::path::PathBuf> {
    let entries = fs::read_dir(power_supply_dir).ok()?;
    let mut batteries: Vec<_> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("BAT"))
        .map(|e| e.path())
        .collect();
    batteries.sort();
    batteries.into_iter().next()
}
