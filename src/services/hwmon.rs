//! Hardware monitor
//!
//! CPU, memory, temperature, and disk samples via `sysinfo`, plus the
//! uptime string for the profile widget. Sampling runs off the main loop;
//! only the finished sample crosses back over the update channel.

use goblin_ipc::HwSample;
use sysinfo::{Components, Disks, System};

const GIB: f64 = (1024u64 * 1024 * 1024) as f64;

/// Keeps the sysinfo handles alive between samples; CPU usage needs the
/// previous refresh as a baseline to mean anything.
pub struct HwMonitor {
    sys: System,
    disks: Disks,
    components: Components,
}

impl HwMonitor {
    pub fn new() -> Self {
        Self {
            sys: System::new_all(),
            disks: Disks::new_with_refreshed_list(),
            components: Components::new_with_refreshed_list(),
        }
    }

    pub fn sample(&mut self) -> HwSample {
        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();
        self.disks.refresh();
        self.components.refresh();

        let total_mem = self.sys.total_memory();
        let used_mem = total_mem.saturating_sub(self.sys.available_memory());
        let ram_percent = if total_mem > 0 {
            used_mem as f32 / total_mem as f32
        } else {
            0.0
        };

        let (disk_percent, disk_used_gib) = self.root_disk_usage();

        HwSample {
            cpu_percent: self.sys.global_cpu_usage().clamp(0.0, 100.0).round() as u32,
            cpu_temp: self.first_component_temp(),
            ram_percent,
            ram_used_gib: used_mem as f64 / GIB,
            disk_percent,
            disk_used_gib,
        }
    }

    fn root_disk_usage(&self) -> (f32, f64) {
        let root = self
            .disks
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new("/"))
            .or_else(|| self.disks.iter().next());
        match root {
            Some(disk) if disk.total_space() > 0 => {
                let used = disk.total_space().saturating_sub(disk.available_space());
                (
                    used as f32 / disk.total_space() as f32,
                    used as f64 / GIB,
                )
            }
            _ => (0.0, 0.0),
        }
    }

    /// First thermal sensor, 0 when none is exposed.
    fn first_component_temp(&self) -> i32 {
        self.components
            .iter()
            .next()
            .map(|c| c.temperature().round() as i32)
            .unwrap_or(0)
    }
}

impl Default for HwMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// `"{days}d {hours}h {minutes}m"`, the profile widget's uptime line.
pub fn format_uptime(elapsed_secs: u64) -> String {
    let days = elapsed_secs / 86_400;
    let hours = (elapsed_secs % 86_400) / 3_600;
    let minutes = (elapsed_secs % 3_600) / 60;
    format!("{}d {}h {}m", days, hours, minutes)
}

/// Current system uptime, formatted.
pub fn uptime_pretty() -> String {
    format_uptime(System::uptime())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_is_within_sane_bounds() {
        let mut monitor = HwMonitor::new();
        let sample = monitor.sample();
        assert!(sample.cpu_percent <= 100);
        assert!((0.0..=1.0).contains(&sample.ram_percent));
        assert!((0.0..=1.0).contains(&sample.disk_percent));
        assert!(sample.ram_used_gib >= 0.0);
    }

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(0), "0d 0h 0m");
        assert_eq!(format_uptime(59), "0d 0h 0m");
        assert_eq!(format_uptime(60), "0d 0h 1m");
        assert_eq!(format_uptime(86_400 + 3_600 + 120), "1d 1h 2m");
        assert_eq!(format_uptime(3 * 86_400 + 23 * 3_600 + 59 * 60), "3d 23h 59m");
    }
}
