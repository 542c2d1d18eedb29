//! Worker host telemetry (spec.md §3, §4.3 stats loop).
//!
//! Fills the role the teacher's `diagnostics.rs`/`system.rs` fill with
//! `sysinfo`, which stands in for the original program's `gopsutil`.

use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};

/// Point-in-time snapshot of the worker host (spec.md §3).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Stats {
    pub mem_total: u64,
    pub mem_available: u64,
    pub mem_used: u64,
    pub disk_total: u64,
    pub disk_free: u64,
    pub disk_used: u64,
    pub load_one: f64,
    pub load_five: f64,
    pub load_fifteen: f64,
    pub cpu_percent: f32,
    pub task_count: usize,
}

/// Samples host telemetry. `sysinfo`'s own calls degrade to zero on
/// unsupported platforms rather than returning an error, so this
/// never needs its own fallback path (spec.md §7: host-telemetry
/// errors degrade to empty records).
pub fn sample(task_count: usize) -> Stats {
    let mut sys = System::new_all();
    sys.refresh_all();

    let disks = Disks::new_with_refreshed_list();
    let (disk_total, disk_free) = disks
        .iter()
        .fold((0u64, 0u64), |(total, free), disk| {
            (total + disk.total_space(), free + disk.available_space())
        });

    let load = System::load_average();
    let cpu_percent = if sys.cpus().is_empty() {
        0.0
    } else {
        sys.cpus().iter().map(|c| c.cpu_usage()).sum::<f32>() / sys.cpus().len() as f32
    };

    Stats {
        mem_total: sys.total_memory(),
        mem_available: sys.available_memory(),
        mem_used: sys.used_memory(),
        disk_total,
        disk_free,
        disk_used: disk_total.saturating_sub(disk_free),
        load_one: load.one,
        load_five: load.five,
        load_fifteen: load.fifteen,
        cpu_percent,
        task_count,
    }
}
