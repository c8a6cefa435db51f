//! Live OS sampler.
//!
//! Builds the flat metric bag from sysinfo plus hwmon temperature sensors
//! on Linux. Metrics whose source is unavailable are omitted rather than
//! reported as zero, so observers can tell "absent" from "idle".

use std::collections::BTreeMap;
use std::path::Path;

use sysinfo::{Disks, Networks, ProcessesToUpdate, System};

use devicepulse_protocol::{MetricValue, TelemetrySnapshot};

use super::Sampler;
use super::format::{format_bytes, format_percent, format_uptime};

/// Samples live system metrics.
///
/// Keeps the previous network counter totals so each snapshot carries the
/// bytes moved since the last tick, not absolute counters.
pub struct SystemSampler {
    system: System,
    disks: Disks,
    networks: Networks,
    hostname: String,
    prev_net: Option<(u64, u64)>,
}

impl SystemSampler {
    pub fn new() -> Self {
        Self {
            system: System::new_all(),
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
            hostname: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
            prev_net: None,
        }
    }

    fn collect_cpu(&self, snap: &mut TelemetrySnapshot) {
        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return;
        }

        let mut cores = BTreeMap::new();
        for (i, cpu) in cpus.iter().enumerate() {
            cores.insert(
                format!("cpu_core_{i}"),
                MetricValue::from(format!("{:.2}", cpu.cpu_usage())),
            );
        }
        snap.insert("cpu_cores", cores);
        snap.insert(
            "cpu_usage",
            format_percent(f64::from(self.system.global_cpu_usage())),
        );

        if let Some(freq) = cpus.iter().map(|c| c.frequency()).max().filter(|f| *f > 0) {
            snap.insert("cpu_mhz", format!("{freq} MHz"));
        }
    }

    fn collect_memory(&self, snap: &mut TelemetrySnapshot) {
        let total = self.system.total_memory();
        if total > 0 {
            let available = self.system.available_memory();
            let used = total.saturating_sub(available);
            snap.insert("total_ram", format_bytes(total));
            snap.insert("free_ram", format_bytes(available));
            snap.insert("used_ram", format_bytes(used));
            snap.insert(
                "used_ram_percentage",
                format_percent(used as f64 / total as f64 * 100.0),
            );
        }

        let swap_total = self.system.total_swap();
        if swap_total > 0 {
            let swap_used = self.system.used_swap();
            snap.insert("swap_total", format_bytes(swap_total));
            snap.insert("swap_used", format_bytes(swap_used));
            snap.insert(
                "swap_percent",
                format_percent(swap_used as f64 / swap_total as f64 * 100.0),
            );
        }
    }

    fn collect_disk(&self, snap: &mut TelemetrySnapshot) {
        // Root filesystem when present, else whatever is listed first.
        let disk = self
            .disks
            .list()
            .iter()
            .find(|d| d.mount_point() == Path::new("/"))
            .or_else(|| self.disks.list().first());
        let Some(disk) = disk else { return };

        let total = disk.total_space();
        if total == 0 {
            return;
        }
        let free = disk.available_space();
        let used = total.saturating_sub(free);
        snap.insert("disk_total", format_bytes(total));
        snap.insert("disk_free", format_bytes(free));
        snap.insert("disk_used", format_bytes(used));
        snap.insert(
            "disk_usage_percent",
            format_percent(used as f64 / total as f64 * 100.0),
        );
    }

    fn collect_network(&mut self, snap: &mut TelemetrySnapshot) {
        let mut rx_total: u64 = 0;
        let mut tx_total: u64 = 0;
        for (_, data) in self.networks.list() {
            rx_total = rx_total.saturating_add(data.total_received());
            tx_total = tx_total.saturating_add(data.total_transmitted());
        }

        // First tick reports the absolute totals; afterwards the delta.
        let (rx, tx) = match self.prev_net {
            Some((prev_rx, prev_tx)) => (
                rx_total.saturating_sub(prev_rx),
                tx_total.saturating_sub(prev_tx),
            ),
            None => (rx_total, tx_total),
        };
        self.prev_net = Some((rx_total, tx_total));

        snap.insert("bytes_received", format_bytes(rx));
        snap.insert("bytes_sent", format_bytes(tx));
    }

    fn collect_system(&self, snap: &mut TelemetrySnapshot) {
        let load = System::load_average();
        snap.insert("load_1", format!("{:.2}", load.one));
        snap.insert("load_5", format!("{:.2}", load.five));
        snap.insert("load_15", format!("{:.2}", load.fifteen));
        snap.insert("uptime", format_uptime(System::uptime()));
        snap.insert("process_count", self.system.processes().len());
        snap.insert("hostname", self.hostname.clone());
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SystemSampler {
    fn sample(&mut self) -> TelemetrySnapshot {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();
        self.system.refresh_processes(ProcessesToUpdate::All, true);
        self.disks.refresh(true);
        self.networks.refresh(true);

        let mut snap = TelemetrySnapshot::new();
        self.collect_cpu(&mut snap);
        self.collect_memory(&mut snap);
        self.collect_disk(&mut snap);
        self.collect_network(&mut snap);
        self.collect_system(&mut snap);
        collect_temperatures(&mut snap);
        snap
    }
}

/// Reads CPU and chipset temperatures from hwmon.
///
/// The first sensor whose chip name matches a known CPU sensor becomes
/// `cpu_temp`; every other chip contributes to `average_chipset_temp`.
#[cfg(target_os = "linux")]
fn collect_temperatures(snap: &mut TelemetrySnapshot) {
    const CPU_SENSORS: [&str; 3] = ["k10temp", "coretemp", "cpu_thermal"];

    let Ok(entries) = std::fs::read_dir("/sys/class/hwmon") else {
        return;
    };

    let mut cpu_temp: Option<f64> = None;
    let mut chipset_temps = Vec::new();

    for entry in entries.flatten() {
        let dir = entry.path();
        let name = std::fs::read_to_string(dir.join("name"))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        // Millidegrees Celsius.
        let Some(milli) = read_sensor(&dir.join("temp1_input")) else {
            continue;
        };
        let celsius = milli as f64 / 1000.0;

        if CPU_SENSORS.contains(&name.as_str()) {
            cpu_temp.get_or_insert(celsius);
        } else {
            chipset_temps.push(celsius);
        }
    }

    if let Some(temp) = cpu_temp {
        snap.insert("cpu_temp", format!("{temp:.2}°C"));
    }
    if !chipset_temps.is_empty() {
        let avg = chipset_temps.iter().sum::<f64>() / chipset_temps.len() as f64;
        snap.insert("average_chipset_temp", format!("{avg:.2}°C"));
    }
}

#[cfg(not(target_os = "linux"))]
fn collect_temperatures(_snap: &mut TelemetrySnapshot) {}

#[cfg(target_os = "linux")]
fn read_sensor(path: &Path) -> Option<i64> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_always_reports_host_identity() {
        let mut sampler = SystemSampler::new();
        let snap = sampler.sample();

        assert!(matches!(snap.get("hostname"), Some(MetricValue::Text(h)) if !h.is_empty()));
        assert!(matches!(
            snap.get("process_count"),
            Some(MetricValue::Integer(_))
        ));
        assert!(snap.get("uptime").is_some());
    }

    #[test]
    fn per_core_usage_is_nested() {
        let mut sampler = SystemSampler::new();
        let snap = sampler.sample();

        if let Some(value) = snap.get("cpu_cores") {
            let MetricValue::Nested(cores) = value else {
                panic!("cpu_cores must be a nested map");
            };
            assert!(cores.keys().all(|k| k.starts_with("cpu_core_")));
        }
    }

    #[test]
    fn consecutive_samples_are_independent_snapshots() {
        let mut sampler = SystemSampler::new();
        let first = sampler.sample();
        let second = sampler.sample();
        assert!(!first.is_empty());
        assert!(!second.is_empty());
    }
}
