//! Synthetic sampler: plausible random values, no OS access.

use std::collections::BTreeMap;

use rand::Rng;

use devicepulse_protocol::{MetricValue, TelemetrySnapshot};

use super::Sampler;
use super::format::format_percent;

/// Generates a metric bag with the same key set as the live sampler.
#[derive(Debug, Default)]
pub struct SyntheticSampler;

impl SyntheticSampler {
    pub fn new() -> Self {
        Self
    }
}

impl Sampler for SyntheticSampler {
    fn sample(&mut self) -> TelemetrySnapshot {
        let mut rng = rand::rng();
        let mut snap = TelemetrySnapshot::new();

        let mut cores = BTreeMap::new();
        for i in 0..8 {
            cores.insert(
                format!("cpu_core_{i}"),
                MetricValue::from(format!("{:.2}", rng.random_range(50.0..61.0))),
            );
        }
        snap.insert("cpu_cores", cores);
        snap.insert("cpu_usage", format_percent(rng.random_range(5.0..95.0)));
        snap.insert("cpu_mhz", "3200 MHz");
        snap.insert("cpu_temp", format!("{:.2}°C", rng.random_range(40.0..70.0)));
        snap.insert(
            "average_chipset_temp",
            format!("{:.2}°C", rng.random_range(40.0..70.0)),
        );

        snap.insert("total_ram", "16.0 GiB");
        snap.insert("free_ram", "8.0 GiB");
        snap.insert("used_ram", "8.0 GiB");
        snap.insert("used_ram_percentage", "50.0%");
        snap.insert("swap_total", "2.0 GiB");
        snap.insert("swap_used", "1.0 GiB");
        snap.insert("swap_percent", "50.0%");

        snap.insert("disk_total", "1.0 TiB");
        snap.insert("disk_free", "512.0 GiB");
        snap.insert("disk_used", "512.0 GiB");
        snap.insert("disk_usage_percent", "50.0%");

        snap.insert(
            "bytes_sent",
            format!("{} B", rng.random_range(500u64..=1000)),
        );
        snap.insert(
            "bytes_received",
            format!("{} B", rng.random_range(500u64..=1000)),
        );

        snap.insert("load_1", "0.50");
        snap.insert("load_5", "0.60");
        snap.insert("load_15", "0.70");
        snap.insert("uptime", "1d 2h 3m");
        snap.insert("process_count", 100i64);
        snap.insert("hostname", "synthetic-host");

        snap
    }
}
