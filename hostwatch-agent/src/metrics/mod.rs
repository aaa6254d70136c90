//! Host health sampling
//!
//! One persistent `sysinfo::System` is kept across ticks so CPU usage is a
//! delta between two refreshes rather than a cold read. Disabled metrics are
//! reported as 0, as is a temperature no sensor can provide.

use crate::config::CollectorConfig;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sysinfo::{Components, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tracing::debug;

/// Body of `POST /api/metrics` (node id is assigned by the kernel)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSample {
    pub cpu_percent: f64,
    pub memory_total: u64,
    pub memory_used: u64,
    pub memory_percent: f64,
    pub cpu_temp: f64,
    pub timestamp: DateTime<Utc>,
}

/// Sensor labels that usually carry the package/die temperature
const CPU_SENSOR_HINTS: [&str; 5] = ["coretemp", "k10temp", "cpu_thermal", "package id", "tctl"];

pub struct Collector {
    enabled: CollectorConfig,
    system: System,
    components: Components,
}

impl Collector {
    pub fn new(enabled: CollectorConfig) -> Self {
        let components = if enabled.temp {
            Components::new_with_refreshed_list()
        } else {
            Components::new()
        };

        Self {
            enabled,
            system: System::new(),
            components,
        }
    }

    /// Sample the host; CPU usage is measured over `MINIMUM_CPU_UPDATE_INTERVAL`
    pub async fn collect(&mut self) -> Result<MetricsSample> {
        let timestamp = Utc::now();

        let cpu_percent = if self.enabled.cpu {
            self.system.refresh_cpu_usage();
            tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
            self.system.refresh_cpu_usage();
            clamp_percent(f64::from(self.system.global_cpu_info().cpu_usage()))
        } else {
            0.0
        };

        let (memory_total, memory_used, memory_percent) = if self.enabled.memory {
            self.system.refresh_memory();
            let total = self.system.total_memory();
            let used = self.system.used_memory();
            (total, used, memory_percent(total, used))
        } else {
            (0, 0, 0.0)
        };

        let cpu_temp = if self.enabled.temp {
            self.components.refresh();
            pick_cpu_temperature(self.components.list().iter().map(|c| (c.label(), c.temperature())))
        } else {
            0.0
        };

        debug!(
            "Sampled cpu={:.1}% mem={:.1}% temp={:.1}°C",
            cpu_percent, memory_percent, cpu_temp
        );

        Ok(MetricsSample {
            cpu_percent,
            memory_total,
            memory_used,
            memory_percent,
            cpu_temp,
            timestamp,
        })
    }
}

fn memory_percent(total: u64, used: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    clamp_percent(used as f64 / total as f64 * 100.0)
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// CPU-looking sensor first, else the first readable sensor, else 0
pub fn pick_cpu_temperature<'a>(readings: impl IntoIterator<Item = (&'a str, f32)>) -> f64 {
    let readings: Vec<(&str, f32)> = readings.into_iter().filter(|(_, t)| t.is_finite()).collect();

    let preferred = readings.iter().find(|(label, _)| {
        let label = label.to_ascii_lowercase();
        CPU_SENSOR_HINTS.iter().any(|hint| label.contains(hint))
    });

    preferred
        .or_else(|| readings.first())
        .map(|(_, t)| f64::from(*t))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_cpu_sensor() {
        let readings = [("nvme Composite", 38.0), ("k10temp Tctl", 61.5), ("acpitz temp1", 27.8)];
        assert_eq!(pick_cpu_temperature(readings), 61.5);

        let intel = [("acpitz", 30.0), ("coretemp Package id 0", 52.0)];
        assert_eq!(pick_cpu_temperature(intel), 52.0);
    }

    #[test]
    fn test_falls_back_to_first_sensor() {
        let readings = [("nvme Composite", 38.0), ("acpitz temp1", 27.8)];
        assert_eq!(pick_cpu_temperature(readings), 38.0);
    }

    #[test]
    fn test_no_sensor_is_zero() {
        assert_eq!(pick_cpu_temperature(std::iter::empty()), 0.0);
        assert_eq!(pick_cpu_temperature([("cpu_thermal", f32::NAN)]), 0.0);
    }

    #[test]
    fn test_memory_percent() {
        assert_eq!(memory_percent(0, 0), 0.0);
        assert_eq!(memory_percent(200, 50), 25.0);
        assert_eq!(clamp_percent(f64::NAN), 0.0);
        assert_eq!(clamp_percent(100.4), 100.0);
    }

    #[tokio::test]
    async fn test_disabled_metrics_report_zero() {
        let mut collector = Collector::new(CollectorConfig { cpu: false, memory: false, temp: false });
        let sample = collector.collect().await.unwrap();

        assert_eq!(sample.cpu_percent, 0.0);
        assert_eq!(sample.memory_total, 0);
        assert_eq!(sample.memory_percent, 0.0);
        assert_eq!(sample.cpu_temp, 0.0);
    }

    #[tokio::test]
    async fn test_collect_reads_host() {
        let mut collector = Collector::new(CollectorConfig::default());
        let sample = collector.collect().await.unwrap();

        assert!(sample.memory_total > 0);
        assert!(sample.memory_used <= sample.memory_total);
        assert!((0.0..=100.0).contains(&sample.cpu_percent));
        assert!((0.0..=100.0).contains(&sample.memory_percent));
    }
}
