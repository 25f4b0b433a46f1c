//! Health-snapshot computation.
//!
//! `HealthReporter` only computes the JSON-shaped snapshot; binding an HTTP
//! listener on `health_port` is left to an external collaborator.

use crate::os_detect::OsType;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Running totals shared between the use-cases (writers, once per row) and
/// the `HealthReporter` (reader, once per probe). Lives for the whole
/// process, unlike the per-tick `ConfigureOutcome`.
#[derive(Default)]
pub struct Counters {
    processed_total: AtomicU64,
    failed_total: AtomicU64,
}

impl Counters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_processed(&self) {
        self.processed_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed_total.fetch_add(1, Ordering::Relaxed);
    }

    fn processed(&self) -> u64 {
        self.processed_total.load(Ordering::Relaxed)
    }

    fn failed(&self) -> u64 {
        self.failed_total.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// The status code an external HTTP layer would return for this status.
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            HealthStatus::Healthy | HealthStatus::Degraded => 200,
            HealthStatus::Unhealthy => 503,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseComponent {
    pub healthy: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkManagerComponent {
    #[serde(rename = "type")]
    pub os_type: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthComponents {
    pub database: DatabaseComponent,
    pub network_manager: NetworkManagerComponent,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatistics {
    pub processed_vms: u64,
    pub failed_configs: u64,
    pub uptime: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub components: HealthComponents,
    pub statistics: HealthStatistics,
}

/// Failure ratio at or above which the agent reports itself Degraded.
const DEGRADED_THRESHOLD: f64 = 0.5;

pub struct HealthReporter<'a> {
    counters: &'a Counters,
    started_at: Instant,
    os: OsType,
}

impl<'a> HealthReporter<'a> {
    #[must_use]
    pub fn new(counters: &'a Counters, started_at: Instant, os: OsType) -> Self {
        Self {
            counters,
            started_at,
            os,
        }
    }

    /// `db_probe` performs a cheap reachability check (e.g. `SELECT 1`) and
    /// returns `Ok(())` or the error it hit.
    pub fn snapshot(&self, db_probe: impl FnOnce() -> Result<(), String>) -> HealthSnapshot {
        let processed = self.counters.processed();
        let failed = self.counters.failed();

        let db_result = db_probe();
        let db_healthy = db_result.is_ok();

        let status = if !db_healthy {
            HealthStatus::Unhealthy
        } else {
            let denominator = processed + failed;
            let failure_rate = if denominator == 0 {
                0.0
            } else {
                failed as f64 / denominator as f64
            };
            if failure_rate >= DEGRADED_THRESHOLD {
                HealthStatus::Degraded
            } else {
                HealthStatus::Healthy
            }
        };

        HealthSnapshot {
            status,
            timestamp: Utc::now(),
            components: HealthComponents {
                database: DatabaseComponent {
                    healthy: db_healthy,
                    error: db_result.err(),
                },
                network_manager: NetworkManagerComponent {
                    os_type: match self.os {
                        OsType::Ubuntu => "netplan",
                        OsType::Rhel => "ifcfg",
                    },
                },
            },
            statistics: HealthStatistics {
                processed_vms: processed,
                failed_configs: failed,
                uptime: self.started_at.elapsed().as_secs(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_database_is_always_unhealthy() {
        let counters = Counters::new();
        let reporter = HealthReporter::new(&counters, Instant::now(), OsType::Ubuntu);
        let snapshot = reporter.snapshot(|| Err("connection refused".to_string()));
        assert_eq!(snapshot.status, HealthStatus::Unhealthy);
        assert_eq!(snapshot.status.http_status(), 503);
    }

    #[test]
    fn half_failure_rate_is_degraded() {
        let counters = Counters::new();
        for _ in 0..3 {
            counters.record_processed();
        }
        for _ in 0..3 {
            counters.record_failed();
        }
        let reporter = HealthReporter::new(&counters, Instant::now(), OsType::Ubuntu);
        let snapshot = reporter.snapshot(|| Ok(()));
        assert_eq!(snapshot.status, HealthStatus::Degraded);
        assert_eq!(snapshot.status.http_status(), 200);
    }

    #[test]
    fn no_rows_processed_yet_is_healthy() {
        let counters = Counters::new();
        let reporter = HealthReporter::new(&counters, Instant::now(), OsType::Rhel);
        let snapshot = reporter.snapshot(|| Ok(()));
        assert_eq!(snapshot.status, HealthStatus::Healthy);
        assert_eq!(snapshot.components.network_manager.os_type, "ifcfg");
    }

    #[test]
    fn low_failure_rate_stays_healthy() {
        let counters = Counters::new();
        for _ in 0..9 {
            counters.record_processed();
        }
        counters.record_failed();
        let reporter = HealthReporter::new(&counters, Instant::now(), OsType::Ubuntu);
        let snapshot = reporter.snapshot(|| Ok(()));
        assert_eq!(snapshot.status, HealthStatus::Healthy);
    }
}
