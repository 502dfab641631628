use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "cli")]
use std::sync::Mutex;
use std::time::Instant;

#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Counters shared by all download jobs.
#[derive(Debug, Default)]
pub struct JobCounters {
    completed: AtomicU64,
    failed: AtomicU64,
    bytes_sent: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTotals {
    pub completed: u64,
    pub failed: u64,
    pub bytes_sent: u64,
}

impl JobCounters {
    pub fn record_success(&self, bytes: u64) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn totals(&self) -> JobTotals {
        JobTotals {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

#[cfg(feature = "cli")]
struct ProcessProbe {
    system: Mutex<System>,
    pid: Pid,
    peak_memory_mb: AtomicU64,
}

#[cfg(feature = "cli")]
impl ProcessProbe {
    fn new() -> Option<Self> {
        let pid = sysinfo::get_current_pid().ok()?;
        Some(Self {
            system: Mutex::new(System::new()),
            pid,
            peak_memory_mb: AtomicU64::new(0),
        })
    }

    /// (cpu %, memory MB, peak memory MB)
    fn sample(&self) -> Option<(f32, u64, u64)> {
        let mut system = self.system.lock().ok()?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );
        let process = system.process(self.pid)?;
        let memory_mb = process.memory() / 1024 / 1024;
        let peak = self
            .peak_memory_mb
            .fetch_max(memory_mb, Ordering::Relaxed)
            .max(memory_mb);
        Some((process.cpu_usage(), memory_mb, peak))
    }
}

/// Tracks job outcomes and, when enabled, logs them with process resource usage.
pub struct JobMonitor {
    counters: JobCounters,
    started: Instant,
    enabled: bool,
    #[cfg(feature = "cli")]
    probe: Option<ProcessProbe>,
}

impl JobMonitor {
    pub fn new(enabled: bool) -> Self {
        Self {
            counters: JobCounters::default(),
            started: Instant::now(),
            enabled,
            #[cfg(feature = "cli")]
            probe: if enabled { ProcessProbe::new() } else { None },
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn totals(&self) -> JobTotals {
        self.counters.totals()
    }

    pub fn job_succeeded(&self, bytes: u64) {
        self.counters.record_success(bytes);
        self.log_stats("job finished");
    }

    pub fn job_failed(&self) {
        self.counters.record_failure();
        self.log_stats("job failed");
    }

    pub fn log_stats(&self, phase: &str) {
        if !self.enabled {
            return;
        }
        let totals = self.counters.totals();
        tracing::info!(
            "📊 {} - jobs ok: {}, failed: {}, sent: {} bytes{}, Uptime: {:?}",
            phase,
            totals.completed,
            totals.failed,
            totals.bytes_sent,
            self.resource_usage().unwrap_or_default(),
            self.started.elapsed()
        );
    }

    #[cfg(feature = "cli")]
    fn resource_usage(&self) -> Option<String> {
        let (cpu, memory_mb, peak_mb) = self.probe.as_ref()?.sample()?;
        Some(format!(
            ", CPU: {:.1}%, Memory: {}MB, Peak: {}MB",
            cpu, memory_mb, peak_mb
        ))
    }

    #[cfg(not(feature = "cli"))]
    fn resource_usage(&self) -> Option<String> {
        None
    }
}

impl Default for JobMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let monitor = JobMonitor::new(false);
        monitor.job_succeeded(1024);
        monitor.job_succeeded(2048);
        monitor.job_failed();

        let totals = monitor.totals();
        assert_eq!(totals.completed, 2);
        assert_eq!(totals.failed, 1);
        assert_eq!(totals.bytes_sent, 3072);
    }

    #[test]
    fn test_enabled_monitor_logs_without_panicking() {
        let monitor = JobMonitor::new(true);
        assert!(monitor.is_enabled());
        monitor.job_succeeded(10);
        assert_eq!(monitor.totals().completed, 1);
    }
}
