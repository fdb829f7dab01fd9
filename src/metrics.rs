// src/metrics.rs

//! Resource measurements for a single run of the external tool.
//!
//! Duration is wall-clock time from spawn to exit. Peak memory is sampled
//! from a background thread with `sysinfo` and is best-effort: a run that
//! finishes between two samples reports `None`.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use sysinfo::{Pid, System};

/// Default polling interval for [`MemoryTracker`].
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(25);

/// Metrics collected for one tool process.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationMetrics {
    pub duration_ms: u128,

    /// Peak resident set size in KB.
    pub max_rss_kb: Option<u64>,
}

/// Samples the resident memory of a child process until stopped.
pub struct MemoryTracker {
    stop: Arc<AtomicBool>,
    peak_bytes: Arc<AtomicU64>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MemoryTracker {
    /// Start sampling `pid` every `sample_every`.
    ///
    /// The sampling thread exits on its own once the process disappears.
    pub fn start(pid: u32, sample_every: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let peak_bytes = Arc::new(AtomicU64::new(0));

        let thread_stop = Arc::clone(&stop);
        let thread_peak = Arc::clone(&peak_bytes);

        let handle = thread::spawn(move || {
            let pid = Pid::from_u32(pid);
            let mut system = System::new();

            while !thread_stop.load(Ordering::Relaxed) {
                system.refresh_process(pid);

                let Some(process) = system.process(pid) else {
                    break;
                };
                thread_peak.fetch_max(process.memory(), Ordering::Relaxed);

                thread::sleep(sample_every);
            }
        });

        Self {
            stop,
            peak_bytes,
            handle: Some(handle),
        }
    }

    /// Stop sampling and return the peak RSS in KB, if any sample was taken.
    pub fn stop_and_take(mut self) -> Option<u64> {
        self.stop.store(true, Ordering::Relaxed);

        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }

        match self.peak_bytes.load(Ordering::Relaxed) {
            0 => None,
            bytes => Some(bytes / 1024),
        }
    }
}

impl Drop for MemoryTracker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_for_missing_process_reports_nothing() {
        // PIDs are bounded well below u32::MAX on every supported platform.
        let tracker = MemoryTracker::start(u32::MAX - 1, Duration::from_millis(1));
        assert_eq!(tracker.stop_and_take(), None);
    }

    #[test]
    fn tracker_samples_own_process() {
        let tracker = MemoryTracker::start(std::process::id(), Duration::from_millis(1));
        thread::sleep(Duration::from_millis(30));
        assert!(tracker.stop_and_take().is_some());
    }
}
