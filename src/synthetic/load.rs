//! Synthetic CPU load.
//!
//! # Responsibilities
//! - Occupy a bounded number of cores for a fixed duration
//! - Stop every worker once the duration has elapsed
//!
//! # Design Decisions
//! - Workers are OS threads; spinning on a runtime worker would stall
//!   unrelated requests
//! - A single atomic flag is the broadcast stop signal, polled on every
//!   iteration so the loop never blocks
//! - The flag is raised on drop, so an abandoned run cannot leak spinning
//!   threads
//! - Worker count is capped at a small multiple of the available cores

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::observability::metrics;

/// Upper bound on workers per available core.
pub const MAX_WORKERS_PER_CORE: usize = 4;

/// Number of workers used when the caller asks for "all cores".
pub fn available_cores() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Workers to spawn for a requested core count (0 = one per available core).
pub fn worker_count(cores: usize) -> usize {
    let available = available_cores();
    if cores == 0 {
        available
    } else {
        cores.min(available * MAX_WORKERS_PER_CORE)
    }
}

/// A running set of busy-wait workers sharing one stop flag.
#[derive(Debug)]
pub struct LoadRun {
    stop: Arc<AtomicBool>,
    workers: usize,
}

impl LoadRun {
    /// Spawn busy-wait workers for `cores`, as capped by [`worker_count`].
    pub fn start(cores: usize) -> Self {
        let workers = worker_count(cores);
        if workers < cores {
            tracing::debug!(requested = cores, workers, "Stress worker count capped");
        }
        let stop = Arc::new(AtomicBool::new(false));

        let mut spawned = 0;
        for i in 0..workers {
            let stop = Arc::clone(&stop);
            let result = thread::Builder::new()
                .name(format!("stress-worker-{}", i))
                .spawn(move || spin_until(&stop));
            match result {
                Ok(_) => spawned += 1,
                Err(e) => tracing::warn!(worker = i, error = %e, "Failed to spawn stress worker"),
            }
        }

        metrics::record_stress_workers(spawned as f64);
        tracing::debug!(workers = spawned, "Stress workers started");

        Self {
            stop,
            workers: spawned,
        }
    }

    /// Number of workers that were actually spawned.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Raise the stop signal. Idempotent.
    pub fn stop(&self) {
        if !self.stop.swap(true, Ordering::Release) {
            metrics::record_stress_workers(-(self.workers as f64));
            tracing::debug!(workers = self.workers, "Stress workers stopped");
        }
    }

    #[cfg(test)]
    fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

impl Drop for LoadRun {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spin_until(stop: &AtomicBool) {
    while !stop.load(Ordering::Acquire) {
        std::hint::spin_loop();
    }
}

/// Burn `cores` cores (0 = all) for `duration`.
///
/// Only the calling task is suspended while the workers spin. Returns once
/// the duration has elapsed and the stop signal has been raised; workers
/// exit on their own shortly after.
pub async fn generate_load(duration: Duration, cores: usize) {
    let run = LoadRun::start(cores);
    tracing::info!(
        workers = run.workers(),
        duration_ms = duration.as_millis() as u64,
        "Generating synthetic load"
    );
    tokio::time::sleep(duration).await;
    run.stop();
}
