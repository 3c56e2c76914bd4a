use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

use super::physics::CollisionPassStats;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub tps: f32,
    /// Bodies seen by the most recent collision pass.
    pub bodies: usize,
    pub pair_tests_per_tick: f32,
    pub active_contacts: usize,
}

#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(LoopMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub fn publish(&self, snapshot: LoopMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

#[derive(Debug)]
pub struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    ticks: u32,
    pair_tests: u64,
    last_pass: CollisionPassStats,
}

impl MetricsAccumulator {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(Instant::now(), interval)
    }

    pub fn starting_at(start: Instant, interval: Duration) -> Self {
        Self {
            interval_start: start,
            interval,
            ticks: 0,
            pair_tests: 0,
            last_pass: CollisionPassStats::default(),
        }
    }

    pub fn record_tick(&mut self, pass: &CollisionPassStats) {
        self.ticks = self.ticks.saturating_add(1);
        self.pair_tests = self.pair_tests.saturating_add(pass.pairs_tested as u64);
        self.last_pass = *pass;
    }

    pub fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let pair_tests_per_tick = if self.ticks == 0 {
            0.0
        } else {
            self.pair_tests as f32 / self.ticks as f32
        };

        let snapshot = LoopMetricsSnapshot {
            tps: self.ticks as f32 / elapsed_seconds,
            bodies: self.last_pass.bodies,
            pair_tests_per_tick,
            active_contacts: self.last_pass.active_contacts,
        };

        self.interval_start = now;
        self.ticks = 0;
        self.pair_tests = 0;

        Some(snapshot)
    }
}
