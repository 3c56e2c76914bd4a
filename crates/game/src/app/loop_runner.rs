use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use platformer_engine::app::RenderItem;
use platformer_engine::{
    save_snapshot, snapshot_digest, FixedStepClock, LoopMetricsSnapshot, MetricsAccumulator,
};
use tracing::{debug, error, info, warn};

use super::bootstrap::{AppError, AppWiring};

/// Source of wall-clock frame deltas for the driving loop.
pub(crate) trait FrameTimer {
    fn next_frame(&mut self) -> Duration;
}

/// Sleeps until `frame_budget` has passed since the previous frame.
#[derive(Debug)]
pub(crate) struct WallClock {
    last: Instant,
    frame_budget: Duration,
}

impl WallClock {
    pub(crate) fn new(frame_budget: Duration) -> Self {
        Self {
            last: Instant::now(),
            frame_budget,
        }
    }
}

impl FrameTimer for WallClock {
    fn next_frame(&mut self) -> Duration {
        let elapsed = self.last.elapsed();
        if elapsed < self.frame_budget {
            thread::sleep(self.frame_budget - elapsed);
        }
        let now = Instant::now();
        let frame_dt = now.saturating_duration_since(self.last);
        self.last = now;
        frame_dt
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunSummary {
    pub(crate) ticks: u64,
    pub(crate) frames: u64,
    pub(crate) net_events: usize,
    pub(crate) digest: String,
    pub(crate) script_finished: bool,
    pub(crate) won: bool,
    pub(crate) dead: bool,
    /// Last published loop metrics; all zero when the run ended before the
    /// first metrics interval.
    pub(crate) metrics: LoopMetricsSnapshot,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let mut timer = WallClock::new(app.config.fixed_dt());
    match run_with_timer(app, &mut timer) {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                frames = summary.frames,
                net_events = summary.net_events,
                script_finished = summary.script_finished,
                won = summary.won,
                dead = summary.dead,
                tps = summary.metrics.tps,
                bodies = summary.metrics.bodies,
                digest = %summary.digest,
                "shutdown"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "run_failed");
            ExitCode::FAILURE
        }
    }
}

pub(crate) fn run_with_timer(
    mut app: AppWiring,
    timer: &mut dyn FrameTimer,
) -> Result<RunSummary, AppError> {
    let mut clock = FixedStepClock::new(&app.config);
    let fixed_dt_seconds = clock.fixed_dt().as_secs_f64();
    let mut keys = platformer_engine::InputCollector::new();
    let start = Instant::now();
    let mut now = start;
    let mut metrics = MetricsAccumulator::starting_at(start, app.config.metrics_log_interval);
    let mut frames = 0u64;
    let mut net_events = 0usize;
    let sim = &mut app.simulation;
    let first_tick = sim.tick_count();
    let last_tick = first_tick.saturating_add(app.ticks);

    while sim.tick_count() < last_tick {
        let frame_dt = timer.next_frame();
        now += frame_dt;

        let plan = clock.advance(frame_dt);
        for _ in 0..plan.ticks_to_run {
            if sim.tick_count() >= last_tick {
                break;
            }
            let tick = sim.tick_count() - first_tick;
            let time_ms = (tick as f64 * fixed_dt_seconds * 1000.0) as u64;
            app.script.apply_due(tick, &mut keys, time_ms);
            let input = keys.events_for_tick(time_ms);
            let report = sim.tick(&input, fixed_dt_seconds, time_ms);
            net_events += report.net_events.len();
            for event in &report.net_events {
                debug!(tick = report.tick, time = event.time, kind = ?event.kind, "net_event");
            }
            metrics.record_tick(&report.collisions);
        }

        if plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = clock.max_ticks_per_frame(),
                "sim_clamp_triggered"
            );
        }

        let mut drawn = 0usize;
        let clock_seconds = now.saturating_duration_since(start).as_secs_f64();
        sim.present(clock_seconds, &mut |_item: RenderItem<'_>| drawn += 1);
        frames += 1;

        if let Some(snapshot) = metrics.maybe_snapshot(now) {
            app.metrics.publish(snapshot);
            info!(
                tps = snapshot.tps,
                bodies = snapshot.bodies,
                pair_tests_per_tick = snapshot.pair_tests_per_tick,
                active_contacts = snapshot.active_contacts,
                drawn,
                tick = sim.tick_count(),
                "loop_metrics"
            );
        }
    }

    let payload = sim.capture()?;
    let digest = match &app.save_path {
        Some(path) => save_snapshot(path, &payload)?,
        None => snapshot_digest(&payload)?,
    };
    let (won, dead) = sim
        .player()
        .map_or((false, false), |player| (player.has_won(), player.is_dead()));

    Ok(RunSummary {
        ticks: sim.tick_count() - first_tick,
        frames,
        net_events,
        digest,
        script_finished: app.script.is_finished(),
        won,
        dead,
        metrics: app.metrics.snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use platformer_engine::{LoopConfig, WorldSettings};
    use tempfile::TempDir;

    use super::*;
    use crate::app::bootstrap::{wire, RunOptions};
    use crate::app::save::load_snapshot;

    /// Every frame takes the same wall-clock time.
    struct SteadyFrames(Duration);

    impl FrameTimer for SteadyFrames {
        fn next_frame(&mut self) -> Duration {
            self.0
        }
    }

    fn wiring(ticks: u64, save: Option<std::path::PathBuf>) -> AppWiring {
        let options = RunOptions {
            ticks: Some(ticks),
            save,
            ..RunOptions::default()
        };
        wire(&options, &WorldSettings::default()).expect("wire")
    }

    #[test]
    fn runs_exactly_the_requested_ticks() {
        let app = wiring(120, None);
        let summary =
            run_with_timer(app, &mut SteadyFrames(Duration::from_millis(25))).expect("run");

        assert_eq!(summary.ticks, 120);
        assert!(summary.frames >= 80);
        assert_eq!(summary.digest.len(), 64);
        assert!(!summary.dead);
        assert!(!summary.script_finished);
        // two seconds of frames publish at least one metrics interval
        assert!(summary.metrics.tps > 0.0);
        assert!(summary.metrics.bodies > 0);
    }

    #[test]
    fn short_run_reports_empty_metrics() {
        let app = wiring(10, None);
        let summary =
            run_with_timer(app, &mut SteadyFrames(Duration::from_millis(16))).expect("run");

        assert_eq!(summary.metrics, LoopMetricsSnapshot::default());
    }

    #[test]
    fn long_frames_are_clamped_not_replayed() {
        let app = wiring(30, None);
        // each 1 s frame is clamped to 33 ms, i.e. one or two ticks
        let summary = run_with_timer(app, &mut SteadyFrames(Duration::from_secs(1))).expect("run");

        assert_eq!(summary.ticks, 30);
        assert!(summary.frames >= 15);
    }

    #[test]
    fn same_inputs_give_same_digest() {
        let first = run_with_timer(wiring(240, None), &mut SteadyFrames(Duration::from_millis(16)))
            .expect("first run");
        let second = run_with_timer(wiring(240, None), &mut SteadyFrames(Duration::from_millis(40)))
            .expect("second run");

        assert_eq!(first.digest, second.digest);
        assert_eq!(first.net_events, second.net_events);
    }

    #[test]
    fn saved_run_reloads_to_the_same_digest() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("run.json");
        let summary = run_with_timer(
            wiring(200, Some(path.clone())),
            &mut SteadyFrames(Duration::from_millis(20)),
        )
        .expect("run");

        let restored = load_snapshot(&path).expect("load");
        let payload = platformer_engine::capture_world(&restored.tree, restored.root, &restored.owner)
            .expect("capture");
        assert_eq!(snapshot_digest(&payload).expect("digest"), summary.digest);
    }

    #[test]
    fn default_config_paces_at_target_rate() {
        let config = LoopConfig::default();
        assert_eq!(config.fixed_dt(), Duration::from_secs_f64(1.0 / 60.0));
    }
}
