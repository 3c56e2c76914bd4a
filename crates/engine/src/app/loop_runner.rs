use std::time::Duration;

use tracing::{debug, info};

use crate::snapshot::{capture_world, SnapshotError, WorldPayload};

use super::entities::{EntityKind, OwnerId, Player};
use super::events::{
    EventBuffer, GameEvent, InputEvent, NetEvent, PlayerEvent, PlayerEventKind,
};
use super::geometry::{Rect, Vec2};
use super::physics::CollisionPassStats;
use super::scene::{NodeId, SceneTree};
use super::translate::{BufferTranslator, GameToNetEvents, KeyboardToGameEvents};
use super::visual::RenderSink;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    /// Longest wall-clock frame fed to the accumulator. Bodies cannot cross
    /// thin geometry within one clamped frame.
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(33),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
        }
    }
}

impl LoopConfig {
    pub fn fixed_dt(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.target_tps.max(1)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPlan {
    pub ticks_to_run: u32,
    pub remaining_accumulator: Duration,
    pub dropped_backlog: Duration,
}

pub fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

pub fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

pub fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

/// Frame-delta clamp plus fixed-step accumulator.
#[derive(Debug, Clone)]
pub struct FixedStepClock {
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
}

impl FixedStepClock {
    pub fn new(config: &LoopConfig) -> Self {
        Self {
            fixed_dt: config.fixed_dt(),
            max_frame_delta: normalize_non_zero_duration(
                config.max_frame_delta,
                Duration::from_millis(33),
            ),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            accumulator: Duration::ZERO,
        }
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn max_ticks_per_frame(&self) -> u32 {
        self.max_ticks_per_frame
    }

    pub fn advance(&mut self, raw_frame_dt: Duration) -> StepPlan {
        let clamped = clamp_frame_delta(raw_frame_dt, self.max_frame_delta);
        self.accumulator = self.accumulator.saturating_add(clamped);
        let plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        self.accumulator = plan.remaining_accumulator;
        plan
    }
}

/// What one simulation step produced.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    pub game_events: EventBuffer<GameEvent>,
    /// Movement intents in wire form, for a peer to replay.
    pub net_events: EventBuffer<NetEvent>,
    pub collisions: CollisionPassStats,
    pub removed_nodes: usize,
}

/// One local owner driving a scene tree.
#[derive(Debug)]
pub struct Simulation {
    tree: SceneTree,
    root: NodeId,
    owner: OwnerId,
    keyboard: BufferTranslator<KeyboardToGameEvents>,
    wire: BufferTranslator<GameToNetEvents>,
    tick: u64,
}

impl Simulation {
    pub fn new(tree: SceneTree, root: NodeId, owner: OwnerId) -> Self {
        Self {
            tree,
            root,
            owner,
            keyboard: BufferTranslator::new(KeyboardToGameEvents),
            wire: BufferTranslator::new(GameToNetEvents),
            tick: 0,
        }
    }

    pub fn tree(&self) -> &SceneTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut SceneTree {
        &mut self.tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn player_id(&self) -> Option<NodeId> {
        self.tree.find_player(self.root, &self.owner)
    }

    pub fn player(&self) -> Option<&Player> {
        self.player_id().and_then(|id| self.tree.player(id))
    }

    /// Global frame of the camera following the owner's player.
    pub fn camera_view(&self) -> Option<Rect> {
        let player = self.player_id()?;
        let camera = self
            .tree
            .find(player, |node| matches!(node.kind, EntityKind::Camera(_)))?;
        self.tree.global_frame(camera)
    }

    /// Translate, dispatch, integrate, collide, sweep.
    pub fn tick(&mut self, input: &EventBuffer<InputEvent>, dt: f64, now_ms: u64) -> TickReport {
        let mut game_events: EventBuffer<GameEvent> = self.keyboard.translate(input);
        if input.is_empty() {
            game_events.push(PlayerEvent::new(PlayerEventKind::Idle, now_ms));
        }

        self.tree.dispatch_events(self.root, &game_events, &self.owner);
        self.tree.step_physics(self.root, dt);
        let collisions = self.tree.detect_collisions(self.root);
        let removed_nodes = self.tree.clean(self.root);
        let net_events: EventBuffer<NetEvent> = self.wire.translate(&game_events);

        self.tick = self.tick.saturating_add(1);
        debug!(
            tick = self.tick,
            events = game_events.len(),
            bodies = collisions.bodies,
            enters = collisions.enters,
            exits = collisions.exits,
            removed_nodes,
            "tick_done"
        );

        TickReport {
            tick: self.tick,
            game_events,
            net_events,
            collisions,
            removed_nodes,
        }
    }

    /// Advances animations to `clock_seconds` and draws everything relative
    /// to the owner's camera, or to the world origin when there is none.
    pub fn present<S>(&mut self, clock_seconds: f64, sink: &mut S)
    where
        S: RenderSink + ?Sized,
    {
        self.tree.tick_animation(self.root, clock_seconds);
        let view_center = self.camera_view().map_or(Vec2::ZERO, |view| view.center);
        self.tree.render(self.root, view_center, sink);
    }

    pub fn capture(&self) -> Result<WorldPayload, SnapshotError> {
        capture_world(&self.tree, self.root, &self.owner)
    }

    /// Removes the owner's player, e.g. when its session ends.
    pub fn despawn_owner(&mut self) -> bool {
        let despawned = super::world::despawn_owner(&mut self.tree, self.root, &self.owner);
        if despawned {
            info!(owner = %self.owner, tick = self.tick, "owner_left");
        }
        despawned
    }
}
