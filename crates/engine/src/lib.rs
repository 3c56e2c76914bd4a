pub mod app;
pub mod snapshot;

pub use app::{
    attach_camera, compose_world, spawn_player, EventBuffer, FixedStepClock, GameEvent,
    InputCollector, InputEvent, KeyCode, KeyState, LoopConfig, LoopMetricsSnapshot,
    MetricsAccumulator, MetricsHandle, NetEvent, NodeId, OwnerId, Placement, PlacementKind, Rect,
    SceneTree, Simulation, Size, TickReport, Vec2, WorldError, WorldSettings,
};
pub use snapshot::{
    capture_world, encode_snapshot, read_text, restore_world, save_snapshot, snapshot_digest,
    PersistenceError, RestoredWorld, SnapshotError, WorldPayload,
};
