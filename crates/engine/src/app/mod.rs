mod entities;
mod events;
mod geometry;
mod input;
mod loop_runner;
mod metrics;
mod physics;
mod scene;
mod translate;
mod visual;
mod world;

pub use entities::{
    Camera, Consumable, EntityKind, EntityTag, Facing, OwnerId, Player, PlayerMut, PlayerPose,
    Room, RoomWalls, Solid, PLAYER_MAX_HEALTH,
};
pub use events::{
    CameraEvent, CameraEventKind, Event, EventBuffer, EventVariant, GameEvent, InputEvent,
    KeyEdge, MovementKind, NetEvent, PlayerEvent, PlayerEventKind,
};
pub use geometry::{GeometryError, Rect, Size, Vec2};
pub use input::{InputCollector, InputError, KeyCode, KeyState};
pub use loop_runner::{
    clamp_frame_delta, normalize_non_zero_duration, plan_sim_steps, FixedStepClock, LoopConfig,
    Simulation, StepPlan, TickReport,
};
pub use metrics::{LoopMetricsSnapshot, MetricsAccumulator, MetricsHandle};
pub use physics::{Collision, CollisionPassStats, ContactChange, PhysicsBody};
pub use scene::{NodeDesc, NodeId, SceneNode, SceneTree};
pub use translate::{BufferTranslator, GameToNetEvents, KeyboardToGameEvents, Translator};
pub use visual::{RenderItem, RenderSink, SpriteKey, SpriteKeyError, VisualState};
pub use world::{
    attach_camera, compose_world, count_consumables, despawn_owner, spawn_player, ComposedWorld,
    Placement, PlacementKind, WorldError, WorldSettings,
};
