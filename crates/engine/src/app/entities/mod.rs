mod camera;
mod consumable;
mod player;
mod room;
mod solid;

pub use camera::Camera;
pub use consumable::Consumable;
pub use player::{Facing, OwnerId, Player, PlayerMut, PlayerPose, PLAYER_MAX_HEALTH};
pub use room::{Room, RoomWalls};
pub use solid::Solid;

use super::events::{EventBuffer, GameEvent};
use super::physics::Collision;
use super::scene::{NodeId, SceneTree};

/// Behaviour attached to a scene node.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    /// Plain container with no behaviour.
    Group,
    Room(Room),
    Solid(Solid),
    Consumable(Consumable),
    Player(Player),
    Camera(Camera),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityTag {
    Group,
    Room,
    Solid,
    Consumable,
    Player,
    Camera,
}

impl EntityTag {
    pub const fn name(self) -> &'static str {
        match self {
            EntityTag::Group => "GameObject",
            EntityTag::Room => "Room",
            EntityTag::Solid => "Solid",
            EntityTag::Consumable => "Consumable",
            EntityTag::Player => "Player",
            EntityTag::Camera => "Camera",
        }
    }
}

impl EntityKind {
    pub fn tag(&self) -> EntityTag {
        match self {
            EntityKind::Group => EntityTag::Group,
            EntityKind::Room(_) => EntityTag::Room,
            EntityKind::Solid(_) => EntityTag::Solid,
            EntityKind::Consumable(_) => EntityTag::Consumable,
            EntityKind::Player(_) => EntityTag::Player,
            EntityKind::Camera(_) => EntityTag::Camera,
        }
    }
}

fn tag_of(tree: &SceneTree, id: NodeId) -> Option<EntityTag> {
    tree.node(id).map(|node| node.kind.tag())
}

pub(crate) fn handle_events(
    tree: &mut SceneTree,
    id: NodeId,
    events: &EventBuffer<GameEvent>,
    owner: &OwnerId,
) {
    match tag_of(tree, id) {
        Some(EntityTag::Player) => player::handle_events(tree, id, events, owner),
        Some(EntityTag::Camera) => camera::handle_events(tree, id, events, owner),
        _ => {}
    }
}

pub(crate) fn handle_enter_collision(tree: &mut SceneTree, id: NodeId, collision: Collision) {
    match tag_of(tree, id) {
        Some(EntityTag::Player) => player::on_enter_collision(tree, id, collision),
        Some(EntityTag::Solid) => solid::on_enter_collision(tree, id, collision),
        _ => {}
    }
}

pub(crate) fn handle_collision(tree: &mut SceneTree, id: NodeId, collision: Collision) {
    match tag_of(tree, id) {
        Some(EntityTag::Player) => player::on_collision(tree, id, collision),
        Some(EntityTag::Solid) => solid::on_collision(tree, id, collision),
        _ => {}
    }
}

pub(crate) fn handle_exit_collision(tree: &mut SceneTree, id: NodeId, peer: NodeId) {
    if let Some(EntityTag::Player) = tag_of(tree, id) {
        player::on_exit_collision(tree, id, peer);
    }
}
