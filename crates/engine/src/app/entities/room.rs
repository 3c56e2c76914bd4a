use crate::app::geometry::Rect;
use crate::app::scene::{NodeDesc, NodeId, SceneTree};

use super::{EntityKind, Solid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomWalls {
    pub floor: NodeId,
    pub left: NodeId,
    pub right: NodeId,
    pub ceiling: NodeId,
}

impl RoomWalls {
    pub fn ids(&self) -> [NodeId; 4] {
        [self.floor, self.left, self.right, self.ceiling]
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.ids().contains(&id)
    }
}

/// Closed box made of four solid walls laid out inside the room frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Room {
    pub wall_thickness: f64,
    pub damage_velocity_threshold: f64,
    pub damage_velocity_multiplier: f64,
    walls: RoomWalls,
}

impl Room {
    /// Creates the room node (detached) and its walls as its first four
    /// children: floor, left, right, ceiling.
    pub fn spawn(
        tree: &mut SceneTree,
        frame: Rect,
        wall_thickness: f64,
        damage_velocity_threshold: f64,
        damage_velocity_multiplier: f64,
    ) -> NodeId {
        let solid = Solid::new(damage_velocity_threshold, damage_velocity_multiplier);
        let width = frame.size.width;
        let height = frame.size.height;
        let t = wall_thickness;
        let side_height = (height - 2.0 * t).max(0.0);

        let floor = tree.spawn(solid.node(Rect::new(0.0, height / 2.0 - t / 2.0, width, t)));
        let left = tree.spawn(solid.node(Rect::new(-width / 2.0 + t / 2.0, 0.0, t, side_height)));
        let right = tree.spawn(solid.node(Rect::new(width / 2.0 - t / 2.0, 0.0, t, side_height)));
        let ceiling = tree.spawn(solid.node(Rect::new(0.0, -height / 2.0 + t / 2.0, width, t)));

        let walls = RoomWalls {
            floor,
            left,
            right,
            ceiling,
        };
        let room = tree.spawn(NodeDesc::new(
            frame,
            EntityKind::Room(Room {
                wall_thickness,
                damage_velocity_threshold,
                damage_velocity_multiplier,
                walls,
            }),
        ));
        for wall in walls.ids() {
            tree.add_child(room, wall);
        }
        room
    }

    pub fn walls(&self) -> RoomWalls {
        self.walls
    }
}

impl SceneTree {
    pub fn room(&self, id: NodeId) -> Option<&Room> {
        match self.node(id).map(|node| &node.kind) {
            Some(EntityKind::Room(room)) => Some(room),
            _ => None,
        }
    }
}
