use crate::app::geometry::Rect;
use crate::app::physics::PhysicsBody;
use crate::app::scene::NodeDesc;
use crate::app::visual::{SpriteKey, VisualState};

use super::EntityKind;

/// Power-up taken by the first player that touches it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Consumable {
    pub speed_boost: f64,
    pub jump_speed_boost: f64,
}

impl Consumable {
    pub fn new(speed_boost: f64, jump_speed_boost: f64) -> Self {
        Self {
            speed_boost,
            jump_speed_boost,
        }
    }

    pub fn node(self, frame: Rect) -> NodeDesc {
        NodeDesc::new(frame, EntityKind::Consumable(self))
            .with_physics(PhysicsBody::fixed())
            .with_visual(VisualState::animated(
                SpriteKey::from_static("consumable"),
                4,
                0.125,
            ))
    }
}
