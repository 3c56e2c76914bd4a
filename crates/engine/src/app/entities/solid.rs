use tracing::debug;

use crate::app::geometry::Rect;
use crate::app::physics::{Collision, PhysicsBody};
use crate::app::scene::{NodeDesc, NodeId, SceneTree};
use crate::app::visual::{SpriteKey, VisualState};

use super::{EntityKind, PlayerMut};

/// Immovable block. Pushes dynamic bodies out along the shallower axis and
/// hurts players that hit it too fast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solid {
    pub damage_velocity_threshold: f64,
    pub damage_velocity_multiplier: f64,
}

impl Solid {
    pub fn new(damage_velocity_threshold: f64, damage_velocity_multiplier: f64) -> Self {
        Self {
            damage_velocity_threshold,
            damage_velocity_multiplier,
        }
    }

    /// Damage for an impact at `vertical_velocity`, if it is above the
    /// threshold.
    pub fn impact_damage(&self, vertical_velocity: f64) -> Option<i32> {
        if vertical_velocity <= self.damage_velocity_threshold {
            return None;
        }
        let excess = vertical_velocity - self.damage_velocity_threshold / 2.0;
        let multiplier = self.damage_velocity_multiplier;
        Some((excess * excess * multiplier * multiplier).round() as i32)
    }

    pub fn node(self, frame: Rect) -> NodeDesc {
        NodeDesc::new(frame, EntityKind::Solid(self))
            .with_physics(PhysicsBody::fixed())
            .with_visual(VisualState::still(SpriteKey::from_static("solid")))
    }
}

fn solid_at(tree: &SceneTree, id: NodeId) -> Option<Solid> {
    match tree.node(id).map(|node| &node.kind) {
        Some(EntityKind::Solid(solid)) => Some(*solid),
        _ => None,
    }
}

pub(super) fn on_enter_collision(tree: &mut SceneTree, id: NodeId, collision: Collision) {
    let Some(solid) = solid_at(tree, id) else {
        return;
    };
    let Some(mut player) = PlayerMut::find(tree, collision.collider) else {
        return;
    };
    if let Some(damage) = solid.impact_damage(player.body.velocity.y) {
        debug!(solid = %id, player = %collision.collider, damage, "impact_damage");
        player.deal_damage(damage);
    }
}

pub(super) fn on_collision(tree: &mut SceneTree, _id: NodeId, collision: Collision) {
    let Some(node) = tree.node_mut(collision.collider) else {
        return;
    };
    let Some(body) = node.physics.as_mut() else {
        return;
    };
    let push = collision.vector;
    if push.x.abs() < push.y.abs() {
        node.frame.center.x += push.x;
        body.velocity.x = 0.0;
    } else {
        node.frame.center.y += push.y;
        body.velocity.y = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::geometry::Vec2;

    #[test]
    fn impact_damage_above_threshold_only() {
        let solid = Solid::new(900.0, 0.01);
        assert_eq!(solid.impact_damage(900.0), None);
        assert_eq!(solid.impact_damage(500.0), None);
        assert_eq!(solid.impact_damage(1000.0), Some(30));
    }

    #[test]
    fn ongoing_contact_pushes_dynamic_body_out() {
        let mut tree = SceneTree::new();
        let root = tree.spawn(NodeDesc::group(Rect::default()));
        let floor = tree.spawn_child(root, Solid::new(900.0, 0.01).node(Rect::new(0.0, 50.0, 200.0, 20.0)));
        let mut body = PhysicsBody::falling(100.0);
        body.velocity = Vec2::new(3.0, 40.0);
        let faller = tree.spawn_child(
            root,
            NodeDesc::group(Rect::new(0.0, 35.0, 10.0, 20.0)).with_physics(body),
        );

        tree.detect_collision(floor, faller);

        let node = tree.node(faller).expect("faller");
        // floor top is 40, faller bottom was 45
        assert!((node.frame.center.y - 30.0).abs() < 0.0001);
        let body = node.physics.as_ref().expect("body");
        assert_eq!(body.velocity.y, 0.0);
        assert_eq!(body.velocity.x, 3.0);
    }

    #[test]
    fn solid_as_second_node_pushes_out_along_negated_vector() {
        let mut tree = SceneTree::new();
        let root = tree.spawn(NodeDesc::group(Rect::default()));
        let floor = tree.spawn_child(root, Solid::new(900.0, 0.01).node(Rect::new(0.0, 50.0, 200.0, 20.0)));
        let wall = tree.spawn_child(root, Solid::new(900.0, 0.01).node(Rect::new(-200.0, 0.0, 20.0, 200.0)));
        let mut body = PhysicsBody::falling(100.0);
        body.velocity = Vec2::new(3.0, 40.0);
        let faller = tree.spawn_child(
            root,
            NodeDesc::group(Rect::new(0.0, 35.0, 10.0, 20.0)).with_physics(body),
        );
        let mut body = PhysicsBody::falling(100.0);
        body.velocity = Vec2::new(-50.0, 7.0);
        let slider = tree.spawn_child(
            root,
            NodeDesc::group(Rect::new(-188.0, 0.0, 10.0, 10.0)).with_physics(body),
        );

        tree.detect_collision(faller, floor);
        tree.detect_collision(slider, wall);

        let node = tree.node(faller).expect("faller");
        assert!((node.frame.center.y - 30.0).abs() < 0.0001);
        let body = node.physics.as_ref().expect("body");
        assert_eq!(body.velocity.y, 0.0);
        assert_eq!(body.velocity.x, 3.0);

        let node = tree.node(slider).expect("slider");
        // wall right edge is -190, slider left was -193
        assert!((node.frame.center.x + 185.0).abs() < 0.0001);
        let body = node.physics.as_ref().expect("body");
        assert_eq!(body.velocity.x, 0.0);
        assert_eq!(body.velocity.y, 7.0);
    }
}
