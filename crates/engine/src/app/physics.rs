use std::collections::BTreeSet;

use tracing::trace;

use super::entities;
use super::geometry::{Rect, Vec2};
use super::scene::{NodeId, SceneTree};

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsBody {
    pub velocity: Vec2,
    pub gravity: bool,
    pub gravity_force: f64,
    /// Still bodies never move and never test against other still bodies.
    pub still: bool,
    colliders: BTreeSet<NodeId>,
}

impl PhysicsBody {
    pub fn fixed() -> Self {
        Self {
            velocity: Vec2::ZERO,
            gravity: false,
            gravity_force: 0.0,
            still: true,
            colliders: BTreeSet::new(),
        }
    }

    pub fn falling(gravity_force: f64) -> Self {
        Self {
            velocity: Vec2::ZERO,
            gravity: true,
            gravity_force,
            still: false,
            colliders: BTreeSet::new(),
        }
    }

    /// Semi-implicit Euler: gravity feeds velocity before velocity moves the frame.
    pub fn integrate(&mut self, frame: &mut Rect, dt: f64) {
        if self.gravity {
            self.velocity.y += self.gravity_force * dt;
        }
        frame.center += self.velocity * dt;
    }

    pub fn colliders(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.colliders.iter().copied()
    }

    pub fn is_touching(&self, peer: NodeId) -> bool {
        self.colliders.contains(&peer)
    }

    pub fn contact_count(&self) -> usize {
        self.colliders.len()
    }

    fn link(&mut self, peer: NodeId) {
        self.colliders.insert(peer);
    }

    fn unlink(&mut self, peer: NodeId) {
        self.colliders.remove(&peer);
    }

    pub(crate) fn retain_colliders(&mut self, mut keep: impl FnMut(NodeId) -> bool) {
        self.colliders.retain(|peer| keep(*peer));
    }
}

/// What a handler learns about a contact: the other node and the
/// penetration vector from the receiver's point of view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collision {
    pub collider: NodeId,
    pub vector: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactChange {
    /// Both bodies still, or one of the nodes has no body.
    Skipped,
    Apart,
    Entered,
    Sustained,
    Exited,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollisionPassStats {
    pub bodies: usize,
    pub pairs_tested: usize,
    pub enters: usize,
    pub exits: usize,
    pub active_contacts: usize,
}

impl SceneTree {
    /// Tests one pair and fires enter / ongoing / exit handlers on both sides.
    pub fn detect_collision(&mut self, a: NodeId, b: NodeId) -> ContactChange {
        let (Some(body_a), Some(body_b)) = (self.body(a), self.body(b)) else {
            return ContactChange::Skipped;
        };
        if body_a.still && body_b.still {
            return ContactChange::Skipped;
        }
        let already = body_a.is_touching(b) || body_b.is_touching(a);

        let (Some(frame_a), Some(frame_b)) = (self.global_frame(a), self.global_frame(b)) else {
            return ContactChange::Skipped;
        };

        let change = match frame_a.penetration(&frame_b) {
            Some(vector) => {
                let forward = Collision {
                    collider: b,
                    vector,
                };
                let backward = Collision {
                    collider: a,
                    vector: -vector,
                };
                if !already {
                    self.link_pair(a, b);
                    entities::handle_enter_collision(self, a, forward);
                    entities::handle_enter_collision(self, b, backward);
                }
                entities::handle_collision(self, a, forward);
                entities::handle_collision(self, b, backward);
                if already {
                    ContactChange::Sustained
                } else {
                    ContactChange::Entered
                }
            }
            None if already => {
                self.unlink_pair(a, b);
                entities::handle_exit_collision(self, a, b);
                entities::handle_exit_collision(self, b, a);
                ContactChange::Exited
            }
            None => ContactChange::Apart,
        };

        if self.is_removed(a) || self.is_removed(b) {
            self.unlink_pair(a, b);
        }
        change
    }

    /// All-pairs pass over the bodies under `from`, i < j in pre-order.
    pub fn detect_collisions(&mut self, from: NodeId) -> CollisionPassStats {
        let bodies = self.collect_colliding_nodes(from);
        let mut stats = CollisionPassStats {
            bodies: bodies.len(),
            ..CollisionPassStats::default()
        };

        for (index, &a) in bodies.iter().enumerate() {
            for &b in &bodies[index + 1..] {
                let change = self.detect_collision(a, b);
                match change {
                    ContactChange::Skipped => continue,
                    ContactChange::Entered => stats.enters += 1,
                    ContactChange::Exited => stats.exits += 1,
                    ContactChange::Apart | ContactChange::Sustained => {}
                }
                stats.pairs_tested += 1;
                if matches!(change, ContactChange::Entered | ContactChange::Exited) {
                    trace!(%a, %b, ?change, "contact_changed");
                }
            }
        }

        stats.active_contacts = bodies
            .iter()
            .filter_map(|id| self.body(*id))
            .map(PhysicsBody::contact_count)
            .sum::<usize>()
            / 2;
        stats
    }

    fn link_pair(&mut self, a: NodeId, b: NodeId) {
        if let Some(body) = self.body_mut(a) {
            body.link(b);
        }
        if let Some(body) = self.body_mut(b) {
            body.link(a);
        }
    }

    fn unlink_pair(&mut self, a: NodeId, b: NodeId) {
        if let Some(body) = self.body_mut(a) {
            body.unlink(b);
        }
        if let Some(body) = self.body_mut(b) {
            body.unlink(a);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::scene::NodeDesc;

    fn tree_with_root() -> (SceneTree, NodeId) {
        let mut tree = SceneTree::new();
        let root = tree.spawn(NodeDesc::group(Rect::default()));
        (tree, root)
    }

    fn add_body(tree: &mut SceneTree, root: NodeId, frame: Rect, body: PhysicsBody) -> NodeId {
        tree.spawn_child(root, NodeDesc::group(frame).with_physics(body))
    }

    fn moving() -> PhysicsBody {
        let mut body = PhysicsBody::falling(0.0);
        body.gravity = false;
        body
    }

    #[test]
    fn integrate_applies_gravity_before_moving() {
        let mut body = PhysicsBody::falling(100.0);
        body.velocity = Vec2::new(10.0, 0.0);
        let mut frame = Rect::new(0.0, 0.0, 1.0, 1.0);

        body.integrate(&mut frame, 0.1);

        assert!((body.velocity.y - 10.0).abs() < 0.0001);
        assert!((frame.center.x - 1.0).abs() < 0.0001);
        assert!((frame.center.y - 1.0).abs() < 0.0001);
    }

    #[test]
    fn still_pairs_are_never_tested() {
        let (mut tree, root) = tree_with_root();
        let a = add_body(&mut tree, root, Rect::new(0.0, 0.0, 10.0, 10.0), PhysicsBody::fixed());
        let b = add_body(&mut tree, root, Rect::new(1.0, 1.0, 10.0, 10.0), PhysicsBody::fixed());

        assert_eq!(tree.detect_collision(a, b), ContactChange::Skipped);
        assert_eq!(tree.body(a).expect("a").contact_count(), 0);
        assert_eq!(tree.detect_collisions(root).pairs_tested, 0);
    }

    #[test]
    fn enter_fires_once_then_sustains_then_exits() {
        let (mut tree, root) = tree_with_root();
        let a = add_body(&mut tree, root, Rect::new(0.0, 0.0, 10.0, 10.0), moving());
        let b = add_body(&mut tree, root, Rect::new(5.0, 0.0, 10.0, 10.0), PhysicsBody::fixed());

        assert_eq!(tree.detect_collision(a, b), ContactChange::Entered);
        assert_eq!(tree.detect_collision(a, b), ContactChange::Sustained);
        assert!(tree.body(a).expect("a").is_touching(b));
        assert!(tree.body(b).expect("b").is_touching(a));

        tree.node_mut(a).expect("a").frame.center.x = -50.0;
        assert_eq!(tree.detect_collision(a, b), ContactChange::Exited);
        assert!(!tree.body(a).expect("a").is_touching(b));
        assert!(!tree.body(b).expect("b").is_touching(a));
        assert_eq!(tree.detect_collision(a, b), ContactChange::Apart);
    }

    #[test]
    fn removed_node_loses_pairing_after_handlers() {
        let (mut tree, root) = tree_with_root();
        let a = add_body(&mut tree, root, Rect::new(0.0, 0.0, 10.0, 10.0), moving());
        let b = add_body(&mut tree, root, Rect::new(5.0, 0.0, 10.0, 10.0), PhysicsBody::fixed());
        tree.remove(b);

        assert_eq!(tree.detect_collision(a, b), ContactChange::Entered);
        assert_eq!(tree.body(a).expect("a").contact_count(), 0);
        assert_eq!(tree.body(b).expect("b").contact_count(), 0);
    }

    #[test]
    fn pass_reports_stats_in_preorder_pairs() {
        let (mut tree, root) = tree_with_root();
        add_body(&mut tree, root, Rect::new(0.0, 0.0, 10.0, 10.0), moving());
        add_body(&mut tree, root, Rect::new(5.0, 0.0, 10.0, 10.0), PhysicsBody::fixed());
        add_body(&mut tree, root, Rect::new(100.0, 0.0, 10.0, 10.0), PhysicsBody::fixed());

        let stats = tree.detect_collisions(root);
        assert_eq!(stats.bodies, 3);
        assert_eq!(stats.pairs_tested, 2);
        assert_eq!(stats.enters, 1);
        assert_eq!(stats.active_contacts, 1);
    }

    #[test]
    fn nested_bodies_collide_in_global_space() {
        let (mut tree, root) = tree_with_root();
        let holder = tree.spawn_child(root, NodeDesc::group(Rect::new(100.0, 0.0, 0.0, 0.0)));
        let inner = add_body(&mut tree, holder, Rect::new(0.0, 0.0, 10.0, 10.0), PhysicsBody::fixed());
        let outer = add_body(&mut tree, root, Rect::new(104.0, 0.0, 10.0, 10.0), moving());

        assert_eq!(tree.detect_collision(inner, outer), ContactChange::Entered);
    }
}
