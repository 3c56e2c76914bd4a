use std::fmt;

use tracing::{debug, info};

use crate::app::events::{EventBuffer, GameEvent, PlayerEvent, PlayerEventKind};
use crate::app::geometry::{Rect, Size, Vec2};
use crate::app::physics::{Collision, PhysicsBody};
use crate::app::scene::{NodeDesc, NodeId, SceneNode, SceneTree};
use crate::app::visual::{SpriteKey, VisualState};

use super::EntityKind;

pub const PLAYER_MAX_HEALTH: i32 = 100;

const MOVE_FRAME_COUNT: u32 = 6;
const MOVE_SECONDS_PER_FRAME: f64 = 1.0 / 15.0;

/// Identity of the session that drives a player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerPose {
    Idle,
    Move,
    Crouch,
    CrouchMove,
    Jump,
    CrouchJump,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facing {
    Left,
    Right,
}

/// Player state machine. Four intent axes (left, right, jump, crouch) are
/// driven by owner events; `dead` and `won` are terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub(crate) owner: OwnerId,
    pub(crate) speed: f64,
    pub(crate) jump_speed: f64,
    pub(crate) health: i32,
    pub(crate) power: u32,
    pub(crate) max_power: u32,
    pub(crate) jumped: bool,
    pub(crate) dead: bool,
    pub(crate) won: bool,
    pub(crate) moving_left: bool,
    pub(crate) moving_right: bool,
    pub(crate) jumping: bool,
    pub(crate) crouching: bool,
    /// Standing size; the crouched frame is half as tall.
    pub(crate) original_size: Size,
    pub(crate) pose: PlayerPose,
    pub(crate) facing: Facing,
}

impl Player {
    pub fn new(owner: OwnerId, speed: f64, jump_speed: f64, max_power: u32, size: Size) -> Self {
        Self {
            owner,
            speed,
            jump_speed,
            health: PLAYER_MAX_HEALTH,
            power: 0,
            max_power,
            jumped: true,
            dead: false,
            won: false,
            moving_left: false,
            moving_right: false,
            jumping: false,
            crouching: false,
            original_size: size,
            pose: PlayerPose::Jump,
            facing: Facing::Right,
        }
    }

    pub fn with_health(mut self, health: i32) -> Self {
        self.health = health;
        self
    }

    pub fn node(self, center: Vec2, gravity_force: f64) -> NodeDesc {
        let frame = Rect {
            center,
            size: self.original_size,
        };
        let visual = VisualState::still(SpriteKey::from_static(sprite_for(self.pose, self.facing)));
        NodeDesc::new(frame, EntityKind::Player(self))
            .with_physics(PhysicsBody::falling(gravity_force))
            .with_visual(visual)
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn jump_speed(&self) -> f64 {
        self.jump_speed
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn power(&self) -> u32 {
        self.power
    }

    pub fn max_power(&self) -> u32 {
        self.max_power
    }

    pub fn is_airborne(&self) -> bool {
        self.jumped
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn has_won(&self) -> bool {
        self.won
    }

    pub fn is_crouching(&self) -> bool {
        self.crouching
    }

    pub fn pose(&self) -> PlayerPose {
        self.pose
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn original_size(&self) -> Size {
        self.original_size
    }

    fn horizontal_intent(&self) -> f64 {
        f64::from(u8::from(self.moving_right)) - f64::from(u8::from(self.moving_left))
    }

    fn vertical_intent(&self) -> f64 {
        f64::from(u8::from(self.crouching)) - f64::from(u8::from(self.jumping))
    }
}

fn sprite_for(pose: PlayerPose, facing: Facing) -> &'static str {
    match (pose, facing) {
        (PlayerPose::Idle, _) => "player/idle",
        (PlayerPose::Move, Facing::Left) => "player/move_left",
        (PlayerPose::Move, Facing::Right) => "player/move_right",
        (PlayerPose::Crouch, Facing::Left) => "player/crouch_left",
        (PlayerPose::Crouch, Facing::Right) => "player/crouch_right",
        (PlayerPose::CrouchMove, Facing::Left) => "player/crouch_move_left",
        (PlayerPose::CrouchMove, Facing::Right) => "player/crouch_move_right",
        (PlayerPose::Jump, Facing::Left) => "player/jump_left",
        (PlayerPose::Jump, Facing::Right) => "player/jump_right",
        (PlayerPose::CrouchJump, Facing::Left) => "player/crouch_left",
        (PlayerPose::CrouchJump, Facing::Right) => "player/crouch_right",
    }
}

/// Mutable view over the parts of a player node the state machine touches.
pub struct PlayerMut<'a> {
    pub id: NodeId,
    pub frame: &'a mut Rect,
    pub body: &'a mut PhysicsBody,
    pub visual: &'a mut Option<VisualState>,
    pub state: &'a mut Player,
}

impl<'a> PlayerMut<'a> {
    pub fn find(tree: &'a mut SceneTree, id: NodeId) -> Option<Self> {
        let SceneNode {
            frame,
            physics,
            visual,
            kind,
            ..
        } = tree.node_mut(id)?;
        match (physics, kind) {
            (Some(body), EntityKind::Player(state)) => Some(Self {
                id,
                frame,
                body,
                visual,
                state,
            }),
            _ => None,
        }
    }

    pub fn set_moving_left(&mut self, active: bool) {
        if self.state.moving_left == active {
            return;
        }
        self.state.moving_left = active;
        self.drive();
    }

    pub fn set_moving_right(&mut self, active: bool) {
        if self.state.moving_right == active {
            return;
        }
        self.state.moving_right = active;
        self.drive();
    }

    /// Under gravity the rising edge is a one-shot impulse, refused while
    /// airborne. Without gravity jump is a plain upward drive.
    pub fn set_jumping(&mut self, active: bool) {
        if self.state.jumping == active {
            return;
        }
        self.state.jumping = active;
        if !self.body.gravity {
            self.drive();
        } else if active && !self.state.jumped {
            self.body.velocity.y -= self.state.jump_speed;
            self.state.jumped = true;
        }
    }

    /// Crouching halves the height and keeps the feet in place.
    pub fn set_crouching(&mut self, active: bool) {
        if self.state.crouching == active {
            return;
        }
        self.state.crouching = active;
        let original = self.state.original_size;
        if active {
            self.frame.center.y += original.height / 4.0;
            self.frame.size.height = original.height / 2.0;
        } else {
            self.frame.center.y -= original.height / 4.0;
            self.frame.size.height = original.height;
        }
        if !self.body.gravity {
            self.drive();
        }
    }

    pub fn toggle_gravity(&mut self) {
        self.body.gravity = !self.body.gravity;
        if !self.body.gravity {
            self.state.jumped = true;
            self.body.velocity = Vec2::ZERO;
        }
        debug!(player = %self.id, gravity = self.body.gravity, "gravity_toggled");
    }

    /// Velocity derived from the held axes. Under gravity only the
    /// horizontal component is owned by input.
    fn drive(&mut self) {
        let speed = self.state.speed;
        self.body.velocity.x = self.state.horizontal_intent() * speed;
        if !self.body.gravity {
            self.body.velocity.y = self.state.vertical_intent() * speed;
        }
    }

    /// Re-asserts held movement after contacts zeroed the velocity.
    fn sustain_drive(&mut self) {
        let held_horizontal = self.state.moving_left || self.state.moving_right;
        let held_vertical = !self.body.gravity && (self.state.jumping || self.state.crouching);
        if held_horizontal || held_vertical {
            self.drive();
        }
    }

    /// Returns whether the damage was applied.
    pub fn deal_damage(&mut self, damage: i32) -> bool {
        if self.state.won || self.state.dead {
            return false;
        }
        self.state.health = self.state.health.saturating_sub(damage);
        if self.state.health < 0 {
            self.state.dead = true;
            info!(
                player = %self.id,
                owner = %self.state.owner,
                health = self.state.health,
                "player_died"
            );
        }
        true
    }

    pub fn take_power(&mut self, speed_boost: f64, jump_speed_boost: f64) {
        self.state.power = self.state.power.saturating_add(1);
        self.state.speed += speed_boost;
        self.state.jump_speed += jump_speed_boost;
        if !self.state.won && self.state.power >= self.state.max_power {
            self.state.won = true;
            info!(
                player = %self.id,
                owner = %self.state.owner,
                power = self.state.power,
                "player_won"
            );
        }
        self.sustain_drive();
    }

    pub fn land(&mut self) {
        self.state.jumped = false;
    }

    pub fn apply_events(&mut self, events: &EventBuffer<GameEvent>) {
        if PlayerEvent::buffer_contains_kind(events, &[PlayerEventKind::CheatGravityToggle]) {
            self.toggle_gravity();
        }
        if !self.state.dead {
            for event in events.iter_as::<PlayerEvent>() {
                match event.kind {
                    PlayerEventKind::MoveLeftStart => self.set_moving_left(true),
                    PlayerEventKind::MoveLeftStop => self.set_moving_left(false),
                    PlayerEventKind::MoveRightStart => self.set_moving_right(true),
                    PlayerEventKind::MoveRightStop => self.set_moving_right(false),
                    PlayerEventKind::JumpStart => self.set_jumping(true),
                    PlayerEventKind::JumpStop => self.set_jumping(false),
                    PlayerEventKind::CrouchStart => self.set_crouching(true),
                    PlayerEventKind::CrouchStop => self.set_crouching(false),
                    PlayerEventKind::Idle => self.release_all(),
                    PlayerEventKind::CheatGravityToggle => {}
                }
            }
            self.sustain_drive();
        }
        self.refresh_pose();
    }

    /// Nothing is held at all.
    fn release_all(&mut self) {
        self.set_moving_left(false);
        self.set_moving_right(false);
        self.set_jumping(false);
        self.set_crouching(false);
    }

    pub fn refresh_pose(&mut self) {
        let state = &mut *self.state;
        if state.moving_left && !state.moving_right {
            state.facing = Facing::Left;
        } else if state.moving_right && !state.moving_left {
            state.facing = Facing::Right;
        }

        let moving = state.moving_left || state.moving_right;
        state.pose = match (state.jumped, moving, state.crouching) {
            (true, _, true) => PlayerPose::CrouchJump,
            (true, _, false) => PlayerPose::Jump,
            (false, true, true) => PlayerPose::CrouchMove,
            (false, true, false) => PlayerPose::Move,
            (false, false, true) => PlayerPose::Crouch,
            (false, false, false) => PlayerPose::Idle,
        };

        let sprite = sprite_for(state.pose, state.facing);
        if self.visual.as_ref().map(|v| v.sprite().as_str()) == Some(sprite) {
            return;
        }
        let key = SpriteKey::from_static(sprite);
        *self.visual = Some(match state.pose {
            PlayerPose::Move | PlayerPose::CrouchMove => {
                VisualState::animated(key, MOVE_FRAME_COUNT, MOVE_SECONDS_PER_FRAME)
            }
            _ => VisualState::still(key),
        });
    }
}

impl SceneTree {
    pub fn player_mut(&mut self, id: NodeId) -> Option<PlayerMut<'_>> {
        PlayerMut::find(self, id)
    }

    pub fn player(&self, id: NodeId) -> Option<&Player> {
        match self.node(id).map(|node| &node.kind) {
            Some(EntityKind::Player(player)) => Some(player),
            _ => None,
        }
    }

    /// First player under `from` driven by `owner`.
    pub fn find_player(&self, from: NodeId, owner: &OwnerId) -> Option<NodeId> {
        self.find(from, |node| {
            matches!(&node.kind, EntityKind::Player(player) if player.owner == *owner)
        })
    }
}

pub(super) fn handle_events(
    tree: &mut SceneTree,
    id: NodeId,
    events: &EventBuffer<GameEvent>,
    owner: &OwnerId,
) {
    let Some(mut player) = PlayerMut::find(tree, id) else {
        return;
    };
    if player.state.owner != *owner {
        return;
    }
    player.apply_events(events);
}

pub(super) fn on_enter_collision(tree: &mut SceneTree, id: NodeId, collision: Collision) {
    if tree.is_removed(collision.collider) {
        return;
    }
    let boosts = match tree.node(collision.collider).map(|node| &node.kind) {
        Some(EntityKind::Consumable(consumable)) => {
            (consumable.speed_boost, consumable.jump_speed_boost)
        }
        _ => return,
    };
    tree.remove(collision.collider);
    if let Some(mut player) = PlayerMut::find(tree, id) {
        debug!(player = %id, consumable = %collision.collider, "consumable_taken");
        player.take_power(boosts.0, boosts.1);
    }
}

pub(super) fn on_collision(tree: &mut SceneTree, id: NodeId, collision: Collision) {
    if tree.is_removed(collision.collider) {
        return;
    }
    let Some(mut player) = PlayerMut::find(tree, id) else {
        return;
    };
    let vector = collision.vector;
    let standing_on_top = vector.x.abs() > vector.y.abs() && vector.y > 0.0;
    if standing_on_top && player.state.jumped && player.body.gravity {
        player.land();
        player.refresh_pose();
    }
}

pub(super) fn on_exit_collision(tree: &mut SceneTree, id: NodeId, _peer: NodeId) {
    let Some(mut player) = PlayerMut::find(tree, id) else {
        return;
    };
    if player.body.contact_count() == 0 {
        player.state.jumped = true;
        player.refresh_pose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::entities::Consumable;

    const GRAVITY: f64 = 1320.0;

    fn player_tree() -> (SceneTree, NodeId, NodeId) {
        let mut tree = SceneTree::new();
        let root = tree.spawn(NodeDesc::group(Rect::default()));
        let player = Player::new(OwnerId::new("p1"), 312.0, 600.0, 2, Size::new(40.0, 80.0));
        let id = tree.spawn_child(root, player.node(Vec2::ZERO, GRAVITY));
        (tree, root, id)
    }

    fn buffer(kinds: &[PlayerEventKind]) -> EventBuffer<GameEvent> {
        kinds
            .iter()
            .map(|kind| GameEvent::Player(PlayerEvent::new(*kind, 0)))
            .collect()
    }

    fn dispatch(tree: &mut SceneTree, root: NodeId, kinds: &[PlayerEventKind]) {
        tree.dispatch_events(root, &buffer(kinds), &OwnerId::new("p1"));
    }

    #[test]
    fn crouch_round_trip_restores_frame() {
        let (mut tree, root, id) = player_tree();
        let before = tree.node(id).expect("player").frame;

        dispatch(&mut tree, root, &[PlayerEventKind::CrouchStart]);
        let crouched = tree.node(id).expect("player").frame;
        assert!((crouched.size.height - 40.0).abs() < 0.0001);
        assert!((crouched.center.y - 20.0).abs() < 0.0001);
        assert!((crouched.bottom() - before.bottom()).abs() < 0.0001);

        dispatch(&mut tree, root, &[PlayerEventKind::CrouchStop]);
        let after = tree.node(id).expect("player").frame;
        assert_eq!(after, before);
    }

    #[test]
    fn repeated_crouch_start_resizes_once() {
        let (mut tree, root, id) = player_tree();
        dispatch(
            &mut tree,
            root,
            &[PlayerEventKind::CrouchStart, PlayerEventKind::CrouchStart],
        );
        let frame = tree.node(id).expect("player").frame;
        assert!((frame.size.height - 40.0).abs() < 0.0001);
        assert!((frame.center.y - 20.0).abs() < 0.0001);
    }

    #[test]
    fn jump_impulse_only_when_grounded() {
        let (mut tree, root, id) = player_tree();
        tree.player_mut(id).expect("player").land();

        dispatch(&mut tree, root, &[PlayerEventKind::JumpStart]);
        assert!((tree.body(id).expect("body").velocity.y + 600.0).abs() < 0.0001);
        assert!(tree.player(id).expect("player").is_airborne());

        dispatch(
            &mut tree,
            root,
            &[PlayerEventKind::JumpStop, PlayerEventKind::JumpStart],
        );
        assert!((tree.body(id).expect("body").velocity.y + 600.0).abs() < 0.0001);
    }

    #[test]
    fn gravity_toggle_while_airborne_freezes_player() {
        let (mut tree, root, id) = player_tree();
        tree.body_mut(id).expect("body").velocity = Vec2::new(50.0, 200.0);

        dispatch(&mut tree, root, &[PlayerEventKind::CheatGravityToggle]);

        let body = tree.body(id).expect("body");
        assert!(!body.gravity);
        assert_eq!(body.velocity, Vec2::ZERO);
        assert!(tree.player(id).expect("player").is_airborne());
    }

    #[test]
    fn without_gravity_axes_drive_both_components() {
        let (mut tree, root, id) = player_tree();
        dispatch(&mut tree, root, &[PlayerEventKind::CheatGravityToggle]);
        dispatch(
            &mut tree,
            root,
            &[PlayerEventKind::MoveLeftStart, PlayerEventKind::JumpStart],
        );

        let velocity = tree.body(id).expect("body").velocity;
        assert!((velocity.x + 312.0).abs() < 0.0001);
        assert!((velocity.y + 312.0).abs() < 0.0001);

        dispatch(
            &mut tree,
            root,
            &[PlayerEventKind::MoveLeftStop, PlayerEventKind::JumpStop],
        );
        assert_eq!(tree.body(id).expect("body").velocity, Vec2::ZERO);
    }

    #[test]
    fn events_for_other_owner_are_ignored() {
        let (mut tree, root, id) = player_tree();
        tree.dispatch_events(
            root,
            &buffer(&[PlayerEventKind::MoveRightStart]),
            &OwnerId::new("p2"),
        );
        assert_eq!(tree.body(id).expect("body").velocity.x, 0.0);
    }

    #[test]
    fn idle_releases_held_axes() {
        let (mut tree, root, id) = player_tree();
        dispatch(&mut tree, root, &[PlayerEventKind::MoveRightStart]);
        assert!((tree.body(id).expect("body").velocity.x - 312.0).abs() < 0.0001);

        dispatch(&mut tree, root, &[PlayerEventKind::Idle]);
        assert_eq!(tree.body(id).expect("body").velocity.x, 0.0);
        assert_eq!(tree.player(id).expect("player").facing(), Facing::Right);
    }

    #[test]
    fn damage_kills_below_zero_and_is_ignored_after_win() {
        let (mut tree, _root, id) = player_tree();
        {
            let mut player = tree.player_mut(id).expect("player");
            assert!(player.deal_damage(100));
            assert!(!player.state.dead);
            assert!(player.deal_damage(1));
            assert!(player.state.dead);
        }

        let (mut tree, _root, id) = player_tree();
        let mut player = tree.player_mut(id).expect("player");
        player.state.won = true;
        assert!(!player.deal_damage(500));
        assert_eq!(player.state.health, PLAYER_MAX_HEALTH);
    }

    #[test]
    fn collecting_max_power_wins() {
        let (mut tree, root, id) = player_tree();
        let first = tree.spawn_child(
            root,
            Consumable::new(2.4, 2.4).node(Rect::new(0.0, 0.0, 40.0, 40.0)),
        );
        let second = tree.spawn_child(
            root,
            Consumable::new(2.4, 2.4).node(Rect::new(10.0, 0.0, 40.0, 40.0)),
        );

        tree.detect_collisions(root);
        tree.clean(root);

        let player = tree.player(id).expect("player");
        assert_eq!(player.power(), 2);
        assert!(player.has_won());
        assert!((player.speed() - 316.8).abs() < 0.0001);
        assert!((player.jump_speed() - 604.8).abs() < 0.0001);
        assert!(!tree.contains(first));
        assert!(!tree.contains(second));
        assert_eq!(tree.body(id).expect("body").contact_count(), 0);
    }

    #[test]
    fn pose_priority_and_sprite() {
        let (mut tree, root, id) = player_tree();
        assert_eq!(tree.player(id).expect("player").pose(), PlayerPose::Jump);

        tree.player_mut(id).expect("player").land();
        dispatch(&mut tree, root, &[PlayerEventKind::MoveLeftStart]);
        let player = tree.player(id).expect("player");
        assert_eq!(player.pose(), PlayerPose::Move);
        assert_eq!(player.facing(), Facing::Left);
        let visual = tree.node(id).and_then(|n| n.visual.as_ref()).expect("visual");
        assert_eq!(visual.sprite().as_str(), "player/move_left");
        assert_eq!(visual.frame_count(), MOVE_FRAME_COUNT);

        dispatch(&mut tree, root, &[PlayerEventKind::CrouchStart]);
        assert_eq!(tree.player(id).expect("player").pose(), PlayerPose::CrouchMove);

        dispatch(&mut tree, root, &[PlayerEventKind::MoveLeftStop]);
        assert_eq!(tree.player(id).expect("player").pose(), PlayerPose::Crouch);
    }

    #[test]
    fn every_pose_sprite_is_a_valid_key() {
        for pose in [
            PlayerPose::Idle,
            PlayerPose::Move,
            PlayerPose::Crouch,
            PlayerPose::CrouchMove,
            PlayerPose::Jump,
            PlayerPose::CrouchJump,
        ] {
            for facing in [Facing::Left, Facing::Right] {
                assert!(SpriteKey::parse(sprite_for(pose, facing)).is_ok());
            }
        }
    }
}
