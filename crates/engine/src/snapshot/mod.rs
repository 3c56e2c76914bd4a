mod atomic_io;
mod digest;
mod types;

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::app::{
    Consumable, EntityKind, GeometryError, NodeDesc, NodeId, OwnerId, PhysicsBody, Player, Room,
    SceneTree, Size, Solid, PLAYER_MAX_HEALTH,
};

pub use atomic_io::{read_text, write_text_atomic, PersistenceError};
pub use digest::snapshot_digest;
pub use types::{
    ClientIdSnapshot, EntitySnapshot, NodeSnapshot, PhysicsSnapshot, PlayerSnapshot,
    RectSnapshot, SizeSnapshot, Vec2Snapshot, WorldPayload,
};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("node {0} is not in the scene")]
    MissingRoot(NodeId),
    #[error("snapshot root is flagged as removed")]
    RemovedRoot,
    #[error("could not initialize player: no player owned by `{owner}`")]
    OwnerPlayerMissing { owner: String },
    #[error("invalid frame at {path}: {source}")]
    Frame {
        path: String,
        #[source]
        source: GeometryError,
    },
    #[error("non-finite {field} at {path}")]
    NonFinite { path: String, field: &'static str },
    #[error("player health {health} at {path} is above the maximum of {max}")]
    HealthOutOfRange { path: String, health: i32, max: i32 },
    #[error("player health {health} at {path} is below zero but the player is not dead")]
    NegativeHealthAlive { path: String, health: i32 },
    #[error("player power {power} at {path} exceeds max power {max_power} without a win")]
    PowerOutOfRange {
        path: String,
        power: u32,
        max_power: u32,
    },
    #[error("{kind} at {path} requires a physics block")]
    MissingPhysics { path: String, kind: &'static str },
    #[error("encode snapshot json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Serializes the subtree under `root` as seen by `owner`. Cameras are
/// presentation state and are left out; room walls are implied by the room.
pub fn capture_world(
    tree: &SceneTree,
    root: NodeId,
    owner: &OwnerId,
) -> Result<WorldPayload, SnapshotError> {
    let world = capture_node(tree, root).ok_or(SnapshotError::MissingRoot(root))?;
    Ok(WorldPayload {
        client_id: ClientIdSnapshot {
            id: owner.as_str().to_string(),
        },
        world,
    })
}

fn capture_node(tree: &SceneTree, id: NodeId) -> Option<NodeSnapshot> {
    let node = tree.node(id)?;
    let entity = match &node.kind {
        EntityKind::Camera(_) => return None,
        EntityKind::Group => EntitySnapshot::GameObject,
        EntityKind::Room(room) => EntitySnapshot::Room {
            width: room.wall_thickness,
            damage_velocity_threshold: room.damage_velocity_threshold,
            damage_velocity_multiplier: room.damage_velocity_multiplier,
        },
        EntityKind::Solid(solid) => EntitySnapshot::Solid {
            damage_velocity_threshold: solid.damage_velocity_threshold,
            damage_velocity_multiplier: solid.damage_velocity_multiplier,
        },
        EntityKind::Consumable(consumable) => EntitySnapshot::Consumable {
            consumable_power_speed_boost: consumable.speed_boost,
            consumable_power_jump_speed_boost: consumable.jump_speed_boost,
        },
        EntityKind::Player(player) => EntitySnapshot::Player(PlayerSnapshot {
            client_id: ClientIdSnapshot {
                id: player.owner.as_str().to_string(),
            },
            crouched: player.crouching,
            dead: player.dead,
            health: player.health,
            jump_speed: player.jump_speed,
            jumped: player.jumped,
            max_power: player.max_power,
            power: player.power,
            speed: player.speed,
            won: player.won,
        }),
    };

    let walls = match &node.kind {
        EntityKind::Room(room) => Some(room.walls()),
        _ => None,
    };
    let children = node
        .children()
        .iter()
        .filter(|child| walls.map_or(true, |walls| !walls.contains(**child)))
        .filter_map(|child| capture_node(tree, *child))
        .collect();

    Some(NodeSnapshot {
        entity,
        frame: RectSnapshot::from_rect(node.frame),
        removed: node.is_removed(),
        physics: node.physics.as_ref().map(|body| PhysicsSnapshot {
            gravity: body.gravity,
            gravity_force: body.gravity_force,
            still: body.still,
            velocity: Vec2Snapshot::from_vec2(body.velocity),
            colliders: Vec::new(),
        }),
        children,
    })
}

#[derive(Debug)]
pub struct RestoredWorld {
    pub tree: SceneTree,
    pub root: NodeId,
    pub owner: OwnerId,
    /// The player driven by `owner`.
    pub player: NodeId,
}

/// Rebuilds a scene from a payload. Removed nodes are skipped; the payload's
/// owner must have a player in the result.
pub fn restore_world(payload: &WorldPayload) -> Result<RestoredWorld, SnapshotError> {
    let mut tree = SceneTree::new();
    let root = restore_node(&mut tree, &payload.world, "world")?
        .ok_or(SnapshotError::RemovedRoot)?;
    let owner = OwnerId::new(payload.client_id.id.clone());
    let player = tree
        .find_player(root, &owner)
        .ok_or_else(|| SnapshotError::OwnerPlayerMissing {
            owner: owner.to_string(),
        })?;
    Ok(RestoredWorld {
        tree,
        root,
        owner,
        player,
    })
}

fn finite(path: &str, field: &'static str, value: f64) -> Result<f64, SnapshotError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SnapshotError::NonFinite {
            path: path.to_string(),
            field,
        })
    }
}

fn restore_node(
    tree: &mut SceneTree,
    snapshot: &NodeSnapshot,
    path: &str,
) -> Result<Option<NodeId>, SnapshotError> {
    if snapshot.removed {
        return Ok(None);
    }
    let frame = snapshot.frame.to_rect().map_err(|source| SnapshotError::Frame {
        path: path.to_string(),
        source,
    })?;

    let id = match &snapshot.entity {
        EntitySnapshot::GameObject => tree.spawn(NodeDesc::group(frame)),
        EntitySnapshot::Room {
            width,
            damage_velocity_threshold,
            damage_velocity_multiplier,
        } => Room::spawn(
            tree,
            frame,
            finite(path, "width", *width)?,
            finite(path, "damageVelocityThreshold", *damage_velocity_threshold)?,
            finite(path, "damageVelocityMultiplier", *damage_velocity_multiplier)?,
        ),
        EntitySnapshot::Solid {
            damage_velocity_threshold,
            damage_velocity_multiplier,
        } => tree.spawn(
            Solid::new(
                finite(path, "damageVelocityThreshold", *damage_velocity_threshold)?,
                finite(path, "damageVelocityMultiplier", *damage_velocity_multiplier)?,
            )
            .node(frame),
        ),
        EntitySnapshot::Consumable {
            consumable_power_speed_boost,
            consumable_power_jump_speed_boost,
        } => tree.spawn(
            Consumable::new(
                finite(path, "consumablePowerSpeedBoost", *consumable_power_speed_boost)?,
                finite(
                    path,
                    "consumablePowerJumpSpeedBoost",
                    *consumable_power_jump_speed_boost,
                )?,
            )
            .node(frame),
        ),
        EntitySnapshot::Player(player) => {
            if snapshot.physics.is_none() {
                return Err(SnapshotError::MissingPhysics {
                    path: path.to_string(),
                    kind: "Player",
                });
            }
            let state = restore_player(player, frame.size, path)?;
            tree.spawn(NodeDesc::new(frame, EntityKind::Player(state)))
        }
    };

    if let Some(physics) = &snapshot.physics {
        let mut body = PhysicsBody::fixed();
        body.gravity = physics.gravity;
        body.gravity_force = finite(path, "gravityForce", physics.gravity_force)?;
        body.still = physics.still;
        body.velocity = physics.velocity.to_vec2();
        if !body.velocity.is_finite() {
            return Err(SnapshotError::NonFinite {
                path: path.to_string(),
                field: "velocity",
            });
        }
        if let Some(node) = tree.node_mut(id) {
            node.physics = Some(body);
        }
    }
    if let Some(mut player) = tree.player_mut(id) {
        player.refresh_pose();
    }

    for (index, child) in snapshot.children.iter().enumerate() {
        let child_path = format!("{path}.children[{index}]");
        if let Some(child_id) = restore_node(tree, child, &child_path)? {
            tree.add_child(id, child_id);
        }
    }
    Ok(Some(id))
}

fn restore_player(
    snapshot: &PlayerSnapshot,
    frame_size: Size,
    path: &str,
) -> Result<Player, SnapshotError> {
    if snapshot.health > PLAYER_MAX_HEALTH {
        return Err(SnapshotError::HealthOutOfRange {
            path: path.to_string(),
            health: snapshot.health,
            max: PLAYER_MAX_HEALTH,
        });
    }
    if snapshot.health < 0 && !snapshot.dead {
        return Err(SnapshotError::NegativeHealthAlive {
            path: path.to_string(),
            health: snapshot.health,
        });
    }
    if snapshot.power > snapshot.max_power && !snapshot.won {
        return Err(SnapshotError::PowerOutOfRange {
            path: path.to_string(),
            power: snapshot.power,
            max_power: snapshot.max_power,
        });
    }
    let standing_height = if snapshot.crouched {
        frame_size.height * 2.0
    } else {
        frame_size.height
    };

    let mut player = Player::new(
        OwnerId::new(snapshot.client_id.id.clone()),
        finite(path, "speed", snapshot.speed)?,
        finite(path, "jumpSpeed", snapshot.jump_speed)?,
        snapshot.max_power,
        Size::new(frame_size.width, standing_height),
    )
    .with_health(snapshot.health);
    player.power = snapshot.power;
    player.jumped = snapshot.jumped;
    player.dead = snapshot.dead;
    player.won = snapshot.won;
    player.crouching = snapshot.crouched;
    Ok(player)
}

pub fn encode_snapshot(payload: &WorldPayload) -> Result<String, SnapshotError> {
    serde_json::to_string_pretty(payload).map_err(SnapshotError::Encode)
}

/// Writes the payload as pretty JSON and returns its digest.
pub fn save_snapshot(path: &Path, payload: &WorldPayload) -> Result<String, SnapshotError> {
    let json = encode_snapshot(payload)?;
    write_text_atomic(path, &json)?;
    let digest = snapshot_digest(payload)?;
    info!(path = %path.display(), digest = %digest, bytes = json.len(), "snapshot_saved");
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::app::{
        attach_camera, compose_world, spawn_player, EntityTag, Placement, PlacementKind, Vec2,
        WorldSettings,
    };

    fn sample_world() -> (SceneTree, NodeId, OwnerId) {
        let settings = WorldSettings::default();
        let placements = [
            Placement::new(0, 0, PlacementKind::Solid),
            Placement::new(4, 2, PlacementKind::Consumable),
        ];
        let mut world = compose_world(&settings, &placements).expect("compose");
        let owner = OwnerId::new("alice");
        let player = spawn_player(&mut world.tree, world.root, &settings, owner.clone());
        attach_camera(&mut world.tree, player, settings.viewport);
        (world.tree, world.root, owner)
    }

    fn player_json(id: &str, health: i32, power: u32, max_power: u32, won: bool) -> serde_json::Value {
        json!({
            "type": "Player",
            "clientId": {"id": id},
            "crouched": false,
            "dead": false,
            "health": health,
            "jumpSpeed": 600.0,
            "jumped": true,
            "maxPower": max_power,
            "power": power,
            "speed": 312.0,
            "won": won,
            "frame": {"center": {"x": 0.0, "y": 0.0}, "size": {"width": 40.0, "height": 80.0}},
            "removed": false,
            "physics": {
                "gravity": true,
                "gravityForce": 1320.0,
                "still": false,
                "velocity": {"x": 0.0, "y": 0.0},
                "colliders": []
            },
            "children": []
        })
    }

    fn payload_with_children(owner: &str, children: Vec<serde_json::Value>) -> WorldPayload {
        let raw = json!({
            "clientId": {"id": owner},
            "world": {
                "type": "GameObject",
                "frame": {"center": {"x": 0.0, "y": 0.0}, "size": {"width": 1600.0, "height": 1200.0}},
                "removed": false,
                "children": children
            }
        });
        serde_json::from_value(raw).expect("payload")
    }

    #[test]
    fn capture_uses_camel_case_tags_and_skips_walls_and_cameras() {
        let (tree, root, owner) = sample_world();
        let payload = capture_world(&tree, root, &owner).expect("capture");
        let value = serde_json::to_value(&payload).expect("to value");

        assert_eq!(value["clientId"]["id"], json!("alice"));
        assert_eq!(value["world"]["type"], json!("GameObject"));
        let children = value["world"]["children"].as_array().expect("children");
        assert_eq!(children.len(), 4);
        assert_eq!(children[0]["type"], json!("Room"));
        assert_eq!(children[0]["width"], json!(40.0));
        assert_eq!(children[0]["children"], json!([]));
        let boost = children[2]["consumablePowerSpeedBoost"].as_f64().expect("boost");
        assert!((boost - 2.4).abs() < 0.0001);
        let player = &children[3];
        assert_eq!(player["type"], json!("Player"));
        assert_eq!(player["maxPower"], json!(1));
        assert_eq!(player["physics"]["gravityForce"], json!(1320.0));
        assert_eq!(player["physics"]["colliders"], json!([]));
        assert_eq!(player["children"], json!([]));
    }

    #[test]
    fn restore_rebuilds_equivalent_scene() {
        let (tree, root, owner) = sample_world();
        let payload = capture_world(&tree, root, &owner).expect("capture");

        let restored = restore_world(&payload).expect("restore");
        let again = capture_world(&restored.tree, restored.root, &restored.owner).expect("recapture");
        assert_eq!(again, payload);

        let room = restored.tree.children(restored.root)[0];
        assert_eq!(restored.tree.node(room).expect("room").tag(), EntityTag::Room);
        assert_eq!(restored.tree.children(room).len(), 4);
        assert_eq!(
            snapshot_digest(&again).expect("digest"),
            snapshot_digest(&payload).expect("digest")
        );
    }

    #[test]
    fn restore_skips_removed_nodes() {
        let mut removed_solid = json!({
            "type": "Solid",
            "damageVelocityThreshold": 900.0,
            "damageVelocityMultiplier": 0.01,
            "frame": {"center": {"x": 10.0, "y": 0.0}, "size": {"width": 40.0, "height": 40.0}},
            "removed": true
        });
        removed_solid["children"] = json!([]);
        let payload =
            payload_with_children("bob", vec![removed_solid, player_json("bob", 100, 0, 0, false)]);

        let restored = restore_world(&payload).expect("restore");
        assert_eq!(restored.tree.children(restored.root), &[restored.player]);
    }

    #[test]
    fn restore_keeps_crouched_player_standing_size() {
        let mut player = player_json("bob", 50, 0, 3, false);
        player["crouched"] = json!(true);
        player["frame"]["size"]["height"] = json!(40.0);
        let payload = payload_with_children("bob", vec![player]);

        let mut restored = restore_world(&payload).expect("restore");
        let state = restored.tree.player(restored.player).expect("player");
        assert!(state.is_crouching());
        assert_eq!(state.original_size(), Size::new(40.0, 80.0));
        assert_eq!(state.health(), 50);

        let mut player = restored.tree.player_mut(restored.player).expect("player");
        player.set_crouching(false);
        assert_eq!(player.frame.size.height, 80.0);
        assert_eq!(player.frame.center, Vec2::new(0.0, -20.0));
    }

    #[test]
    fn missing_owner_player_is_fatal() {
        let payload = payload_with_children("carol", vec![player_json("bob", 100, 0, 0, false)]);
        let error = restore_world(&payload).expect_err("no player for carol");
        assert!(matches!(error, SnapshotError::OwnerPlayerMissing { .. }));
        assert!(error.to_string().contains("could not initialize player"));
    }

    #[test]
    fn out_of_range_player_values_are_rejected() {
        let payload = payload_with_children("bob", vec![player_json("bob", 101, 0, 0, false)]);
        assert!(matches!(
            restore_world(&payload),
            Err(SnapshotError::HealthOutOfRange { health: 101, .. })
        ));

        let payload = payload_with_children("bob", vec![player_json("bob", -5, 0, 2, false)]);
        let error = restore_world(&payload).expect_err("alive with negative health");
        assert!(matches!(
            error,
            SnapshotError::NegativeHealthAlive { health: -5, .. }
        ));
        assert!(error.to_string().contains("world.children[0]"));

        let mut dead = player_json("bob", -5, 0, 2, false);
        dead["dead"] = json!(true);
        let payload = payload_with_children("bob", vec![dead]);
        let restored = restore_world(&payload).expect("dead player keeps negative health");
        assert!(restored.tree.player(restored.player).expect("player").is_dead());

        let payload = payload_with_children("bob", vec![player_json("bob", 100, 3, 2, false)]);
        assert!(matches!(
            restore_world(&payload),
            Err(SnapshotError::PowerOutOfRange { .. })
        ));

        let payload = payload_with_children("bob", vec![player_json("bob", 100, 3, 2, true)]);
        assert!(restore_world(&payload).is_ok());
    }

    #[test]
    fn negative_frame_size_is_rejected_with_path() {
        let mut player = player_json("bob", 100, 0, 0, false);
        player["frame"]["size"]["width"] = json!(-4.0);
        let payload = payload_with_children("bob", vec![player]);

        let error = restore_world(&payload).expect_err("bad frame");
        assert!(error.to_string().contains("world.children[0]"));
    }

    #[test]
    fn unknown_type_tag_fails_to_decode() {
        let raw = json!({
            "clientId": {"id": "bob"},
            "world": {
                "type": "Spaceship",
                "frame": {"center": {"x": 0.0, "y": 0.0}, "size": {"width": 1.0, "height": 1.0}}
            }
        });
        assert!(serde_json::from_value::<WorldPayload>(raw).is_err());
    }

    #[test]
    fn save_snapshot_writes_pretty_json_and_returns_digest() {
        let (tree, root, owner) = sample_world();
        let payload = capture_world(&tree, root, &owner).expect("capture");
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("world.json");

        let digest = save_snapshot(&path, &payload).expect("save");
        assert_eq!(digest.len(), 64);

        let raw = read_text(&path).expect("read");
        let decoded: WorldPayload = serde_json::from_str(&raw).expect("decode");
        assert_eq!(decoded, payload);
    }
}
