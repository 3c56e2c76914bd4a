use serde::{Deserialize, Serialize};

use crate::app::{GeometryError, Rect, Size, Vec2};

/// Top-level document exchanged between peers and written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldPayload {
    pub client_id: ClientIdSnapshot,
    pub world: NodeSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdSnapshot {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    #[serde(flatten)]
    pub entity: EntitySnapshot,
    pub frame: RectSnapshot,
    #[serde(default)]
    pub removed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physics: Option<PhysicsSnapshot>,
    #[serde(default)]
    pub children: Vec<NodeSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntitySnapshot {
    GameObject,
    /// Walls are rebuilt from these fields; `children` holds anything else.
    #[serde(rename_all = "camelCase")]
    Room {
        width: f64,
        damage_velocity_threshold: f64,
        damage_velocity_multiplier: f64,
    },
    #[serde(rename_all = "camelCase")]
    Solid {
        damage_velocity_threshold: f64,
        damage_velocity_multiplier: f64,
    },
    #[serde(rename_all = "camelCase")]
    Consumable {
        consumable_power_speed_boost: f64,
        consumable_power_jump_speed_boost: f64,
    },
    Player(PlayerSnapshot),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub client_id: ClientIdSnapshot,
    pub crouched: bool,
    pub dead: bool,
    pub health: i32,
    pub jump_speed: f64,
    pub jumped: bool,
    pub max_power: u32,
    pub power: u32,
    pub speed: f64,
    pub won: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicsSnapshot {
    pub gravity: bool,
    pub gravity_force: f64,
    pub still: bool,
    pub velocity: Vec2Snapshot,
    /// Contacts are transient; always written empty and ignored on load.
    #[serde(default)]
    pub colliders: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2Snapshot {
    pub x: f64,
    pub y: f64,
}

impl Vec2Snapshot {
    pub fn from_vec2(value: Vec2) -> Self {
        Self {
            x: value.x,
            y: value.y,
        }
    }

    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeSnapshot {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectSnapshot {
    pub center: Vec2Snapshot,
    pub size: SizeSnapshot,
}

impl RectSnapshot {
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            center: Vec2Snapshot::from_vec2(rect.center),
            size: SizeSnapshot {
                width: rect.size.width,
                height: rect.size.height,
            },
        }
    }

    pub fn to_rect(self) -> Result<Rect, GeometryError> {
        Rect::try_new(
            self.center.to_vec2(),
            Size::new(self.size.width, self.size.height),
        )
    }
}

impl EntitySnapshot {
    pub fn type_name(&self) -> &'static str {
        match self {
            EntitySnapshot::GameObject => "GameObject",
            EntitySnapshot::Room { .. } => "Room",
            EntitySnapshot::Solid { .. } => "Solid",
            EntitySnapshot::Consumable { .. } => "Consumable",
            EntitySnapshot::Player(_) => "Player",
        }
    }
}
