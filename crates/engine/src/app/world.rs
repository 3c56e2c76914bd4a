use std::collections::HashSet;

use thiserror::Error;
use tracing::info;

use super::entities::{
    Camera, Consumable, EntityKind, OwnerId, Player, Room, Solid, PLAYER_MAX_HEALTH,
};
use super::geometry::{Rect, Size, Vec2};
use super::scene::{NodeDesc, NodeId, SceneTree};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorldError {
    #[error("world setting `{name}` is out of range: {value}")]
    InvalidSetting { name: &'static str, value: f64 },
    #[error("cell ({column}, {row}) is outside the {columns}x{rows} interior grid")]
    OutOfBounds {
        column: u32,
        row: u32,
        columns: u32,
        rows: u32,
    },
    #[error("cell ({column}, {row}) is placed more than once")]
    DuplicateCell { column: u32, row: u32 },
}

/// Simulation-wide constants, handed to world construction explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSettings {
    pub grid_square_size: f64,
    pub grid_columns: u32,
    pub grid_rows: u32,
    pub gravity_force: f64,
    pub player_speed: f64,
    pub player_jump_speed: f64,
    pub player_health: i32,
    pub damage_velocity_threshold: f64,
    pub damage_velocity_multiplier: f64,
    pub consumable_speed_boost: f64,
    pub consumable_jump_speed_boost: f64,
    pub viewport: Size,
}

impl Default for WorldSettings {
    fn default() -> Self {
        let grid = 40.0;
        Self {
            grid_square_size: grid,
            grid_columns: 40,
            grid_rows: 30,
            gravity_force: 33.0 * grid,
            player_speed: 7.8 * grid,
            player_jump_speed: 15.0 * grid,
            player_health: PLAYER_MAX_HEALTH,
            damage_velocity_threshold: 22.5 * grid,
            damage_velocity_multiplier: 0.4 / grid,
            consumable_speed_boost: 0.06 * grid,
            consumable_jump_speed_boost: 0.06 * grid,
            viewport: Size::new(1280.0, 720.0),
        }
    }
}

impl WorldSettings {
    pub fn validate(&self) -> Result<(), WorldError> {
        let positive = [
            ("grid_square_size", self.grid_square_size),
            ("player_speed", self.player_speed),
            ("player_jump_speed", self.player_jump_speed),
            ("viewport.width", self.viewport.width),
            ("viewport.height", self.viewport.height),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(WorldError::InvalidSetting { name, value });
            }
        }
        let non_negative = [
            ("gravity_force", self.gravity_force),
            ("damage_velocity_threshold", self.damage_velocity_threshold),
            ("damage_velocity_multiplier", self.damage_velocity_multiplier),
            ("consumable_speed_boost", self.consumable_speed_boost),
            ("consumable_jump_speed_boost", self.consumable_jump_speed_boost),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(WorldError::InvalidSetting { name, value });
            }
        }
        // the room walls take one cell on each side
        for (name, cells) in [("grid_columns", self.grid_columns), ("grid_rows", self.grid_rows)] {
            if cells < 3 {
                return Err(WorldError::InvalidSetting {
                    name,
                    value: f64::from(cells),
                });
            }
        }
        if self.player_health <= 0 || self.player_health > PLAYER_MAX_HEALTH {
            return Err(WorldError::InvalidSetting {
                name: "player_health",
                value: f64::from(self.player_health),
            });
        }
        Ok(())
    }

    pub fn world_size(&self) -> Size {
        Size::new(
            f64::from(self.grid_columns) * self.grid_square_size,
            f64::from(self.grid_rows) * self.grid_square_size,
        )
    }

    pub fn wall_thickness(&self) -> f64 {
        self.grid_square_size
    }

    pub fn player_size(&self) -> Size {
        Size::new(self.grid_square_size, 2.0 * self.grid_square_size)
    }

    /// Interior cells usable by placements: `[0, columns - 2) x [0, rows - 2)`.
    pub fn interior_cells(&self) -> (u32, u32) {
        (
            self.grid_columns.saturating_sub(2),
            self.grid_rows.saturating_sub(2),
        )
    }

    /// Center of an interior cell. Column 0 is the rightmost cell, row 0 the
    /// bottom one.
    pub fn cell_center(&self, column: u32, row: u32) -> Vec2 {
        let g = self.grid_square_size;
        let size = self.world_size();
        Vec2::new(
            size.width / 2.0 - 1.5 * g - f64::from(column) * g,
            size.height / 2.0 - 1.5 * g - f64::from(row) * g,
        )
    }

    fn solid(&self) -> Solid {
        Solid::new(self.damage_velocity_threshold, self.damage_velocity_multiplier)
    }

    fn consumable(&self) -> Consumable {
        Consumable::new(self.consumable_speed_boost, self.consumable_jump_speed_boost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlacementKind {
    Solid,
    Consumable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub column: u32,
    pub row: u32,
    pub kind: PlacementKind,
}

impl Placement {
    pub fn new(column: u32, row: u32, kind: PlacementKind) -> Self {
        Self { column, row, kind }
    }
}

#[derive(Debug)]
pub struct ComposedWorld {
    pub tree: SceneTree,
    pub root: NodeId,
    pub room: NodeId,
}

/// Builds `root -> Room + one Solid / Consumable per placement`.
pub fn compose_world(
    settings: &WorldSettings,
    placements: &[Placement],
) -> Result<ComposedWorld, WorldError> {
    settings.validate()?;

    let (columns, rows) = settings.interior_cells();
    let mut seen = HashSet::new();
    for placement in placements {
        if placement.column >= columns || placement.row >= rows {
            return Err(WorldError::OutOfBounds {
                column: placement.column,
                row: placement.row,
                columns,
                rows,
            });
        }
        if !seen.insert((placement.column, placement.row)) {
            return Err(WorldError::DuplicateCell {
                column: placement.column,
                row: placement.row,
            });
        }
    }

    let mut tree = SceneTree::new();
    let bounds = Rect {
        center: Vec2::ZERO,
        size: settings.world_size(),
    };
    let root = tree.spawn(NodeDesc::group(bounds));
    let room = Room::spawn(
        &mut tree,
        bounds,
        settings.wall_thickness(),
        settings.damage_velocity_threshold,
        settings.damage_velocity_multiplier,
    );
    tree.add_child(root, room);

    let g = settings.grid_square_size;
    let mut solids = 0usize;
    let mut consumables = 0usize;
    for placement in placements {
        let center = settings.cell_center(placement.column, placement.row);
        let frame = Rect::new(center.x, center.y, g, g);
        let desc = match placement.kind {
            PlacementKind::Solid => {
                solids += 1;
                settings.solid().node(frame)
            }
            PlacementKind::Consumable => {
                consumables += 1;
                settings.consumable().node(frame)
            }
        };
        tree.spawn_child(root, desc);
    }

    info!(
        width = bounds.size.width,
        height = bounds.size.height,
        solids,
        consumables,
        "world_composed"
    );
    Ok(ComposedWorld { tree, root, room })
}

/// Live consumables under `from`.
pub fn count_consumables(tree: &SceneTree, from: NodeId) -> usize {
    tree.preorder(from)
        .into_iter()
        .filter_map(|id| tree.node(id))
        .filter(|node| !node.is_removed() && matches!(node.kind, EntityKind::Consumable(_)))
        .count()
}

/// Places a player for `owner` at the world origin. It wins after taking
/// every consumable currently in the world.
pub fn spawn_player(
    tree: &mut SceneTree,
    root: NodeId,
    settings: &WorldSettings,
    owner: OwnerId,
) -> NodeId {
    let max_power = u32::try_from(count_consumables(tree, root)).unwrap_or(u32::MAX);
    let player = Player::new(
        owner.clone(),
        settings.player_speed,
        settings.player_jump_speed,
        max_power,
        settings.player_size(),
    )
    .with_health(settings.player_health);
    let id = tree.spawn_child(root, player.node(Vec2::ZERO, settings.gravity_force));
    info!(player = %id, %owner, max_power, "player_spawned");
    id
}

/// Camera that follows `player`.
pub fn attach_camera(tree: &mut SceneTree, player: NodeId, viewport: Size) -> NodeId {
    tree.spawn_child(player, Camera::new(viewport).node(Vec2::ZERO))
}

/// Removes the owner's player and sweeps the tree. Returns false when the
/// owner had no player.
pub fn despawn_owner(tree: &mut SceneTree, root: NodeId, owner: &OwnerId) -> bool {
    let Some(player) = tree.find_player(root, owner) else {
        return false;
    };
    tree.remove(player);
    tree.clean(root);
    info!(player = %player, %owner, "player_despawned");
    true
}
