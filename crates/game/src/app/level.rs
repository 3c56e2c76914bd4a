use platformer_engine::{Placement, PlacementKind, WorldSettings};
use thiserror::Error;

/// Layout used when `PLATFORMER_LEVEL` is not set. The last line sits on
/// the floor; the player drops onto the middle platform.
pub(crate) const DEMO_LEVEL: &str = concat!(
    "..................*...................\n",
    "................######................\n",
    "......................................\n",
    "......................................\n",
    ".....*................................\n",
    "....###...............................\n",
    "......................................\n",
    "..............................####....\n",
    "......................................\n",
    "...............................*......\n",
);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum LevelError {
    #[error("level has {lines} lines but the room interior is {max} cells tall")]
    TooTall { lines: usize, max: u32 },
    #[error("level line {line} is {width} cells wide but the room interior is {max}")]
    TooWide { line: usize, width: usize, max: u32 },
    #[error("unknown tile `{tile}` at line {line}, column {column}")]
    UnknownTile {
        line: usize,
        column: usize,
        tile: char,
    },
}

/// Reads an ASCII layout: `#` solid, `*` consumable, `.` or space empty.
/// The text is drawn as seen on screen, left-aligned against the left wall
/// and bottom-aligned against the floor.
pub(crate) fn parse_level(
    text: &str,
    settings: &WorldSettings,
) -> Result<Vec<Placement>, LevelError> {
    let (columns, rows) = settings.interior_cells();
    let lines: Vec<&str> = text.lines().map(|line| line.trim_end_matches('\r')).collect();
    if lines.len() > rows as usize {
        return Err(LevelError::TooTall {
            lines: lines.len(),
            max: rows,
        });
    }

    let mut placements = Vec::new();
    let bottom = lines.len().saturating_sub(1);
    for (line_index, line) in lines.iter().enumerate() {
        let width = line.chars().count();
        if width > columns as usize {
            return Err(LevelError::TooWide {
                line: line_index + 1,
                width,
                max: columns,
            });
        }
        for (text_column, tile) in line.chars().enumerate() {
            let kind = match tile {
                '#' => PlacementKind::Solid,
                '*' => PlacementKind::Consumable,
                '.' | ' ' => continue,
                other => {
                    return Err(LevelError::UnknownTile {
                        line: line_index + 1,
                        column: text_column + 1,
                        tile: other,
                    })
                }
            };
            // cell column 0 is the rightmost one, cell row 0 the bottom one
            let column = columns - 1 - text_column as u32;
            let row = (bottom - line_index) as u32;
            placements.push(Placement::new(column, row, kind));
        }
    }
    Ok(placements)
}
