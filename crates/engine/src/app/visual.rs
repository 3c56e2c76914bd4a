use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

use super::geometry::Rect;
use super::scene::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpriteKeyError {
    #[error("sprite key must not be empty")]
    Empty,
    #[error("sprite key `{key}` must be relative")]
    Absolute { key: String },
    #[error("sprite key `{key}` must not walk up with '..'")]
    ParentTraversal { key: String },
    #[error("sprite key `{key}` contains '{character}'; allowed are a-z, 0-9, '_', '-', '/'")]
    InvalidCharacter { key: String, character: char },
}

/// Relative asset key such as `player/move_left`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpriteKey(Cow<'static, str>);

impl SpriteKey {
    pub fn parse(key: impl Into<String>) -> Result<Self, SpriteKeyError> {
        let key = key.into();
        check_sprite_key(&key)?;
        Ok(Self(Cow::Owned(key)))
    }

    pub(crate) fn from_static(key: &'static str) -> Self {
        debug_assert!(check_sprite_key(key).is_ok(), "bad built-in sprite key {key}");
        Self(Cow::Borrowed(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpriteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn check_sprite_key(key: &str) -> Result<(), SpriteKeyError> {
    if key.is_empty() {
        return Err(SpriteKeyError::Empty);
    }
    if key.starts_with('/') {
        return Err(SpriteKeyError::Absolute {
            key: key.to_string(),
        });
    }
    if key.contains("..") {
        return Err(SpriteKeyError::ParentTraversal {
            key: key.to_string(),
        });
    }
    match key
        .chars()
        .find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '-' | '/')))
    {
        Some(character) => Err(SpriteKeyError::InvalidCharacter {
            key: key.to_string(),
            character,
        }),
        None => Ok(()),
    }
}

/// Animation cursor attached to a drawable node.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualState {
    sprite: SpriteKey,
    frame_count: u32,
    seconds_per_frame: f64,
    current_frame: u32,
}

impl VisualState {
    pub fn still(sprite: SpriteKey) -> Self {
        Self {
            sprite,
            frame_count: 1,
            seconds_per_frame: 0.0,
            current_frame: 0,
        }
    }

    pub fn animated(sprite: SpriteKey, frame_count: u32, seconds_per_frame: f64) -> Self {
        Self {
            sprite,
            frame_count: frame_count.max(1),
            seconds_per_frame: seconds_per_frame.max(0.0),
            current_frame: 0,
        }
    }

    pub fn sprite(&self) -> &SpriteKey {
        &self.sprite
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Picks the frame for an absolute clock, so the result does not depend on
    /// how often it is called.
    pub fn advance(&mut self, clock_seconds: f64) {
        if self.frame_count <= 1 || self.seconds_per_frame <= 0.0 || !clock_seconds.is_finite() {
            self.current_frame = 0;
            return;
        }
        let step = (clock_seconds.max(0.0) / self.seconds_per_frame).floor() as u64;
        self.current_frame = (step % u64::from(self.frame_count)) as u32;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderItem<'a> {
    pub node: NodeId,
    /// Frame relative to the viewing camera center.
    pub frame: Rect,
    pub visual: &'a VisualState,
}

/// Destination for drawables, in pre-order (parents before children).
pub trait RenderSink {
    fn draw(&mut self, item: RenderItem<'_>);
}

impl<F> RenderSink for F
where
    F: FnMut(RenderItem<'_>),
{
    fn draw(&mut self, item: RenderItem<'_>) {
        self(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_relative_lowercase_keys() {
        for key in ["player", "player/move_left", "tiles/wall-2"] {
            assert!(SpriteKey::parse(key).is_ok(), "key={key}");
        }
    }

    #[test]
    fn rejects_malformed_keys() {
        for key in ["", "/player", "..", "a/../b", r"a\b", "Player", "a.png"] {
            assert!(SpriteKey::parse(key).is_err(), "key={key}");
        }
    }

    #[test]
    fn advance_wraps_over_frame_count() {
        let mut visual =
            VisualState::animated(SpriteKey::from_static("player/move_left"), 6, 0.5);
        visual.advance(0.2);
        assert_eq!(visual.current_frame(), 0);
        visual.advance(1.1);
        assert_eq!(visual.current_frame(), 2);
        visual.advance(3.0);
        assert_eq!(visual.current_frame(), 0);
    }

    #[test]
    fn still_visual_stays_on_first_frame() {
        let mut visual = VisualState::still(SpriteKey::from_static("solid"));
        visual.advance(42.0);
        assert_eq!(visual.current_frame(), 0);
        assert_eq!(visual.frame_count(), 1);
    }
}
