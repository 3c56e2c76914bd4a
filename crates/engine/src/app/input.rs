use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::events::{EventBuffer, InputEvent};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("unknown key code `{0}`")]
    UnknownKey(String),
    #[error("unknown key state `{0}`; expected `press` or `release`")]
    UnknownKeyState(String),
}

/// Physical keys the simulation understands, named after DOM key codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyCode {
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    KeyA,
    KeyD,
    KeyW,
    KeyS,
    Space,
    ControlLeft,
    KeyG,
    KeyZ,
}

const KEY_COUNT: usize = 12;

impl KeyCode {
    pub const ALL: [KeyCode; KEY_COUNT] = [
        KeyCode::ArrowLeft,
        KeyCode::ArrowRight,
        KeyCode::ArrowUp,
        KeyCode::ArrowDown,
        KeyCode::KeyA,
        KeyCode::KeyD,
        KeyCode::KeyW,
        KeyCode::KeyS,
        KeyCode::Space,
        KeyCode::ControlLeft,
        KeyCode::KeyG,
        KeyCode::KeyZ,
    ];

    const fn index(self) -> usize {
        match self {
            KeyCode::ArrowLeft => 0,
            KeyCode::ArrowRight => 1,
            KeyCode::ArrowUp => 2,
            KeyCode::ArrowDown => 3,
            KeyCode::KeyA => 4,
            KeyCode::KeyD => 5,
            KeyCode::KeyW => 6,
            KeyCode::KeyS => 7,
            KeyCode::Space => 8,
            KeyCode::ControlLeft => 9,
            KeyCode::KeyG => 10,
            KeyCode::KeyZ => 11,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            KeyCode::ArrowLeft => "ArrowLeft",
            KeyCode::ArrowRight => "ArrowRight",
            KeyCode::ArrowUp => "ArrowUp",
            KeyCode::ArrowDown => "ArrowDown",
            KeyCode::KeyA => "KeyA",
            KeyCode::KeyD => "KeyD",
            KeyCode::KeyW => "KeyW",
            KeyCode::KeyS => "KeyS",
            KeyCode::Space => "Space",
            KeyCode::ControlLeft => "ControlLeft",
            KeyCode::KeyG => "KeyG",
            KeyCode::KeyZ => "KeyZ",
        }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyCode {
    type Err = InputError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        KeyCode::ALL
            .into_iter()
            .find(|key| key.name() == value)
            .ok_or_else(|| InputError::UnknownKey(value.to_string()))
    }
}

/// Raw transition reported by a keyboard backend or an input script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

impl FromStr for KeyState {
    type Err = InputError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "press" => Ok(KeyState::Pressed),
            "release" => Ok(KeyState::Released),
            other => Err(InputError::UnknownKeyState(other.to_string())),
        }
    }
}

/// Turns raw key transitions into the per-tick input buffer: one `KeyDown`
/// on the press edge, one `KeyUp` on the release edge, and a `KeyPressed`
/// for every key that is still held when the tick is sampled.
#[derive(Debug, Default)]
pub struct InputCollector {
    held: [bool; KEY_COUNT],
    pending_edges: Vec<InputEvent>,
}

impl InputCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_key(&mut self, key: KeyCode, state: KeyState, time_ms: u64) {
        let is_down = &mut self.held[key.index()];
        match state {
            KeyState::Pressed => {
                // auto-repeat
                if *is_down {
                    return;
                }
                *is_down = true;
                self.pending_edges.push(InputEvent::down(key, time_ms));
            }
            KeyState::Released => {
                if !*is_down {
                    return;
                }
                *is_down = false;
                self.pending_edges.push(InputEvent::up(key, time_ms));
            }
        }
    }

    pub fn is_held(&self, key: KeyCode) -> bool {
        self.held[key.index()]
    }

    pub fn release_all(&mut self, time_ms: u64) {
        for key in KeyCode::ALL {
            self.handle_key(key, KeyState::Released, time_ms);
        }
    }

    /// Drains the edges seen since the previous sample and appends the held
    /// keys.
    pub fn events_for_tick(&mut self, time_ms: u64) -> EventBuffer<InputEvent> {
        let mut events: EventBuffer<InputEvent> = self.pending_edges.drain(..).collect();
        for key in KeyCode::ALL {
            if self.held[key.index()] {
                events.push(InputEvent::pressed(key, time_ms));
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::events::KeyEdge;

    fn edges(buffer: &EventBuffer<InputEvent>) -> Vec<(KeyCode, KeyEdge)> {
        buffer.iter().map(|event| (event.key, event.edge)).collect()
    }

    #[test]
    fn key_names_round_trip_through_from_str() {
        for key in KeyCode::ALL {
            assert_eq!(key.name().parse::<KeyCode>(), Ok(key));
        }
        assert!("KeyQ".parse::<KeyCode>().is_err());
    }

    #[test]
    fn press_yields_down_once_then_pressed_while_held() {
        let mut collector = InputCollector::new();
        collector.handle_key(KeyCode::ArrowLeft, KeyState::Pressed, 0);
        collector.handle_key(KeyCode::ArrowLeft, KeyState::Pressed, 5);

        let first = collector.events_for_tick(16);
        assert_eq!(
            edges(&first),
            vec![
                (KeyCode::ArrowLeft, KeyEdge::Down),
                (KeyCode::ArrowLeft, KeyEdge::Pressed)
            ]
        );

        let second = collector.events_for_tick(33);
        assert_eq!(edges(&second), vec![(KeyCode::ArrowLeft, KeyEdge::Pressed)]);
    }

    #[test]
    fn release_yields_single_up_and_empty_afterwards() {
        let mut collector = InputCollector::new();
        collector.handle_key(KeyCode::Space, KeyState::Pressed, 0);
        let _ = collector.events_for_tick(16);
        collector.handle_key(KeyCode::Space, KeyState::Released, 20);
        collector.handle_key(KeyCode::Space, KeyState::Released, 21);

        let released = collector.events_for_tick(33);
        assert_eq!(edges(&released), vec![(KeyCode::Space, KeyEdge::Up)]);
        assert!(collector.events_for_tick(50).is_empty());
        assert!(!collector.is_held(KeyCode::Space));
    }

    #[test]
    fn tap_within_one_tick_keeps_both_edges() {
        let mut collector = InputCollector::new();
        collector.handle_key(KeyCode::KeyG, KeyState::Pressed, 1);
        collector.handle_key(KeyCode::KeyG, KeyState::Released, 2);

        let events = collector.events_for_tick(16);
        assert_eq!(
            edges(&events),
            vec![(KeyCode::KeyG, KeyEdge::Down), (KeyCode::KeyG, KeyEdge::Up)]
        );
    }

    #[test]
    fn key_state_parses_script_words() {
        assert_eq!("press".parse::<KeyState>(), Ok(KeyState::Pressed));
        assert_eq!("release".parse::<KeyState>(), Ok(KeyState::Released));
        assert!("hold".parse::<KeyState>().is_err());
    }
}
