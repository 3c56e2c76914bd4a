use serde::{Deserialize, Serialize};

use super::input::KeyCode;

/// Anything that travels through an [`EventBuffer`] carries the wall time, in
/// milliseconds, at which it was produced.
pub trait Event {
    fn time(&self) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEdge {
    Down,
    Up,
    /// Key is held at sampling time.
    Pressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub time: u64,
    pub key: KeyCode,
    pub edge: KeyEdge,
}

impl InputEvent {
    pub fn down(key: KeyCode, time: u64) -> Self {
        Self {
            time,
            key,
            edge: KeyEdge::Down,
        }
    }

    pub fn up(key: KeyCode, time: u64) -> Self {
        Self {
            time,
            key,
            edge: KeyEdge::Up,
        }
    }

    pub fn pressed(key: KeyCode, time: u64) -> Self {
        Self {
            time,
            key,
            edge: KeyEdge::Pressed,
        }
    }
}

impl Event for InputEvent {
    fn time(&self) -> u64 {
        self.time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerEventKind {
    /// No input at all arrived this tick.
    Idle,
    MoveLeftStart,
    MoveLeftStop,
    MoveRightStart,
    MoveRightStop,
    JumpStart,
    JumpStop,
    CrouchStart,
    CrouchStop,
    CheatGravityToggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerEvent {
    pub time: u64,
    pub kind: PlayerEventKind,
}

impl PlayerEvent {
    pub fn new(kind: PlayerEventKind, time: u64) -> Self {
        Self { time, kind }
    }

    pub fn buffer_contains_kind(
        buffer: &EventBuffer<GameEvent>,
        kinds: &[PlayerEventKind],
    ) -> bool {
        buffer.contains(|event: &PlayerEvent| kinds.contains(&event.kind))
    }
}

impl Event for PlayerEvent {
    fn time(&self) -> u64 {
        self.time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraEventKind {
    Zoom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraEvent {
    pub time: u64,
    pub kind: CameraEventKind,
}

impl CameraEvent {
    pub fn new(kind: CameraEventKind, time: u64) -> Self {
        Self { time, kind }
    }
}

impl Event for CameraEvent {
    fn time(&self) -> u64 {
        self.time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    Player(PlayerEvent),
    Camera(CameraEvent),
}

impl Event for GameEvent {
    fn time(&self) -> u64 {
        match self {
            GameEvent::Player(event) => event.time,
            GameEvent::Camera(event) => event.time,
        }
    }
}

impl From<PlayerEvent> for GameEvent {
    fn from(event: PlayerEvent) -> Self {
        GameEvent::Player(event)
    }
}

impl From<CameraEvent> for GameEvent {
    fn from(event: CameraEvent) -> Self {
        GameEvent::Camera(event)
    }
}

/// Movement subset of player intents, as sent over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    MoveLeftStart,
    MoveLeftStop,
    MoveRightStart,
    MoveRightStop,
    JumpStart,
    JumpStop,
    CrouchStart,
    CrouchStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetEvent {
    pub time: u64,
    pub kind: MovementKind,
}

impl Event for NetEvent {
    fn time(&self) -> u64 {
        self.time
    }
}

/// Narrowing from a wide event family to one of its members, used by
/// [`EventBuffer::filter`] and [`EventBuffer::contains`].
pub trait EventVariant<E>: Sized {
    fn narrow(event: &E) -> Option<&Self>;
}

impl<E> EventVariant<E> for E {
    fn narrow(event: &E) -> Option<&E> {
        Some(event)
    }
}

impl EventVariant<GameEvent> for PlayerEvent {
    fn narrow(event: &GameEvent) -> Option<&PlayerEvent> {
        match event {
            GameEvent::Player(inner) => Some(inner),
            GameEvent::Camera(_) => None,
        }
    }
}

impl EventVariant<GameEvent> for CameraEvent {
    fn narrow(event: &GameEvent) -> Option<&CameraEvent> {
        match event {
            GameEvent::Camera(inner) => Some(inner),
            GameEvent::Player(_) => None,
        }
    }
}

/// Events in arrival order. Iteration runs oldest first; [`EventBuffer::pop`]
/// takes from the newest end.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBuffer<T> {
    events: Vec<T>,
}

impl<T> Default for EventBuffer<T> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<T> EventBuffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn push(&mut self, event: impl Into<T>) {
        self.events.push(event.into());
    }

    /// Appends every event of `other`, keeping its order.
    pub fn push_buffer<R>(&mut self, other: &EventBuffer<R>)
    where
        R: Clone + Into<T>,
    {
        self.events
            .extend(other.events.iter().cloned().map(Into::into));
    }

    /// Removes and returns the most recently pushed event.
    pub fn pop(&mut self) -> Option<T> {
        self.events.pop()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.events.iter()
    }

    /// Events of member type `R`, in buffer order.
    pub fn iter_as<'a, R>(&'a self) -> impl Iterator<Item = &'a R> + 'a
    where
        R: EventVariant<T> + 'a,
    {
        self.events.iter().filter_map(<R as EventVariant<T>>::narrow)
    }

    pub fn filter<R>(&self, predicate: impl Fn(&R) -> bool) -> EventBuffer<R>
    where
        R: EventVariant<T> + Clone,
    {
        self.events
            .iter()
            .filter_map(<R as EventVariant<T>>::narrow)
            .filter(|event| predicate(*event))
            .cloned()
            .collect()
    }

    pub fn contains<R>(&self, predicate: impl Fn(&R) -> bool) -> bool
    where
        R: EventVariant<T>,
    {
        self.events
            .iter()
            .filter_map(<R as EventVariant<T>>::narrow)
            .any(|event| predicate(event))
    }
}

impl<T> FromIterator<T> for EventBuffer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

impl<T> Extend<T> for EventBuffer<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.events.extend(iter);
    }
}

impl<'a, T> IntoIterator for &'a EventBuffer<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl<T> IntoIterator for EventBuffer<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}
