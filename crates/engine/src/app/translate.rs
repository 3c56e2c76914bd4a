use super::events::{
    CameraEvent, CameraEventKind, EventBuffer, GameEvent, InputEvent, KeyEdge, MovementKind,
    NetEvent, PlayerEvent, PlayerEventKind,
};
use super::input::KeyCode;

/// Maps one event of family `F` into at most one event of family `T`.
pub trait Translator<F, T> {
    fn translate(&self, event: &F) -> Option<T>;

    /// Translates a whole buffer. Override when an event's meaning depends on
    /// the rest of the buffer it arrived in.
    fn translate_buffer(&self, source: &EventBuffer<F>) -> EventBuffer<T> {
        source
            .iter()
            .filter_map(|event| self.translate(event))
            .collect()
    }
}

/// Applies a per-event translator over a whole buffer, dropping events that
/// have no counterpart.
#[derive(Debug, Clone, Default)]
pub struct BufferTranslator<Tr> {
    translator: Tr,
}

impl<Tr> BufferTranslator<Tr> {
    pub fn new(translator: Tr) -> Self {
        Self { translator }
    }

    pub fn translate<F, T>(&self, source: &EventBuffer<F>) -> EventBuffer<T>
    where
        Tr: Translator<F, T>,
    {
        self.translator.translate_buffer(source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Left,
    Right,
    Jump,
    Crouch,
}

impl Binding {
    fn for_key(key: KeyCode) -> Option<Self> {
        match key {
            KeyCode::ArrowLeft | KeyCode::KeyA => Some(Binding::Left),
            KeyCode::ArrowRight | KeyCode::KeyD => Some(Binding::Right),
            KeyCode::ArrowUp | KeyCode::KeyW | KeyCode::Space => Some(Binding::Jump),
            KeyCode::ArrowDown | KeyCode::KeyS | KeyCode::ControlLeft => Some(Binding::Crouch),
            KeyCode::KeyG | KeyCode::KeyZ => None,
        }
    }

    fn start(self) -> PlayerEventKind {
        match self {
            Binding::Left => PlayerEventKind::MoveLeftStart,
            Binding::Right => PlayerEventKind::MoveRightStart,
            Binding::Jump => PlayerEventKind::JumpStart,
            Binding::Crouch => PlayerEventKind::CrouchStart,
        }
    }

    fn stop(self) -> PlayerEventKind {
        match self {
            Binding::Left => PlayerEventKind::MoveLeftStop,
            Binding::Right => PlayerEventKind::MoveRightStop,
            Binding::Jump => PlayerEventKind::JumpStop,
            Binding::Crouch => PlayerEventKind::CrouchStop,
        }
    }
}

/// Keyboard edges to player and camera intents. Movement keys act on their
/// press and release edges; `KeyZ` zooms for as long as it is held; `KeyG`
/// toggles gravity on press.
///
/// Over a tick buffer, keys bound to the same action count as one: the start
/// fires when the first of them goes down and the stop when the last is
/// released. The buffer carries a `Pressed` event for every held key, which
/// is what tells a fresh press apart from one held since an earlier tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyboardToGameEvents;

impl KeyboardToGameEvents {
    /// Whether an event at `index` is shadowed by another key with the same
    /// binding.
    fn alias_engaged(source: &EventBuffer<InputEvent>, index: usize, event: &InputEvent) -> bool {
        let Some(binding) = Binding::for_key(event.key) else {
            return false;
        };
        let is_alias = |other: &InputEvent| {
            other.key != event.key && Binding::for_key(other.key) == Some(binding)
        };
        let went_down = |key: KeyCode| {
            source
                .iter()
                .any(|other| other.key == key && other.edge == KeyEdge::Down)
        };
        match event.edge {
            KeyEdge::Down => {
                let earlier_down = source
                    .iter()
                    .take(index)
                    .any(|other| is_alias(other) && other.edge == KeyEdge::Down);
                let held_before = source.iter().any(|other| {
                    is_alias(other) && other.edge == KeyEdge::Pressed && !went_down(other.key)
                });
                earlier_down || held_before
            }
            KeyEdge::Up => {
                let earlier_up = source
                    .iter()
                    .take(index)
                    .any(|other| is_alias(other) && other.edge == KeyEdge::Up);
                let still_held = source
                    .iter()
                    .any(|other| is_alias(other) && other.edge == KeyEdge::Pressed);
                earlier_up || still_held
            }
            KeyEdge::Pressed => false,
        }
    }
}

impl Translator<InputEvent, GameEvent> for KeyboardToGameEvents {
    fn translate_buffer(&self, source: &EventBuffer<InputEvent>) -> EventBuffer<GameEvent> {
        source
            .iter()
            .enumerate()
            .filter(|(index, event)| !Self::alias_engaged(source, *index, event))
            .filter_map(|(_, event)| self.translate(event))
            .collect()
    }

    fn translate(&self, event: &InputEvent) -> Option<GameEvent> {
        let player = |kind| Some(GameEvent::Player(PlayerEvent::new(kind, event.time)));
        match (event.edge, event.key) {
            (KeyEdge::Down, KeyCode::KeyG) => player(PlayerEventKind::CheatGravityToggle),
            (KeyEdge::Pressed, KeyCode::KeyZ) => Some(GameEvent::Camera(CameraEvent::new(
                CameraEventKind::Zoom,
                event.time,
            ))),
            (KeyEdge::Down, key) => Binding::for_key(key).and_then(|b| player(b.start())),
            (KeyEdge::Up, key) => Binding::for_key(key).and_then(|b| player(b.stop())),
            (KeyEdge::Pressed, _) => None,
        }
    }
}

/// Keeps only the movement intents, in their wire form.
#[derive(Debug, Clone, Copy, Default)]
pub struct GameToNetEvents;

impl Translator<GameEvent, NetEvent> for GameToNetEvents {
    fn translate(&self, event: &GameEvent) -> Option<NetEvent> {
        let GameEvent::Player(player) = event else {
            return None;
        };
        let kind = match player.kind {
            PlayerEventKind::MoveLeftStart => MovementKind::MoveLeftStart,
            PlayerEventKind::MoveLeftStop => MovementKind::MoveLeftStop,
            PlayerEventKind::MoveRightStart => MovementKind::MoveRightStart,
            PlayerEventKind::MoveRightStop => MovementKind::MoveRightStop,
            PlayerEventKind::JumpStart => MovementKind::JumpStart,
            PlayerEventKind::JumpStop => MovementKind::JumpStop,
            PlayerEventKind::CrouchStart => MovementKind::CrouchStart,
            PlayerEventKind::CrouchStop => MovementKind::CrouchStop,
            PlayerEventKind::Idle | PlayerEventKind::CheatGravityToggle => return None,
        };
        Some(NetEvent {
            time: player.time,
            kind,
        })
    }
}
