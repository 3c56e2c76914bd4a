use platformer_engine::app::InputError;
use platformer_engine::{InputCollector, KeyCode, KeyState};
use serde::Deserialize;
use thiserror::Error;

use super::json::{parse_json, JsonError};

#[derive(Debug, Error)]
pub(crate) enum ScriptError {
    #[error(transparent)]
    Parse(#[from] JsonError),
    #[error("script step {index}: {source}")]
    Step {
        index: usize,
        #[source]
        source: InputError,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptFile {
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    tick: u64,
    key: String,
    action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScriptStep {
    pub(crate) tick: u64,
    pub(crate) key: KeyCode,
    pub(crate) state: KeyState,
}

impl ScriptStep {
    const fn new(tick: u64, key: KeyCode, state: KeyState) -> Self {
        Self { tick, key, state }
    }
}

/// Key transitions replayed against an [`InputCollector`] by tick number.
#[derive(Debug, Clone, Default)]
pub(crate) struct InputScript {
    steps: Vec<ScriptStep>,
    cursor: usize,
}

impl InputScript {
    pub(crate) fn new(mut steps: Vec<ScriptStep>) -> Self {
        steps.sort_by_key(|step| step.tick);
        Self { steps, cursor: 0 }
    }

    pub(crate) fn len(&self) -> usize {
        self.steps.len()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.cursor >= self.steps.len()
    }

    /// Feeds every step scheduled at or before `tick`. Returns how many were
    /// applied.
    pub(crate) fn apply_due(&mut self, tick: u64, keys: &mut InputCollector, time_ms: u64) -> usize {
        let start = self.cursor;
        while let Some(step) = self.steps.get(self.cursor) {
            if step.tick > tick {
                break;
            }
            keys.handle_key(step.key, step.state, time_ms);
            self.cursor += 1;
        }
        self.cursor - start
    }
}

/// `{"steps": [{"tick": 0, "key": "ArrowRight", "action": "press"}, ...]}`
pub(crate) fn parse_script(raw: &str) -> Result<InputScript, ScriptError> {
    let file: ScriptFile = parse_json("script", raw)?;
    let steps = file
        .steps
        .into_iter()
        .enumerate()
        .map(|(index, step)| {
            let key = step
                .key
                .parse::<KeyCode>()
                .map_err(|source| ScriptError::Step { index, source })?;
            let state = step
                .action
                .parse::<KeyState>()
                .map_err(|source| ScriptError::Step { index, source })?;
            Ok(ScriptStep::new(step.tick, key, state))
        })
        .collect::<Result<Vec<_>, ScriptError>>()?;
    Ok(InputScript::new(steps))
}

/// Walks left off the spawn platform, hops, then runs right along the floor.
pub(crate) fn default_script() -> InputScript {
    use KeyCode::{ArrowLeft, ArrowRight, ArrowUp, KeyZ};
    use KeyState::{Pressed, Released};

    InputScript::new(vec![
        ScriptStep::new(90, ArrowLeft, Pressed),
        ScriptStep::new(150, ArrowUp, Pressed),
        ScriptStep::new(156, ArrowUp, Released),
        ScriptStep::new(240, ArrowLeft, Released),
        ScriptStep::new(300, KeyZ, Pressed),
        ScriptStep::new(330, KeyZ, Released),
        ScriptStep::new(360, ArrowRight, Pressed),
        ScriptStep::new(420, ArrowUp, Pressed),
        ScriptStep::new(426, ArrowUp, Released),
        ScriptStep::new(540, ArrowRight, Released),
    ])
}

#[cfg(test)]
mod tests {
    use platformer_engine::app::KeyEdge;

    use super::*;

    #[test]
    fn parses_and_orders_steps_by_tick() {
        let raw = r#"{"steps": [
            {"tick": 5, "key": "ArrowLeft", "action": "release"},
            {"tick": 1, "key": "ArrowLeft", "action": "press"}
        ]}"#;
        let script = parse_script(raw).expect("script");

        assert_eq!(script.len(), 2);
        assert_eq!(
            script.steps[0],
            ScriptStep::new(1, KeyCode::ArrowLeft, KeyState::Pressed)
        );
    }

    #[test]
    fn unknown_key_reports_step_index() {
        let raw = r#"{"steps": [
            {"tick": 0, "key": "Space", "action": "press"},
            {"tick": 1, "key": "Escape", "action": "press"}
        ]}"#;
        let error = parse_script(raw).expect_err("unknown key");
        assert!(matches!(error, ScriptError::Step { index: 1, .. }));
        assert!(error.to_string().contains("Escape"));
    }

    #[test]
    fn malformed_step_reports_json_path() {
        let raw = r#"{"steps": [{"tick": "soon", "key": "Space", "action": "press"}]}"#;
        let error = parse_script(raw).expect_err("bad tick");
        assert!(error.to_string().contains("steps[0].tick"));
    }

    #[test]
    fn apply_due_feeds_steps_up_to_tick() {
        let mut script = InputScript::new(vec![
            ScriptStep::new(0, KeyCode::KeyA, KeyState::Pressed),
            ScriptStep::new(2, KeyCode::KeyA, KeyState::Released),
        ]);
        let mut keys = InputCollector::new();

        assert_eq!(script.apply_due(0, &mut keys, 0), 1);
        assert!(keys.is_held(KeyCode::KeyA));
        assert_eq!(script.apply_due(1, &mut keys, 16), 0);
        assert_eq!(script.apply_due(2, &mut keys, 33), 1);
        assert!(script.is_finished());

        let events = keys.events_for_tick(33);
        let edges: Vec<KeyEdge> = events.iter().map(|event| event.edge).collect();
        assert_eq!(edges, vec![KeyEdge::Down, KeyEdge::Up]);
    }

    #[test]
    fn default_script_is_ordered_and_balanced() {
        let script = default_script();
        assert!(script.steps.windows(2).all(|pair| pair[0].tick <= pair[1].tick));
        let presses = script
            .steps
            .iter()
            .filter(|step| step.state == KeyState::Pressed)
            .count();
        assert_eq!(presses * 2, script.len());
    }
}
