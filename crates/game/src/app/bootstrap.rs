use std::env;
use std::num::ParseIntError;
use std::path::PathBuf;

use platformer_engine::{
    attach_camera, compose_world, read_text, spawn_player, LoopConfig, MetricsHandle, OwnerId,
    PersistenceError, Simulation, SnapshotError, WorldError, WorldSettings,
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::level::{parse_level, LevelError, DEMO_LEVEL};
use super::save::{load_snapshot, SaveError};
use super::script::{default_script, parse_script, InputScript, ScriptError};

pub(crate) const TICKS_ENV_VAR: &str = "PLATFORMER_TICKS";
pub(crate) const LEVEL_ENV_VAR: &str = "PLATFORMER_LEVEL";
pub(crate) const SCRIPT_ENV_VAR: &str = "PLATFORMER_SCRIPT";
pub(crate) const SAVE_ENV_VAR: &str = "PLATFORMER_SAVE";
pub(crate) const LOAD_ENV_VAR: &str = "PLATFORMER_LOAD";
pub(crate) const OWNER_ENV_VAR: &str = "PLATFORMER_OWNER";

const DEFAULT_TICKS: u64 = 600;
const DEFAULT_OWNER: &str = "local";

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("{var} must be a tick count, got `{value}`: {source}")]
    InvalidTicks {
        var: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("level: {0}")]
    Level(#[from] LevelError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("world: {0}")]
    World(#[from] WorldError),
    #[error(transparent)]
    Save(#[from] SaveError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Raw run options, read from `PLATFORMER_*` variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RunOptions {
    pub(crate) ticks: Option<u64>,
    pub(crate) level: Option<PathBuf>,
    pub(crate) script: Option<PathBuf>,
    pub(crate) save: Option<PathBuf>,
    pub(crate) load: Option<PathBuf>,
    pub(crate) owner: Option<String>,
}

impl RunOptions {
    pub(crate) fn from_env() -> Result<Self, AppError> {
        let ticks = match read_env(TICKS_ENV_VAR)? {
            Some(value) => Some(parse_ticks(&value)?),
            None => None,
        };
        Ok(Self {
            ticks,
            level: read_env(LEVEL_ENV_VAR)?.map(PathBuf::from),
            script: read_env(SCRIPT_ENV_VAR)?.map(PathBuf::from),
            save: read_env(SAVE_ENV_VAR)?.map(PathBuf::from),
            load: read_env(LOAD_ENV_VAR)?.map(PathBuf::from),
            owner: read_env(OWNER_ENV_VAR)?,
        })
    }
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) simulation: Simulation,
    pub(crate) script: InputScript,
    pub(crate) ticks: u64,
    pub(crate) save_path: Option<PathBuf>,
    pub(crate) metrics: MetricsHandle,
}

pub(crate) fn build_app() -> Result<AppWiring, AppError> {
    init_tracing();
    info!("=== Platformer Startup ===");

    let options = RunOptions::from_env()?;
    wire(&options, &WorldSettings::default())
}

pub(crate) fn wire(options: &RunOptions, settings: &WorldSettings) -> Result<AppWiring, AppError> {
    let requested_owner = OwnerId::new(options.owner.as_deref().unwrap_or(DEFAULT_OWNER));

    let simulation = match &options.load {
        Some(path) => {
            let mut restored = load_snapshot(path)?;
            if options.owner.is_some() && restored.owner != requested_owner {
                warn!(
                    requested = %requested_owner,
                    saved = %restored.owner,
                    "owner_taken_from_save"
                );
            }
            attach_camera(&mut restored.tree, restored.player, settings.viewport);
            Simulation::new(restored.tree, restored.root, restored.owner)
        }
        None => {
            let layout = match &options.level {
                Some(path) => read_text(path)?,
                None => DEMO_LEVEL.to_string(),
            };
            let placements = parse_level(&layout, settings)?;
            let mut world = compose_world(settings, &placements)?;
            let player = spawn_player(
                &mut world.tree,
                world.root,
                settings,
                requested_owner.clone(),
            );
            attach_camera(&mut world.tree, player, settings.viewport);
            Simulation::new(world.tree, world.root, requested_owner)
        }
    };

    let script = match &options.script {
        Some(path) => parse_script(&read_text(path)?)?,
        None => default_script(),
    };

    let config = LoopConfig::default();
    let ticks = options.ticks.unwrap_or(DEFAULT_TICKS);
    info!(
        owner = %simulation.owner(),
        nodes = simulation.tree().len(),
        script_steps = script.len(),
        ticks,
        target_tps = config.target_tps,
        max_frame_delta_ms = config.max_frame_delta.as_millis() as u64,
        max_ticks_per_frame = config.max_ticks_per_frame,
        "loop_config"
    );

    Ok(AppWiring {
        config,
        simulation,
        script,
        ticks,
        save_path: options.save.clone(),
        metrics: MetricsHandle::default(),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn read_env(var: &'static str) -> Result<Option<String>, AppError> {
    match env::var(var) {
        Ok(value) => {
            let trimmed = value.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Err(env::VarError::NotPresent) => Ok(None),
        Err(source) => Err(AppError::EnvVar { var, source }),
    }
}

fn parse_ticks(value: &str) -> Result<u64, AppError> {
    value.parse::<u64>().map_err(|source| AppError::InvalidTicks {
        var: TICKS_ENV_VAR,
        value: value.to_string(),
        source,
    })
}
