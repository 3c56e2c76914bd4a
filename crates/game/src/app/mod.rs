mod bootstrap;
mod json;
mod level;
mod loop_runner;
mod save;
mod script;

pub(crate) use bootstrap::build_app;
pub(crate) use loop_runner::run;
