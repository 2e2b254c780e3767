mod app;
mod config;
mod logging;
mod preferences;
mod render;

pub(crate) use app::run;
pub(crate) use logging::LogDestination;
