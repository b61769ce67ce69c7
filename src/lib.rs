#[cfg(feature = "desktop")]
pub mod camera;
pub mod config;
pub mod game;
pub mod logging;
#[cfg(feature = "desktop")]
pub mod pipeline;
pub mod pose;
pub mod render;
pub mod server;
