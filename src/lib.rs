//! Library crate for lan-watch-rs: live host monitoring and its terminal dashboard.
pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod ports;
pub mod probe;
pub mod render;
pub mod signal;
pub mod targets;
pub mod terminal;
pub mod types;
