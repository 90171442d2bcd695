//! Process-lifetime configuration for the flood classifier workflow.

mod config;

pub use config::{CONFIG, Config};
