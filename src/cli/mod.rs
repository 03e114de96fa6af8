pub mod commands;
pub mod display;
pub mod k8s;
pub mod render;

pub use commands::{CliArgs, Commands};
