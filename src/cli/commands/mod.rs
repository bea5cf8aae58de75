//! CLI command implementations.

mod config;
mod doctor;
mod generate;
mod serve;

pub use config::run_config;
pub use doctor::run_doctor;
pub use generate::{run_generate, GenerateOptions};
pub use serve::run_serve;
