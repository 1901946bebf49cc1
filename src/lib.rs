pub mod common;
pub mod core;
pub mod dex;
pub mod engine;

pub use engine::orchestrator::run_lifecycle_bot;
