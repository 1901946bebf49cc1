pub mod config;
pub mod constants;
pub mod logger;
pub mod utils;
