pub mod deployer;
pub mod monitor;
pub mod orchestrator;
pub mod registry;
pub mod treasury;
