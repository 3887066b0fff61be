// Infrastructure module - External dependencies and adapters
pub mod tcp;
pub mod logging;
pub mod config;
