// Domain module - Configuration, commands and errors
pub mod command;
pub mod config;
pub mod error;
