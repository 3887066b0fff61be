// Core module - Command encoding and connection management
pub mod connection;
pub mod encoder;
