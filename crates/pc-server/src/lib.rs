pub mod bootstrap;
pub mod config;
pub mod handler;
pub mod outbound;
pub mod prompts;
pub mod telemetry;
pub mod ui;
