// Common library: the extract/map/load engine shared by the dxload binary

pub mod config;
pub mod engine;
pub mod errors;
pub mod job_config;
pub mod models;
pub mod progress;
pub mod store;
pub mod telemetry;
