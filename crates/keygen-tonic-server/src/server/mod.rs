pub mod backend;
pub mod config;
pub mod replenish;
pub mod service;
pub mod telemetry;
