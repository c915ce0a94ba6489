// src/models/mod.rs
pub mod monitor;

pub use monitor::{
    ApiResponse, Chain, DetectedTransaction, MonitorRunState, RunStatus, WatchedAddress,
};
