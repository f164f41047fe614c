// Tracker library root
// The binary in main.rs wires these together; tests drive them directly.

pub mod config;
pub mod data;
pub mod error;
pub mod pricing;
pub mod services;

pub use error::{Result, TrackerError};
