pub mod models;
pub mod utils;

// Data models and calendar helpers shared by the tracker binary and its tests.
