// Tracker configuration module
pub mod settings;

pub use settings::TrackerSettings;
