// Services module: the tracking run and its collaborators
pub mod tracker_service;

pub use tracker_service::{PriceTracker, RunSummary};
