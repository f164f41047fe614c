use serde::{Deserialize, Serialize};

/// An EC2 instance type to price, labelled with the GPU it carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GpuInstance {
    pub instance_type: String,
    pub gpu: String,
}

impl GpuInstance {
    pub fn new(instance_type: &str, gpu: &str) -> Self {
        GpuInstance {
            instance_type: instance_type.to_string(),
            gpu: gpu.to_string(),
        }
    }
}

/// One row of `gpu_prices.csv`.
///
/// `price_usd` is `None` when the instance was absent from the price list
/// effective at `timestamp`; it is written as an empty field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceRow {
    pub timestamp: String,
    pub instance: String,
    pub price_usd: Option<f64>,
}

impl PriceRow {
    pub fn new(timestamp: &str, instance: &str, price_usd: Option<f64>) -> Self {
        PriceRow {
            timestamp: timestamp.to_string(),
            instance: instance.to_string(),
            price_usd,
        }
    }
}
