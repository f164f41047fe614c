// AWS Price List access: credentials, request signing and the API client.
pub mod client;
pub mod credentials;
pub mod sigv4;

use crate::data::price_list::PriceListFile;
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

pub use client::PricingClient;
pub use credentials::AwsCredentials;

/// Source of historical and current price-list files.
#[async_trait]
pub trait PriceListSource: Send + Sync {
    /// The price-list file effective on `day`, or `None` when AWS publishes
    /// no price list for that date.
    async fn fetch_price_file(&self, day: NaiveDate) -> Result<Option<PriceListFile>>;
}
