//! Client for the AWS Price List Query API (`AWSPriceListService`).
//!
//! Two calls locate a bulk price-list file: `ListPriceLists` returns the ARN
//! of the list effective on a date, `GetPriceListFileUrl` turns the ARN into a
//! pre-signed download URL. The file itself is fetched with a plain GET.

use super::credentials::AwsCredentials;
use super::sigv4::{Signer, SigningRequest};
use super::PriceListSource;
use crate::config::TrackerSettings;
use crate::data::price_list::PriceListFile;
use crate::error::{Result, TrackerError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

const SERVICE_CODE: &str = "AmazonEC2";
const SIGNING_SERVICE: &str = "pricing";
const TARGET_PREFIX: &str = "AWSPriceListService";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListPriceListsResponse {
    #[serde(default)]
    price_lists: Vec<PriceListSummary>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PriceListSummary {
    pub price_list_arn: String,
}

#[derive(Debug, Deserialize)]
struct GetPriceListFileUrlResponse {
    #[serde(rename = "Url")]
    url: String,
}

pub struct PricingClient {
    http: Client,
    // Bounds connect, time to response headers and every gap between body chunks.
    // The whole transfer is unbounded: regional EC2 price lists run to gigabytes.
    idle_timeout: Duration,
    endpoint: String,
    host: String,
    region: String,
    currency: String,
    credentials: AwsCredentials,
}

impl PricingClient {
    pub fn new(settings: &TrackerSettings, credentials: AwsCredentials) -> Result<Self> {
        let idle_timeout = Duration::from_secs(settings.http_timeout_secs);
        let http = Client::builder()
            .connect_timeout(idle_timeout)
            .user_agent(concat!("gpu-price-tracker/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let endpoint = settings.api_endpoint();
        let host = extract_host(&endpoint)?;

        Ok(PricingClient {
            http,
            idle_timeout,
            endpoint,
            host,
            region: settings.pricing_region.clone(),
            currency: settings.currency.clone(),
            credentials,
        })
    }

    /// The EC2 price lists effective on `day` for the configured region, at most one.
    pub async fn list_price_lists(&self, day: NaiveDate) -> Result<Vec<PriceListSummary>> {
        let body = list_price_lists_body(day, &self.region, &self.currency);
        let response: ListPriceListsResponse = self.call("ListPriceLists", &body).await?;
        Ok(response.price_lists)
    }

    pub async fn get_price_list_file_url(&self, arn: &str) -> Result<String> {
        let body = json!({ "PriceListArn": arn, "FileFormat": "json" });
        let response: GetPriceListFileUrlResponse = self.call("GetPriceListFileUrl", &body).await?;
        Ok(response.url)
    }

    pub async fn download_price_file(&self, url: &str) -> Result<PriceListFile> {
        let response = self.send(self.http.get(url)).await?;
        let status = response.status();
        let bytes = self.read_body(response).await?;
        if !status.is_success() {
            return Err(TrackerError::ApiError {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        debug!(bytes = bytes.len(), "Downloaded price-list file");
        PriceListFile::from_slice(&bytes)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        timeout(self.idle_timeout, request.send())
            .await
            .map_err(|_| self.timed_out("response headers"))?
            .map_err(TrackerError::from)
    }

    // Streams the body, failing only when a single read stalls past the idle timeout.
    async fn read_body(&self, mut response: Response) -> Result<Vec<u8>> {
        let mut body = Vec::with_capacity(response.content_length().unwrap_or(0).min(64 * 1024 * 1024) as usize);
        while let Some(chunk) = timeout(self.idle_timeout, response.chunk())
            .await
            .map_err(|_| self.timed_out("response body"))??
        {
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    fn timed_out(&self, what: &'static str) -> TrackerError {
        TrackerError::TimeoutError { what, secs: self.idle_timeout.as_secs() }
    }

    async fn call<T: DeserializeOwned>(&self, operation: &str, body: &Value) -> Result<T> {
        let payload = serde_json::to_vec(body)?;
        let target = format!("{}.{}", TARGET_PREFIX, operation);

        let signer = Signer::new(&self.credentials, &self.region, SIGNING_SERVICE);
        let signed = signer.sign(
            &SigningRequest {
                method: "POST",
                host: &self.host,
                path: "/",
                headers: &[("content-type", CONTENT_TYPE), ("x-amz-target", target.as_str())],
                payload: &payload,
            },
            Utc::now(),
        );

        let mut request = self
            .http
            .post(format!("{}/", self.endpoint))
            .header("content-type", CONTENT_TYPE)
            .header("x-amz-target", &target);
        for (name, value) in signed {
            request = request.header(name, value);
        }

        debug!(operation, "Calling Price List API");
        let response = self.send(request.body(payload)).await?;
        let status = response.status();
        let bytes = self.read_body(response).await?;
        if !status.is_success() {
            return Err(TrackerError::ApiError {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl PriceListSource for PricingClient {
    async fn fetch_price_file(&self, day: NaiveDate) -> Result<Option<PriceListFile>> {
        let lists = self.list_price_lists(day).await?;
        let arn = match lists.into_iter().next() {
            Some(summary) => summary.price_list_arn,
            None => return Ok(None),
        };
        info!(%day, %arn, "Fetching price-list file");
        let url = self.get_price_list_file_url(&arn).await?;
        Ok(Some(self.download_price_file(&url).await?))
    }
}

fn list_price_lists_body(day: NaiveDate, region: &str, currency: &str) -> Value {
    let effective: DateTime<Utc> = DateTime::from_naive_utc_and_offset(day.and_time(NaiveTime::default()), Utc);
    json!({
        "ServiceCode": SERVICE_CODE,
        // awsJson1_1 timestamps travel as epoch seconds
        "EffectiveDate": effective.timestamp(),
        "CurrencyCode": currency,
        "RegionCode": region,
        "MaxResults": 1,
    })
}

fn extract_host(endpoint: &str) -> Result<String> {
    let host = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .unwrap_or(endpoint);
    let host = host.split('/').next().unwrap_or(host);
    if host.is_empty() {
        return Err(TrackerError::ConfigError(format!("Invalid pricing endpoint '{}'", endpoint)));
    }
    Ok(host.to_string())
}
