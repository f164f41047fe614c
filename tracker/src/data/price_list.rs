// AWS bulk price-list file model and on-demand price extraction.
use crate::error::{Result, TrackerError};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// The subset of an EC2 price-list JSON document the tracker reads.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PriceListFile {
    #[serde(default)]
    pub products: BTreeMap<String, Product>,
    #[serde(default)]
    pub terms: Terms,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Product {
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Terms {
    #[serde(rename = "OnDemand", default)]
    pub on_demand: HashMap<String, BTreeMap<String, Term>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Term {
    #[serde(rename = "priceDimensions", default)]
    pub price_dimensions: BTreeMap<String, PriceDimension>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PriceDimension {
    #[serde(rename = "pricePerUnit", default)]
    pub price_per_unit: HashMap<String, String>,
}

/// Attribute values a product must carry to be priced.
#[derive(Debug, Clone)]
pub struct ProductFilter {
    pub location: String,
    pub operating_system: String,
    pub currency: String,
}

// Among several matching SKUs, prefer plain shared-tenancy capacity with no
// pre-installed software. Each attribute is only checked when present.
const PREFERRED_ATTRIBUTES: [(&str, &str); 3] = [
    ("tenancy", "Shared"),
    ("preInstalledSw", "NA"),
    ("capacitystatus", "Used"),
];

impl PriceListFile {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Pull the on-demand price for `instance_type`, or `None` when the file
    /// has no matching product.
    pub fn extract_price(&self, instance_type: &str, filter: &ProductFilter) -> Result<Option<f64>> {
        let sku = match self.find_sku(instance_type, filter) {
            Some(sku) => sku,
            None => return Ok(None),
        };

        let dimension = self
            .terms
            .on_demand
            .get(sku)
            .and_then(|terms| terms.values().next())
            .and_then(|term| term.price_dimensions.values().next());

        let dimension = match dimension {
            Some(d) => d,
            None => {
                tracing::warn!(sku = %sku, instance = %instance_type, "SKU has no on-demand price dimension");
                return Ok(None);
            }
        };

        let raw = dimension.price_per_unit.get(&filter.currency).ok_or_else(|| {
            TrackerError::PriceFormatError(format!("SKU {} has no {} price", sku, filter.currency))
        })?;
        let price = raw
            .trim()
            .parse::<f64>()
            .map_err(|e| TrackerError::PriceFormatError(format!("Failed to parse price '{}' for SKU {}: {}", raw, sku, e)))?;
        Ok(Some(price))
    }

    fn find_sku(&self, instance_type: &str, filter: &ProductFilter) -> Option<&str> {
        // BTreeMap iteration keeps candidates in SKU order.
        let candidates: Vec<(&String, &Product)> = self
            .products
            .iter()
            .filter(|(_, p)| {
                p.attribute("instanceType") == Some(instance_type)
                    && p.attribute("location") == Some(filter.location.as_str())
                    && p.attribute("operatingSystem") == Some(filter.operating_system.as_str())
            })
            .collect();

        candidates
            .iter()
            .find(|(_, p)| p.is_preferred())
            .or_else(|| candidates.first())
            .map(|(sku, _)| *sku)
            .map(String::as_str)
    }
}

impl Product {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn is_preferred(&self) -> bool {
        PREFERRED_ATTRIBUTES
            .iter()
            .all(|(name, wanted)| self.attribute(name).map_or(true, |value| value == *wanted))
    }
}
