// The tracking run: back-fill missing months, then record today's price.
use crate::config::TrackerSettings;
use crate::data::csv_store::{has_daily_stamp_for, PriceCsvStore};
use crate::data::price_list::{PriceListFile, ProductFilter};
use crate::error::Result;
use crate::pricing::PriceListSource;
use chrono::{DateTime, NaiveDate, Utc};
use shared::models::{GpuInstance, PriceRow};
use shared::utils::{daily_stamp, month_stamp, months_descending};
use std::collections::BTreeSet;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Months that produced rows during back-fill.
    pub backfilled_months: usize,
    /// Months skipped because AWS listed no price list for them.
    pub missing_months: usize,
    pub daily_rows: usize,
    pub rows_written: usize,
}

pub struct PriceTracker<S: PriceListSource> {
    source: S,
    store: PriceCsvStore,
    instances: Vec<GpuInstance>,
    filter: ProductFilter,
    backfill_start: NaiveDate,
}

impl<S: PriceListSource> PriceTracker<S> {
    pub fn new(source: S, settings: &TrackerSettings) -> Self {
        PriceTracker {
            source,
            store: PriceCsvStore::new(settings.csv_path.clone()),
            instances: settings.instances.clone(),
            filter: ProductFilter {
                location: settings.location.clone(),
                operating_system: settings.operating_system.clone(),
                currency: settings.currency.clone(),
            },
            backfill_start: settings.backfill_start,
        }
    }

    /// Runs one tracking pass as of `now`. Rows are written only after every
    /// fetch succeeded.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let existing = self.store.load_existing_timestamps()?;
        info!(path = %self.store.path().display(), existing = existing.len(), "Loaded existing price history");

        let mut summary = RunSummary::default();
        let mut out_rows = self.backfill(now.date_naive(), &existing, &mut summary).await?;

        let today = now.date_naive();
        if has_daily_stamp_for(&existing, today) {
            info!(%today, "Today's price already recorded");
        } else {
            let stamp = daily_stamp(now);
            match self.source.fetch_price_file(today).await? {
                Some(file) => {
                    let rows = self.price_rows(&file, &stamp)?;
                    summary.daily_rows = rows.len();
                    out_rows.extend(rows);
                }
                None => warn!(%today, "No price list is effective today"),
            }
        }

        if out_rows.is_empty() {
            info!("No new data to add.");
        } else {
            summary.rows_written = self.store.append_rows(&out_rows)?;
            info!(rows = summary.rows_written, "Wrote {} new rows.", summary.rows_written);
        }
        Ok(summary)
    }

    async fn backfill(
        &self,
        today: NaiveDate,
        existing: &BTreeSet<String>,
        summary: &mut RunSummary,
    ) -> Result<Vec<PriceRow>> {
        let mut rows = Vec::new();
        for month in months_descending(today, self.backfill_start) {
            let stamp = month_stamp(month);
            if existing.contains(&stamp) {
                continue;
            }
            let file = match self.source.fetch_price_file(month).await? {
                Some(file) => file,
                None => {
                    warn!(month = %stamp, "No price list published for month, skipping");
                    summary.missing_months += 1;
                    continue;
                }
            };
            rows.extend(self.price_rows(&file, &stamp)?);
            summary.backfilled_months += 1;
        }
        Ok(rows)
    }

    fn price_rows(&self, file: &PriceListFile, stamp: &str) -> Result<Vec<PriceRow>> {
        self.instances
            .iter()
            .map(|inst| -> Result<PriceRow> {
                let price = file.extract_price(&inst.instance_type, &self.filter)?;
                match price {
                    Some(p) => info!(timestamp = stamp, instance = %inst.instance_type, gpu = %inst.gpu, price = p, "Recorded price"),
                    None => warn!(timestamp = stamp, instance = %inst.instance_type, "Instance not in price list"),
                }
                Ok(PriceRow::new(stamp, &inst.instance_type, price))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::tempdir;

    // Serves a fixed price per requested day; days without an entry have no price list.
    struct FakeSource {
        prices: HashMap<NaiveDate, &'static str>,
        requested: Mutex<Vec<NaiveDate>>,
    }

    impl FakeSource {
        fn new(prices: &[(NaiveDate, &'static str)]) -> Self {
            FakeSource { prices: prices.iter().cloned().collect(), requested: Mutex::new(Vec::new()) }
        }

        fn requested(&self) -> Vec<NaiveDate> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PriceListSource for FakeSource {
        async fn fetch_price_file(&self, day: NaiveDate) -> Result<Option<PriceListFile>> {
            self.requested.lock().unwrap().push(day);
            let price = match self.prices.get(&day) {
                Some(p) => p,
                None => return Ok(None),
            };
            let raw = format!(
                r#"{{"products":{{"SKU1":{{"attributes":{{"instanceType":"p5.48xlarge","location":"US East (N. Virginia)","operatingSystem":"Linux"}}}}}},
                   "terms":{{"OnDemand":{{"SKU1":{{"T":{{"priceDimensions":{{"D":{{"pricePerUnit":{{"USD":"{}"}}}}}}}}}}}}}}}}"#,
                price
            );
            Ok(Some(PriceListFile::from_slice(raw.as_bytes()).unwrap()))
        }
    }

    // Forward the trait through a reference so tests can inspect the fake afterwards.
    #[async_trait]
    impl<'a> PriceListSource for &'a FakeSource {
        async fn fetch_price_file(&self, day: NaiveDate) -> Result<Option<PriceListFile>> {
            (**self).fetch_price_file(day).await
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn settings_in(dir: &std::path::Path, backfill_start: NaiveDate) -> TrackerSettings {
        TrackerSettings {
            csv_path: dir.join("gpu_prices.csv"),
            backfill_start,
            instances: vec![GpuInstance::new("p5.48xlarge", "H100"), GpuInstance::new("p6-b200.48xlarge", "B200")],
            ..TrackerSettings::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 7, 0, 5).unwrap()
    }

    #[tokio::test]
    async fn test_first_run_backfills_and_records_today() {
        let dir = tempdir().unwrap();
        let settings = settings_in(dir.path(), date(2024, 1, 1));
        let source = FakeSource::new(&[
            (date(2024, 3, 1), "98.32"),
            (date(2024, 2, 1), "98.32"),
            (date(2024, 1, 1), "110.50"),
            (date(2024, 3, 15), "55.04"),
        ]);

        let tracker = PriceTracker::new(&source, &settings);
        let summary = tracker.run(now()).await.unwrap();

        assert_eq!(summary, RunSummary { backfilled_months: 3, missing_months: 0, daily_rows: 2, rows_written: 8 });
        assert_eq!(source.requested(), vec![date(2024, 3, 1), date(2024, 2, 1), date(2024, 1, 1), date(2024, 3, 15)]);

        let content = std::fs::read_to_string(&settings.csv_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "timestamp,instance,price_usd");
        assert_eq!(lines[1], "2024-03-01,p5.48xlarge,98.32");
        assert_eq!(lines[2], "2024-03-01,p6-b200.48xlarge,");
        assert_eq!(lines[5], "2024-01-01,p5.48xlarge,110.5");
        assert_eq!(lines[7], "2024-03-15T07:00:05,p5.48xlarge,55.04");
        assert_eq!(lines.len(), 9);
    }

    #[tokio::test]
    async fn test_second_run_same_day_adds_nothing() {
        let dir = tempdir().unwrap();
        let settings = settings_in(dir.path(), date(2024, 2, 1));
        let source = FakeSource::new(&[(date(2024, 3, 1), "1.0"), (date(2024, 2, 1), "1.0"), (date(2024, 3, 15), "1.0")]);

        PriceTracker::new(&source, &settings).run(now()).await.unwrap();
        let before = std::fs::read(&settings.csv_path).unwrap();

        let later = Utc.with_ymd_and_hms(2024, 3, 15, 19, 30, 0).unwrap();
        let summary = PriceTracker::new(&source, &settings).run(later).await.unwrap();

        assert_eq!(summary, RunSummary::default());
        assert_eq!(std::fs::read(&settings.csv_path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_next_day_only_adds_daily_rows() {
        let dir = tempdir().unwrap();
        let settings = settings_in(dir.path(), date(2024, 3, 1));
        let source = FakeSource::new(&[(date(2024, 3, 1), "1.0"), (date(2024, 3, 15), "1.0"), (date(2024, 3, 16), "2.0")]);

        PriceTracker::new(&source, &settings).run(now()).await.unwrap();
        let tomorrow = Utc.with_ymd_and_hms(2024, 3, 16, 7, 0, 0).unwrap();
        let summary = PriceTracker::new(&source, &settings).run(tomorrow).await.unwrap();

        assert_eq!(summary.backfilled_months, 0);
        assert_eq!(summary.daily_rows, 2);
        let content = std::fs::read_to_string(&settings.csv_path).unwrap();
        assert!(content.ends_with("2024-03-16T07:00:00,p5.48xlarge,2\n2024-03-16T07:00:00,p6-b200.48xlarge,\n"));
    }

    #[tokio::test]
    async fn test_missing_month_is_skipped() {
        let dir = tempdir().unwrap();
        let settings = settings_in(dir.path(), date(2024, 1, 1));
        let source = FakeSource::new(&[(date(2024, 3, 1), "1.0"), (date(2024, 1, 1), "1.0"), (date(2024, 3, 15), "1.0")]);

        let summary = PriceTracker::new(&source, &settings).run(now()).await.unwrap();

        assert_eq!(summary.backfilled_months, 2);
        assert_eq!(summary.missing_months, 1);
        let stamps = PriceCsvStore::new(&settings.csv_path).load_existing_timestamps().unwrap();
        assert!(!stamps.contains("2024-02-01"));
    }

    #[tokio::test]
    async fn test_no_price_list_today_keeps_backfill() {
        let dir = tempdir().unwrap();
        let settings = settings_in(dir.path(), date(2024, 3, 1));
        let source = FakeSource::new(&[(date(2024, 3, 1), "98.32")]);

        let summary = PriceTracker::new(&source, &settings).run(now()).await.unwrap();

        assert_eq!(summary, RunSummary { backfilled_months: 1, missing_months: 0, daily_rows: 0, rows_written: 2 });
        let content = std::fs::read_to_string(&settings.csv_path).unwrap();
        assert_eq!(
            content,
            "timestamp,instance,price_usd\n2024-03-01,p5.48xlarge,98.32\n2024-03-01,p6-b200.48xlarge,\n"
        );

        // Nothing was recorded for today, so a later run asks again.
        let later = Utc.with_ymd_and_hms(2024, 3, 15, 19, 30, 0).unwrap();
        let rerun = PriceTracker::new(&source, &settings).run(later).await.unwrap();
        assert_eq!(rerun, RunSummary::default());
        assert_eq!(source.requested(), vec![date(2024, 3, 1), date(2024, 3, 15), date(2024, 3, 15)]);
    }

    #[tokio::test]
    async fn test_failure_writes_nothing() {
        struct FailingSource;

        #[async_trait]
        impl PriceListSource for FailingSource {
            async fn fetch_price_file(&self, _day: NaiveDate) -> Result<Option<PriceListFile>> {
                Err(crate::error::TrackerError::ApiError { status: 403, body: "denied".to_string() })
            }
        }

        let dir = tempdir().unwrap();
        let settings = settings_in(dir.path(), date(2024, 1, 1));
        let err = PriceTracker::new(FailingSource, &settings).run(now()).await.unwrap_err();

        assert!(err.to_string().contains("403"));
        assert!(!settings.csv_path.exists());
    }
}
