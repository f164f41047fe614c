use crate::error::{Result, TrackerError};
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use shared::models::PriceRow;
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const HEADERS: [&str; 3] = ["timestamp", "instance", "price_usd"];

/// Append-only store backed by `gpu_prices.csv`.
pub struct PriceCsvStore {
    path: PathBuf,
}

impl PriceCsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PriceCsvStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every timestamp already recorded. A missing file has none.
    pub fn load_existing_timestamps(&self) -> Result<BTreeSet<String>> {
        if !self.path.exists() {
            return Ok(BTreeSet::new());
        }
        let file = File::open(&self.path)?;
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(BufReader::new(file));

        let headers = rdr.headers()?.clone();
        if headers.is_empty() {
            return Ok(BTreeSet::new());
        }
        let column = headers.iter().position(|h| h == "timestamp").ok_or_else(|| {
            TrackerError::CsvDataFormatError(format!("'{}' has no 'timestamp' column", self.path.display()))
        })?;

        let mut stamps = BTreeSet::new();
        for (idx, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| {
                TrackerError::CsvDataFormatError(format!("Error reading CSV record at line {}: {}", idx + 2, e))
            })?;
            if let Some(stamp) = record.get(column) {
                if !stamp.is_empty() {
                    stamps.insert(stamp.to_string());
                }
            }
        }
        Ok(stamps)
    }

    /// Appends `rows`, writing the header first when the file is new.
    pub fn append_rows(&self, rows: &[PriceRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let new_file = std::fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let mut file = OpenOptions::new().create(true).read(true).append(true).open(&self.path)?;
        if !new_file && !ends_with_newline(&mut file)? {
            file.write_all(b"\n")?;
        }
        let mut wtr = WriterBuilder::new().has_headers(false).from_writer(file);

        if new_file {
            wtr.write_record(HEADERS)?;
        }
        for row in rows {
            let price = row.price_usd.map(|p| p.to_string()).unwrap_or_default();
            wtr.write_record([row.timestamp.as_str(), row.instance.as_str(), price.as_str()])?;
        }
        wtr.flush()?;
        Ok(rows.len())
    }
}

// Hand-edited files may lack a trailing newline; appending then would glue rows together.
fn ends_with_newline(file: &mut File) -> Result<bool> {
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Whether `existing` already holds a date-time stamp on `date`.
pub fn has_daily_stamp_for(existing: &BTreeSet<String>, date: NaiveDate) -> bool {
    let prefix = format!("{}T", date.format("%Y-%m-%d"));
    existing.iter().any(|stamp| stamp.starts_with(&prefix))
}
