//! Reading ingestion from CSV.
//!
//! Expected header (empty cells mean "not set"):
//!
//! ```text
//! metering_point_id,grid_area,responsible_party,supplier,point_type,settlement_method,connection_state,in_grid_area,out_grid_area,quantity,observed_at,quality
//! ```
//!
//! Codes are market codes (`E17`, `E22`, `E01`, ...); quantities are decimal
//! strings and are parsed without passing through floating point.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use settle_core::{
    ConnectionState, PointType, Quality, Reading, ReadingQuery, ReadingSource, SettleResult,
    SettlementMethod,
};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReadingRecord {
    metering_point_id: String,
    grid_area: String,
    responsible_party: Option<String>,
    supplier: Option<String>,
    point_type: String,
    settlement_method: Option<String>,
    connection_state: String,
    in_grid_area: Option<String>,
    out_grid_area: Option<String>,
    quantity: String,
    observed_at: DateTime<Utc>,
    quality: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_code<T>(raw: &str) -> Result<T>
where
    T: FromStr<Err = settle_core::SettleError>,
{
    raw.parse::<T>().map_err(|err| anyhow!(err))
}

impl ReadingRecord {
    fn into_reading(self) -> Result<Reading> {
        let quantity = Decimal::from_str(self.quantity.trim())
            .with_context(|| format!("parsing quantity '{}'", self.quantity))?;
        let settlement_method = non_empty(self.settlement_method)
            .map(|raw| parse_code::<SettlementMethod>(&raw))
            .transpose()?;
        Ok(Reading {
            metering_point_id: self.metering_point_id,
            grid_area: self.grid_area,
            responsible_party: non_empty(self.responsible_party),
            supplier: non_empty(self.supplier),
            point_type: parse_code::<PointType>(&self.point_type)?,
            settlement_method,
            connection_state: parse_code::<ConnectionState>(&self.connection_state)?,
            in_grid_area: non_empty(self.in_grid_area),
            out_grid_area: non_empty(self.out_grid_area),
            quantity,
            observed_at: self.observed_at,
            quality: parse_code::<Quality>(&self.quality)?,
        })
    }

    fn from_reading(reading: &Reading) -> Self {
        Self {
            metering_point_id: reading.metering_point_id.clone(),
            grid_area: reading.grid_area.clone(),
            responsible_party: reading.responsible_party.clone(),
            supplier: reading.supplier.clone(),
            point_type: reading.point_type.code().to_string(),
            settlement_method: reading.settlement_method.map(|m| m.code().to_string()),
            connection_state: reading.connection_state.code().to_string(),
            in_grid_area: reading.in_grid_area.clone(),
            out_grid_area: reading.out_grid_area.clone(),
            quantity: reading.quantity.to_string(),
            observed_at: reading.observed_at,
            quality: reading.quality.code().to_string(),
        }
    }
}

/// Read every reading in a CSV file.
pub fn read_readings_csv(path: &Path) -> Result<Vec<Reading>> {
    let file = File::open(path).with_context(|| format!("opening readings '{}'", path.display()))?;
    let mut reader = csv::Reader::from_reader(file);
    let mut readings = Vec::new();
    for (idx, record) in reader.deserialize::<ReadingRecord>().enumerate() {
        // header is line 1
        let line = idx + 2;
        let record = record.with_context(|| format!("{}:{line}: malformed reading", path.display()))?;
        let reading = record
            .into_reading()
            .with_context(|| format!("{}:{line}: invalid reading", path.display()))?;
        readings.push(reading);
    }
    debug!(path = %path.display(), readings = readings.len(), "read readings");
    Ok(readings)
}

pub fn write_readings_csv(path: &Path, readings: &[Reading]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating readings '{}'", path.display()))?;
    for reading in readings {
        writer.serialize(ReadingRecord::from_reading(reading))?;
    }
    writer.flush()?;
    Ok(())
}

/// [`ReadingSource`] over a CSV file; the query is applied while loading.
#[derive(Debug, Clone)]
pub struct CsvReadingSource {
    path: PathBuf,
}

impl CsvReadingSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReadingSource for CsvReadingSource {
    fn readings(&self, query: &ReadingQuery) -> SettleResult<Vec<Reading>> {
        let all = read_readings_csv(&self.path)?;
        let total = all.len();
        let selected: Vec<Reading> = all.into_iter().filter(|r| query.admits(r)).collect();
        info!(
            path = %self.path.display(),
            total,
            selected = selected.len(),
            "loaded readings"
        );
        Ok(selected)
    }
}
