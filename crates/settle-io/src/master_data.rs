//! Master-data files: responsibility CSV, period partitions and event logs.
//!
//! The responsibility CSV carries one row per party designation with a boolean
//! column per responsibility kind:
//!
//! ```text
//! energy_supplier_id,grid_area,from_date,to_date,is_system_correction,is_grid_loss
//! 8510000000013,500,2019-01-01T00:00:00Z,,true,false
//! ```
//!
//! A row with both flags set yields two intervals; an empty `to_date` is
//! open-ended.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use settle_core::{
    EntityPeriod, MasterDataSource, ResponsibilityFlag, ResponsibilityInterval, SettleResult,
};
use settle_masterdata::MasterDataEvent;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ResponsibilityRecord {
    energy_supplier_id: String,
    grid_area: String,
    from_date: DateTime<Utc>,
    to_date: Option<DateTime<Utc>>,
    is_system_correction: bool,
    is_grid_loss: bool,
}

impl ResponsibilityRecord {
    fn into_intervals(self) -> Vec<ResponsibilityInterval> {
        let mut intervals = Vec::with_capacity(2);
        for (set, flag) in [
            (self.is_system_correction, ResponsibilityFlag::SystemCorrection),
            (self.is_grid_loss, ResponsibilityFlag::GridLoss),
        ] {
            if set {
                intervals.push(ResponsibilityInterval {
                    party: self.energy_supplier_id.clone(),
                    grid_area: self.grid_area.clone(),
                    flag,
                    from_date: self.from_date,
                    to_date: self.to_date,
                });
            }
        }
        intervals
    }
}

pub fn read_responsibilities_csv(path: &Path) -> Result<Vec<ResponsibilityInterval>> {
    let file = File::open(path)
        .with_context(|| format!("opening responsibilities '{}'", path.display()))?;
    let mut reader = csv::Reader::from_reader(file);
    let mut intervals = Vec::new();
    for (idx, record) in reader.deserialize::<ResponsibilityRecord>().enumerate() {
        let record = record.with_context(|| {
            format!("{}:{}: malformed responsibility row", path.display(), idx + 2)
        })?;
        if !record.is_system_correction && !record.is_grid_loss {
            warn!(
                party = %record.energy_supplier_id,
                grid_area = %record.grid_area,
                "responsibility row without any flag skipped"
            );
            continue;
        }
        intervals.extend(record.into_intervals());
    }
    debug!(path = %path.display(), intervals = intervals.len(), "read responsibilities");
    Ok(intervals)
}

/// [`MasterDataSource`] over a responsibility CSV.
#[derive(Debug, Clone)]
pub struct CsvMasterDataSource {
    path: PathBuf,
}

impl CsvMasterDataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MasterDataSource for CsvMasterDataSource {
    fn responsibility_intervals(&self) -> SettleResult<Vec<ResponsibilityInterval>> {
        Ok(read_responsibilities_csv(&self.path)?)
    }
}

/// Read period partitions stored as a JSON array of [`EntityPeriod`]s.
pub fn read_periods_json(path: &Path) -> Result<Vec<EntityPeriod>> {
    let file = File::open(path).with_context(|| format!("opening periods '{}'", path.display()))?;
    let periods: Vec<EntityPeriod> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing periods '{}'", path.display()))?;
    Ok(periods)
}

/// Write period partitions as a pretty-printed JSON array, replacing `path` atomically.
pub fn write_periods_json(path: &Path, periods: &[EntityPeriod]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }
    let staged = path.with_extension("json.tmp");
    {
        let file = File::create(&staged)
            .with_context(|| format!("creating periods '{}'", staged.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, periods)
            .with_context(|| format!("writing periods '{}'", staged.display()))?;
        writer.flush()?;
    }
    fs::rename(&staged, path)
        .with_context(|| format!("moving {} to {}", staged.display(), path.display()))?;
    Ok(())
}

/// Read master-data events stored as a JSON array.
pub fn read_events_json(path: &Path) -> Result<Vec<MasterDataEvent>> {
    let file = File::open(path).with_context(|| format!("opening events '{}'", path.display()))?;
    let events: Vec<MasterDataEvent> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing events '{}'", path.display()))?;
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use settle_core::{sentinel_end, AttributeKey, AttributeValue, Attributes, SettlementMethod};

    #[test]
    fn both_flags_yield_two_intervals() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "energy_supplier_id,grid_area,from_date,to_date,is_system_correction,is_grid_loss").unwrap();
        writeln!(file, "ES1,500,2019-01-01T00:00:00Z,,true,true").unwrap();
        writeln!(file, "ES2,501,2019-01-01T00:00:00Z,2020-01-01T00:00:00Z,false,true").unwrap();
        writeln!(file, "ES3,502,2019-01-01T00:00:00Z,,false,false").unwrap();

        let intervals = CsvMasterDataSource::new(file.path())
            .responsibility_intervals()
            .unwrap();
        assert_eq!(intervals.len(), 3);
        assert_eq!(intervals[0].flag, ResponsibilityFlag::SystemCorrection);
        assert_eq!(intervals[1].flag, ResponsibilityFlag::GridLoss);
        assert_eq!(intervals[0].to_date, None);
        assert_eq!(
            intervals[2].to_date,
            Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn periods_survive_a_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("md").join("periods.json");
        let mut attributes = Attributes::new();
        attributes.insert(
            AttributeKey::SettlementMethod,
            AttributeValue::SettlementMethod(SettlementMethod::Profiled),
        );
        let periods = vec![EntityPeriod {
            entity_id: "mp1".into(),
            attributes,
            from_date: Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
            to_date: sentinel_end(),
        }];
        write_periods_json(&path, &periods).unwrap();
        assert_eq!(read_periods_json(&path).unwrap(), periods);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn events_are_read_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        fs::write(
            &path,
            r#"[
                {"event": "metering_point_created", "metering_point_id": "mp1",
                 "effective_date": "2021-01-01T00:00:00Z", "attributes": {"grid_area": "500"}},
                {"event": "connection_state_updated", "metering_point_id": "mp1",
                 "effective_date": "2021-01-05T00:00:00Z", "connection_state": "E22"}
            ]"#,
        )
        .unwrap();
        let events = read_events_json(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].name(), "connection_state_updated");
    }
}
