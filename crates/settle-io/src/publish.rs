//! Publishing result tables as newline-delimited JSON files.
//!
//! Tables land in `<root>/Results/<stamp>/<name>.json`, one JSON object per
//! row. A row's `time_window` is flattened into `time_start` / `time_end`
//! strings (`%Y-%m-%dT%H:%M:%SZ`) for the downstream message builders.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use settle_core::{PublishedLocation, ResultPublisher, ResultTable, SettleResult, TimeWindow};
use tracing::info;

pub const RESULTS_DIR: &str = "Results";
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Directory-name stamp of a run started at `at`.
pub fn run_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Serialize one row, replacing `time_window` with formatted start/end fields.
pub fn row_to_json<T: Serialize>(row: &T) -> Result<Value> {
    let value = serde_json::to_value(row).context("serializing result row")?;
    let Value::Object(mut fields) = value else {
        return Ok(value);
    };
    if let Some(window) = fields.remove("time_window") {
        let window: TimeWindow =
            serde_json::from_value(window).context("reading time window of result row")?;
        let mut flattened = Map::with_capacity(fields.len() + 2);
        flattened.insert(
            "time_start".into(),
            Value::String(window.start.format(TIME_FORMAT).to_string()),
        );
        flattened.insert(
            "time_end".into(),
            Value::String(window.end.format(TIME_FORMAT).to_string()),
        );
        flattened.extend(fields);
        return Ok(Value::Object(flattened));
    }
    Ok(Value::Object(fields))
}

fn write_rows<T: Serialize>(writer: &mut impl Write, rows: &[T]) -> Result<()> {
    for row in rows {
        serde_json::to_writer(&mut *writer, &row_to_json(row)?)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

fn write_table(writer: &mut impl Write, table: &ResultTable) -> Result<()> {
    match table {
        ResultTable::Aggregates(rows) => write_rows(writer, rows),
        ResultTable::Exchange(rows) => write_rows(writer, rows),
        ResultTable::GridLoss(rows) => write_rows(writer, rows),
        ResultTable::Adjustments(rows) => write_rows(writer, rows),
        ResultTable::Attributed(rows) => write_rows(writer, rows),
    }
}

/// Writes each table to its own file under a per-run directory.
#[derive(Debug, Clone)]
pub struct JsonFilePublisher {
    root: PathBuf,
    stamp: String,
}

impl JsonFilePublisher {
    /// Publisher stamped with the current time.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_stamp(root, run_stamp(Utc::now()))
    }

    pub fn with_stamp(root: impl Into<PathBuf>, stamp: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            stamp: stamp.into(),
        }
    }

    /// Path of a table relative to the root, as reported to the coordinator.
    pub fn relative_path(&self, name: &str) -> String {
        format!("{RESULTS_DIR}/{}/{name}.json", self.stamp)
    }

    pub fn run_dir(&self) -> PathBuf {
        self.root.join(RESULTS_DIR).join(&self.stamp)
    }

    fn write(&self, name: &str, table: &ResultTable) -> Result<PathBuf> {
        let dir = self.run_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating output directory '{}'", dir.display()))?;
        let target = dir.join(format!("{name}.json"));
        let staged = dir.join(format!(".{name}.json.tmp"));
        {
            let file = File::create(&staged)
                .with_context(|| format!("creating '{}'", staged.display()))?;
            let mut writer = BufWriter::new(file);
            write_table(&mut writer, table)
                .with_context(|| format!("writing table {name} to '{}'", staged.display()))?;
            writer.flush()?;
        }
        fs::rename(&staged, &target)
            .with_context(|| format!("moving {} to {}", staged.display(), target.display()))?;
        Ok(target)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResultPublisher for JsonFilePublisher {
    fn publish(&self, name: &str, table: &ResultTable) -> SettleResult<PublishedLocation> {
        let target = self.write(name, table)?;
        info!(table = name, rows = table.len(), path = %target.display(), "published table");
        Ok(PublishedLocation {
            name: name.to_string(),
            path: self.relative_path(name),
            rows: table.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use settle_core::GridLossRow;

    fn loss_table() -> ResultTable {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        ResultTable::GridLoss(vec![
            GridLossRow {
                grid_area: "500".into(),
                time_window: TimeWindow::new(start, start + chrono::Duration::hours(1)).unwrap(),
                grid_loss: Decimal::new(125, 1),
            },
            GridLossRow {
                grid_area: "501".into(),
                time_window: TimeWindow::new(start, start + chrono::Duration::hours(1)).unwrap(),
                grid_loss: Decimal::ZERO,
            },
        ])
    }

    #[test]
    fn table_is_written_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = JsonFilePublisher::with_stamp(dir.path(), "2020-01-01_00-00-00");
        let location = publisher.publish("grid_loss", &loss_table()).unwrap();

        assert_eq!(location.path, "Results/2020-01-01_00-00-00/grid_loss.json");
        assert_eq!(location.rows, 2);

        let text = fs::read_to_string(dir.path().join(&location.path)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["time_start"], "2020-01-01T00:00:00Z");
        assert_eq!(first["time_end"], "2020-01-01T01:00:00Z");
        assert_eq!(first["grid_area"], "500");
        assert!(first.get("time_window").is_none());
    }

    #[test]
    fn empty_table_writes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = JsonFilePublisher::with_stamp(dir.path(), "s");
        let location = publisher
            .publish("added_grid_loss", &ResultTable::Adjustments(Vec::new()))
            .unwrap();
        let text = fs::read_to_string(dir.path().join(location.path)).unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn stamp_format() {
        let at = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(run_stamp(at), "2021-03-04_05-06-07");
    }
}
