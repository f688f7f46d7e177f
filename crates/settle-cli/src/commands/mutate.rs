use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Result};
use settle_io::{read_events_json, read_periods_json, write_periods_json, CoordinatorClient, SettleConfig};
use settle_masterdata::{dispatch_all, AttributeSchema, DispatchSummary, PeriodStore};
use tabwriter::TabWriter;

pub fn handle(periods: &Path, events: &Path, out: Option<&Path>, config: Option<&Path>) -> Result<()> {
    let mut store = PeriodStore::from_periods(AttributeSchema::metering_point(), read_periods_json(periods)?)?;
    let events = read_events_json(events)?;
    let summary = dispatch_all(&mut store, &events);

    let target = out.unwrap_or(periods);
    write_periods_json(target, &store.into_periods())?;
    print_summary(&summary)?;

    if let Some(config_path) = config {
        let config = SettleConfig::load(config_path)?;
        if config.coordinator.enabled {
            CoordinatorClient::from_coordinator_config(&config.coordinator)
                .notify_snapshot(&target.display().to_string())?;
        }
    }

    if !summary.is_clean() {
        bail!(
            "{} event(s) rejected, {} skipped; affected partitions were left unchanged",
            summary.failures.len(),
            summary.skipped
        );
    }
    Ok(())
}

fn print_summary(summary: &DispatchSummary) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout()).padding(2);
    writeln!(writer, "created\t{}", summary.created)?;
    writeln!(writer, "overwritten\t{}", summary.overwritten)?;
    writeln!(writer, "split\t{}", summary.split)?;
    writeln!(writer, "failed\t{}", summary.failures.len())?;
    writeln!(writer, "skipped\t{}", summary.skipped)?;
    writer.flush()?;
    for (entity, event, error) in &summary.failures {
        eprintln!("{entity}: {event}: {error}");
    }
    Ok(())
}
