use std::io::{self, Write};

use anyhow::{Context, Result};
use settle_algo::run_settlement;
use settle_core::{MasterDataSource, PublishedLocation, ReadingSource};
use settle_io::{
    publish_all, CoordinatorClient, CsvMasterDataSource, CsvReadingSource, JsonFilePublisher,
    LogNotifier, SettleConfig,
};
use settle_cli::cli::RunArgs;
use tabwriter::TabWriter;
use tracing::{info, warn};

use crate::commands::util::{configure_threads, parse_grid_areas};

fn apply_overrides(config: &mut SettleConfig, args: &RunArgs) {
    if args.beginning.is_some() {
        config.job.beginning = args.beginning;
    }
    if args.end.is_some() {
        config.job.end = args.end;
    }
    if let Some(spec) = &args.grid_areas {
        config.job.grid_areas = parse_grid_areas(spec);
    }
    if args.readings.is_some() {
        config.input.readings = args.readings.clone();
    }
    if args.responsibilities.is_some() {
        config.input.responsibilities = args.responsibilities.clone();
    }
    if let Some(output) = &args.output {
        config.output.root = output.clone();
    }
    if args.no_notify {
        config.coordinator.enabled = false;
    }
}

pub fn handle(args: &RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SettleConfig::load(path)?,
        None => SettleConfig::default(),
    };
    apply_overrides(&mut config, args);
    config.validate().context("invalid run configuration")?;

    let threads = args
        .threads
        .clone()
        .unwrap_or_else(|| config.runtime.threads.to_string());
    configure_threads(&threads);

    let query = config.reading_query()?;
    let readings_path = config
        .input
        .readings
        .clone()
        .context("input.readings is required")?;
    let readings = CsvReadingSource::new(readings_path).readings(&query)?;

    let intervals = match &config.input.responsibilities {
        Some(path) => CsvMasterDataSource::new(path).responsibility_intervals()?,
        None => {
            warn!("no responsibility file given; grid loss and system correction stay unassigned");
            Vec::new()
        }
    };

    let results = run_settlement(&readings, &intervals, &config.settlement_config())
        .context("settlement run failed")?;

    let publisher = match &args.stamp {
        Some(stamp) => JsonFilePublisher::with_stamp(&config.output.root, stamp.clone()),
        None => JsonFilePublisher::new(&config.output.root),
    };
    let published = if config.coordinator.enabled {
        let client = CoordinatorClient::from_config(&config)?;
        publish_all(&results, &publisher, &client)?
    } else {
        publish_all(&results, &publisher, &LogNotifier)?
    };
    info!(dir = %publisher.run_dir().display(), "run finished");

    print_published(&published)
}

fn print_published(published: &[PublishedLocation]) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout()).padding(2);
    writeln!(writer, "TABLE\tROWS\tPATH")?;
    for location in published {
        writeln!(writer, "{}\t{}\t{}", location.name, location.rows, location.path)?;
    }
    writer.flush()?;
    Ok(())
}
