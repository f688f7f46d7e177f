//! Publishing a finished settlement run and announcing each table.

use anyhow::{Context, Result};
use settle_algo::SettlementResults;
use settle_core::{Notifier, PublishedLocation, ResultPublisher};
use tracing::info;

/// Publish every table of `results` in step order, notifying after each one.
///
/// The first publish or notify failure stops the run; tables already
/// announced stay announced.
pub fn publish_all(
    results: &SettlementResults,
    publisher: &dyn ResultPublisher,
    notifier: &dyn Notifier,
) -> Result<Vec<PublishedLocation>> {
    let mut published = Vec::with_capacity(results.len());
    for named in &results.tables {
        let location = publisher
            .publish(named.name, &named.table)
            .with_context(|| format!("publishing table {}", named.name))?;
        notifier
            .notify(&location)
            .with_context(|| format!("notifying coordinator of {}", location.path))?;
        published.push(location);
    }
    info!(
        tables = published.len(),
        rows = results.total_rows(),
        "published settlement results"
    );
    Ok(published)
}
