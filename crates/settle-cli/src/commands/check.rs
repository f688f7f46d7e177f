use std::path::Path;

use anyhow::{bail, Context, Result};
use settle_core::ResponsibilityFlag;
use settle_io::{read_periods_json, read_responsibilities_csv};
use settle_masterdata::{AttributeSchema, PeriodStore, ResponsibilityIndex};

pub fn handle(responsibilities: Option<&Path>, periods: Option<&Path>) -> Result<()> {
    if responsibilities.is_none() && periods.is_none() {
        bail!("nothing to check: pass --responsibilities and/or --periods");
    }
    if let Some(path) = responsibilities {
        let intervals = read_responsibilities_csv(path)?;
        for flag in [ResponsibilityFlag::SystemCorrection, ResponsibilityFlag::GridLoss] {
            let index = ResponsibilityIndex::build(&intervals, flag)
                .with_context(|| format!("{}: {flag} designations", path.display()))?;
            println!("{flag}: {} interval(s) ok", index.len());
        }
    }
    if let Some(path) = periods {
        let store = PeriodStore::from_periods(AttributeSchema::metering_point(), read_periods_json(path)?)
            .with_context(|| format!("{}: period partitions", path.display()))?;
        println!("periods: {} entit(ies) ok", store.entity_count());
    }
    Ok(())
}
