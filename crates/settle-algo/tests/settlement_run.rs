use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use settle_algo::{run_settlement, SettlementConfig};
use settle_core::{
    AggregateRow, AttributedAdjustment, ConnectionState, GridLossRow, PointType, Quality, Reading,
    ResponsibilityFlag, ResponsibilityInterval, ResultTable, SettleError, SettlementMethod,
};

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, h, m, 0).unwrap()
}

fn qty(v: i64) -> Decimal {
    Decimal::from(v)
}

/// Grid area 500 importing 10 from 501 in hour 0 and 1 in hour 1.
fn readings() -> Vec<Reading> {
    vec![
        Reading::new("x1", "500", PointType::Exchange, qty(10), at(0, 0)).with_exchange("500", "501"),
        Reading::new("x1", "500", PointType::Exchange, qty(1), at(1, 0)).with_exchange("500", "501"),
        Reading::new("p1", "500", PointType::Production, qty(5), at(0, 0)).with_parties("BRP1", "ES1"),
        Reading::new("p1", "500", PointType::Production, qty(1), at(1, 0)).with_parties("BRP1", "ES1"),
        Reading::new("p2", "500", PointType::Production, qty(4), at(1, 0))
            .with_parties("BRP2", "ES2")
            .with_connection_state(ConnectionState::New),
        Reading::new("c1", "500", PointType::Consumption, qty(3), at(0, 30))
            .with_parties("BRP1", "ES1")
            .with_settlement_method(SettlementMethod::NonProfiled),
        Reading::new("c1", "500", PointType::Consumption, qty(2), at(1, 30))
            .with_parties("BRP1", "ES1")
            .with_settlement_method(SettlementMethod::NonProfiled),
        Reading::new("f1", "500", PointType::Consumption, qty(2), at(0, 45))
            .with_parties("BRP1", "ES2")
            .with_settlement_method(SettlementMethod::Flex)
            .with_quality(Quality::Estimated),
        Reading::new("f1", "500", PointType::Consumption, qty(1), at(1, 45))
            .with_parties("BRP1", "ES2")
            .with_settlement_method(SettlementMethod::Flex),
    ]
}

fn intervals() -> Vec<ResponsibilityInterval> {
    vec![
        ResponsibilityInterval {
            party: "ES1".into(),
            grid_area: "500".into(),
            flag: ResponsibilityFlag::SystemCorrection,
            from_date: Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap(),
            to_date: None,
        },
        ResponsibilityInterval {
            party: "ES2".into(),
            grid_area: "500".into(),
            flag: ResponsibilityFlag::GridLoss,
            from_date: Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap(),
            to_date: None,
        },
    ]
}

fn aggregates<'a>(table: Option<&'a ResultTable>) -> &'a [AggregateRow] {
    match table {
        Some(ResultTable::Aggregates(rows)) => rows,
        other => panic!("expected aggregates, got {other:?}"),
    }
}

fn grid_loss(table: Option<&ResultTable>) -> &[GridLossRow] {
    match table {
        Some(ResultTable::GridLoss(rows)) => rows,
        other => panic!("expected grid loss, got {other:?}"),
    }
}

fn attributed(table: Option<&ResultTable>) -> &[AttributedAdjustment] {
    match table {
        Some(ResultTable::Attributed(rows)) => rows,
        other => panic!("expected attributed adjustments, got {other:?}"),
    }
}

#[test]
fn run_produces_every_table_in_step_order() {
    let results = run_settlement(&readings(), &intervals(), &SettlementConfig::default()).unwrap();
    let names: Vec<&str> = results.names().collect();
    assert_eq!(names.len(), 23);
    assert_eq!(names[0], "net_exchange_per_neighbour");
    assert_eq!(names[8], "combined_system_correction");
    assert_eq!(names[12], "hourly_production_ga_es");
    assert_eq!(names[20], "flex_settled_consumption_ga");
    assert_eq!(names[22], "residual_ga");
}

#[test]
fn grid_loss_and_system_correction_land_on_designated_suppliers() {
    let results = run_settlement(&readings(), &intervals(), &SettlementConfig::default()).unwrap();

    // hour 0: 10 + 5 - (3 + 2) = 10; hour 1: 1 + 1 - (2 + 1) = -1
    let loss = grid_loss(results.get("grid_loss"));
    assert_eq!(loss.len(), 2);
    assert_eq!(loss[0].grid_loss, qty(10));
    assert_eq!(loss[1].grid_loss, qty(-1));

    let flex = aggregates(results.get("flex_consumption_with_grid_loss"));
    assert_eq!(flex[0].sum_quantity, qty(12));
    assert_eq!(flex[0].quality, Quality::Estimated);
    assert_eq!(flex[1].sum_quantity, qty(1));

    let production = aggregates(results.get("hourly_production_with_system_correction_and_grid_loss"));
    assert_eq!(production[0].sum_quantity, qty(5));
    assert_eq!(production[1].sum_quantity, qty(2));

    let combined = attributed(results.get("combined_system_correction"));
    assert!(combined.iter().all(|row| row.party.as_deref() == Some("ES1")));
}

#[test]
fn grid_area_totals_and_residual() {
    let results = run_settlement(&readings(), &intervals(), &SettlementConfig::default()).unwrap();

    let total = aggregates(results.get("total_consumption"));
    assert_eq!(total[0].sum_quantity, qty(15));
    assert_eq!(total[1].sum_quantity, qty(3));

    // After apportionment the residual nets to zero in both hours
    let residual = grid_loss(results.get("residual_ga"));
    assert!(residual.iter().all(|row| row.grid_loss == Decimal::ZERO));
}

#[test]
fn not_yet_connected_production_is_left_out() {
    let results = run_settlement(&readings(), &intervals(), &SettlementConfig::default()).unwrap();
    let per_brp = aggregates(results.get("hourly_production_ga_brp"));
    assert!(per_brp.iter().all(|row| row.responsible_party.as_deref() == Some("BRP1")));
}

#[test]
fn sequential_and_parallel_runs_agree() {
    let parallel = run_settlement(&readings(), &intervals(), &SettlementConfig::default()).unwrap();
    let sequential = run_settlement(
        &readings(),
        &intervals(),
        &SettlementConfig {
            parallel: false,
            ..SettlementConfig::default()
        },
    )
    .unwrap();
    assert_eq!(parallel, sequential);
}

#[test]
fn overlapping_master_data_aborts_the_run() {
    let mut overlapping = intervals();
    overlapping.push(ResponsibilityInterval {
        party: "ES9".into(),
        grid_area: "500".into(),
        flag: ResponsibilityFlag::GridLoss,
        from_date: Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap(),
        to_date: None,
    });
    let err = run_settlement(&readings(), &overlapping, &SettlementConfig::default()).unwrap_err();
    assert!(matches!(err, SettleError::ResponsibilityOverlap { .. }));
}

#[test]
fn empty_input_yields_empty_tables() {
    let results = run_settlement(&[], &[], &SettlementConfig::default()).unwrap();
    assert_eq!(results.len(), 23);
    assert_eq!(results.total_rows(), 0);
}
