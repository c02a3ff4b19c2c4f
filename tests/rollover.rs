//! Rollover scheduling and execution (§4.9), covering the lookahead window
//! gate and the close-and-reopen lifecycle for a single-leg futures
//! position (Gold Mini).

mod common;

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;

use common::{build_harness_at, open_gold_futures_position, open_silver_futures_position};
use trend_portfolio_engine::application::scheduler::rollover::{RolloverExecutor, RolloverScanner};
use trend_portfolio_engine::config::RolloverEnvConfig;
use trend_portfolio_engine::domain::instrument::InstrumentId;
use trend_portfolio_engine::domain::position::{PositionStatus, RolloverStatus};

fn rollover_config() -> RolloverEnvConfig {
    RolloverEnvConfig {
        enabled: true,
        bank_nifty_days: 2,
        gold_mini_days: 8,
        silver_mini_days: 8,
        copper_days: 8,
        max_retries: 2,
        retry_interval_sec: 0,
        strike_interval: 100,
        prefer_1000s: true,
    }
}

#[tokio::test]
async fn scanner_skips_positions_outside_the_lookahead_window() {
    // Gold Mini's lookahead is 8 days; a contract expiring 2026-08-31 is 14
    // days out from 2026-08-17, so nothing should be marked pending.
    let at = Utc.with_ymd_and_hms(2026, 8, 17, 10, 0, 0).unwrap();
    let harness = build_harness_at(dec!(5_000_000), dec!(60000), at);
    harness
        .position_repo
        .insert(&open_gold_futures_position("2026-08", dec!(60000), dec!(59000)))
        .await
        .unwrap();

    let scanner = RolloverScanner::new(harness.engine.clone(), rollover_config());
    let due = scanner.scan().await.unwrap();
    assert!(due.is_empty());
}

#[tokio::test]
async fn scanner_flags_positions_inside_the_lookahead_window() {
    // 2026-08-25 is 6 days from the 2026-08-31 expiry, inside the 8-day window.
    let at = Utc.with_ymd_and_hms(2026, 8, 25, 10, 0, 0).unwrap();
    let harness = build_harness_at(dec!(5_000_000), dec!(60000), at);
    let position = open_gold_futures_position("2026-08", dec!(60000), dec!(59000));
    let position_id = position.position_id.clone();
    harness.position_repo.insert(&position).await.unwrap();

    let scanner = RolloverScanner::new(harness.engine.clone(), rollover_config());
    let due = scanner.scan().await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].position_id, position_id);

    let positions = harness.position_repo.positions.lock().unwrap();
    assert_eq!(positions.get(&position_id).unwrap().rollover_status, RolloverStatus::Pending);
}

#[tokio::test]
async fn rollover_executor_closes_old_contract_and_opens_next_month() {
    let at = Utc.with_ymd_and_hms(2026, 8, 25, 10, 0, 0).unwrap();
    // Fixed quote equal to entry price keeps the exit/re-entry fill flat, so
    // the old leg's realized P&L is exactly zero and the new leg's stop is a
    // clean function of the inherited ATR.
    let harness = build_harness_at(dec!(5_000_000), dec!(60000), at);
    let old = open_gold_futures_position("2026-08", dec!(60000), dec!(59000));
    let old_id = old.position_id.clone();
    harness.position_repo.insert(&old).await.unwrap();

    let executor = RolloverExecutor::new(harness.engine.clone(), rollover_config());
    executor.execute(old).await.unwrap();

    // `position_id` is deterministic per instrument+layer, so the close and
    // the re-entry both land on the same row; only its final, rolled-forward
    // state survives under that id. The exit's realized P&L is booked
    // separately into the portfolio ledger and the capital transaction log.
    let rolled_id = trend_portfolio_engine::domain::position::Position::make_id(
        InstrumentId::GoldMini,
        trend_portfolio_engine::domain::signal::Layer::BASE,
    );
    assert_eq!(rolled_id, old_id);

    let portfolio = harness.portfolio_repo.load().await.unwrap();
    assert_eq!(portfolio.closed_equity, dec!(5_000_000));
    assert_eq!(harness.capital_repo.txs.lock().unwrap().len(), 1);

    let positions = harness.position_repo.positions.lock().unwrap();
    let rolled = positions.get(&rolled_id).expect("rolled position reuses the instrument/layer id");
    assert_eq!(rolled.rollover_status, RolloverStatus::Rolled);
    assert_eq!(rolled.rollover_count, 1);
    assert_eq!(rolled.status, PositionStatus::Open);
    assert_eq!(rolled.entry_price, dec!(60000));
    assert_eq!(rolled.current_stop, dec!(59760));
    match &rolled.legs {
        trend_portfolio_engine::domain::position::ExecutionLegs::Futures { contract_month, .. } => {
            assert_eq!(contract_month, "2026-09");
        }
        _ => panic!("rolled Gold Mini position should keep a single futures leg"),
    }
}

#[tokio::test]
async fn rollover_executor_respects_silver_minis_fixed_month_cycle() {
    // Silver Mini only trades Feb/Apr/Jun/Aug/Nov; rolling out of August
    // must land on November, not the next calendar month (September).
    let at = Utc.with_ymd_and_hms(2026, 8, 25, 10, 0, 0).unwrap();
    let harness = build_harness_at(dec!(5_000_000), dec!(80000), at);
    let old = open_silver_futures_position("2026-08", dec!(80000), dec!(79000));
    harness.position_repo.insert(&old).await.unwrap();

    let executor = RolloverExecutor::new(harness.engine.clone(), rollover_config());
    executor.execute(old).await.unwrap();

    let rolled_id = trend_portfolio_engine::domain::position::Position::make_id(
        InstrumentId::SilverMini,
        trend_portfolio_engine::domain::signal::Layer::BASE,
    );
    let positions = harness.position_repo.positions.lock().unwrap();
    let rolled = positions.get(&rolled_id).expect("rolled silver position reuses the instrument/layer id");
    match &rolled.legs {
        trend_portfolio_engine::domain::position::ExecutionLegs::Futures { contract_month, .. } => {
            assert_eq!(contract_month, "2026-11");
        }
        _ => panic!("rolled Silver Mini position should keep a single futures leg"),
    }
}
