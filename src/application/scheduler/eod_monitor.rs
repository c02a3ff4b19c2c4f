//! EOD monitor (§4.9): in the window starting `monitoring_start_minutes`
//! before market close, evaluates every EOD-enabled open position's stop
//! against the live LTP at `condition_check_seconds` cadence, emitting a
//! synthetic EXIT through the ordinary engine path on a breach.

use crate::application::engine::Engine;
use crate::config::EodEnvConfig;
use crate::domain::signal::{Layer, Signal, SignalKind};
use crate::infrastructure::calendar::MarketCalendar;
use crate::infrastructure::symbol_resolver::SymbolResolver;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

pub struct EodMonitor {
    engine: Arc<Engine>,
    calendar: Arc<MarketCalendar>,
    config: EodEnvConfig,
}

impl EodMonitor {
    pub fn new(engine: Arc<Engine>, calendar: Arc<MarketCalendar>, config: EodEnvConfig) -> Self {
        Self { engine, calendar, config }
    }

    pub fn is_in_window(&self, exchange: crate::domain::instrument::Exchange, at: DateTime<Utc>) -> bool {
        let Some(close) = self.calendar.session_close(exchange, at.date_naive()) else { return false };
        let minutes_to_close = (close - at.time()).num_minutes();
        minutes_to_close >= 0 && minutes_to_close <= self.config.monitoring_start_minutes as i64
    }

    /// One scan cycle: for every EOD-enabled open position whose exchange
    /// is within its monitoring window, fetch the live quote and, on a stop
    /// breach, synthesize and submit an EXIT signal through the engine.
    pub async fn tick(&self) -> anyhow::Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let now = self.engine.clock.now();

        for position in self.engine.position_repo.find_all_open().await? {
            let Some(instrument) = self.engine.instruments.get(&position.instrument) else { continue };
            if !instrument.eod_enabled {
                continue;
            }
            let exchange = SymbolResolver::exchange(instrument.id);
            if !self.is_in_window(exchange, now) {
                continue;
            }

            let symbol = match &position.legs {
                crate::domain::position::ExecutionLegs::Futures { symbol, .. } => symbol.clone(),
                crate::domain::position::ExecutionLegs::Synthetic { buy_ce_symbol, .. } => buy_ce_symbol.clone(),
            };
            let quote = match self.engine.executor.quote(&symbol).await {
                Ok(q) => q.last_price,
                Err(err) => {
                    warn!(position_id = %position.position_id, error = %err, "EOD monitor quote fetch failed");
                    continue;
                }
            };

            if self.engine.check_stop_breach(&position, quote).is_some() {
                info!(position_id = %position.position_id, live_price = %quote, "EOD monitor detected stop breach");
                let signal = synthetic_exit_signal(&position, quote, now);
                if let Err(err) = self.engine.process_signal(signal).await {
                    warn!(position_id = %position.position_id, error = %err, "EOD synthetic EXIT failed");
                }
            }
        }
        Ok(())
    }
}

fn synthetic_exit_signal(position: &crate::domain::position::Position, live_price: rust_decimal::Decimal, now: DateTime<Utc>) -> Signal {
    Signal {
        kind: SignalKind::Exit,
        instrument: position.instrument,
        layer: Some(Layer(position.layer.0)),
        signal_timestamp: now,
        price: live_price,
        stop: position.current_stop,
        suggested_lots: None,
        atr: position.atr_at_entry,
        er: None,
        supertrend: None,
        roc: None,
        reason: Some("STOP_LOSS".to_string()),
        raw: serde_json::json!({ "source": "eod_monitor" }),
    }
}
