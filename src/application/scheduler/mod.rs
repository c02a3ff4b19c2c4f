//! Background scheduler jobs (§4.9): rollover, EOD monitor, heartbeat.
//! Each runs as an independent tokio task driven off the shared `Engine`.

pub mod eod_monitor;
pub mod heartbeat;
pub mod rollover;

use crate::application::engine::Engine;
use eod_monitor::EodMonitor;
use heartbeat::HeartbeatWriter;
use rollover::{RolloverExecutor, RolloverScanner};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::warn;

/// Drives the three scheduled jobs on their own cadences. Rollover and the
/// EOD monitor only act while this instance holds leadership; the heartbeat
/// writer runs on every instance so liveness is visible regardless of who
/// leads.
pub struct Scheduler {
    pub rollover_scanner: RolloverScanner,
    pub rollover_executor: RolloverExecutor,
    pub eod_monitor: EodMonitor,
    pub heartbeat: Arc<HeartbeatWriter>,
    rollover_scan_interval: Duration,
    eod_check_interval: Duration,
    heartbeat_interval: Duration,
}

impl Scheduler {
    pub fn new(
        rollover_scanner: RolloverScanner,
        rollover_executor: RolloverExecutor,
        eod_monitor: EodMonitor,
        heartbeat: Arc<HeartbeatWriter>,
        rollover_scan_interval: Duration,
        eod_check_interval: Duration,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            rollover_scanner,
            rollover_executor,
            eod_monitor,
            heartbeat,
            rollover_scan_interval,
            eod_check_interval,
            heartbeat_interval,
        }
    }

    pub async fn run(self: Arc<Self>, engine: Arc<Engine>) {
        let heartbeat = self.heartbeat.clone();
        tokio::spawn(heartbeat.run_loop(self.heartbeat_interval));

        let rollover_self = self.clone();
        let rollover_engine = engine.clone();
        tokio::spawn(async move {
            let mut ticker = interval(rollover_self.rollover_scan_interval);
            loop {
                ticker.tick().await;
                if !rollover_engine.is_leader.load(std::sync::atomic::Ordering::SeqCst) {
                    continue;
                }
                match rollover_self.rollover_scanner.scan().await {
                    Ok(due) => {
                        for position in due {
                            if let Err(err) = rollover_self.rollover_executor.execute(position).await {
                                warn!(error = %err, "rollover execution failed");
                            }
                        }
                    }
                    Err(err) => warn!(error = %err, "rollover scan failed"),
                }
            }
        });

        let eod_self = self.clone();
        let eod_engine = engine.clone();
        tokio::spawn(async move {
            let mut ticker = interval(eod_self.eod_check_interval);
            loop {
                ticker.tick().await;
                if !eod_engine.is_leader.load(std::sync::atomic::Ordering::SeqCst) {
                    continue;
                }
                if let Err(err) = eod_self.eod_monitor.tick().await {
                    warn!(error = %err, "EOD monitor tick failed");
                }
            }
        });
    }
}
