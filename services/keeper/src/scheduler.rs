//! Scheduler: fires the purchase pipeline on a fixed cadence, never
//! overlapping two ticks.
//!
//! Each tick is awaited inline before the timer is polled again, so a slow
//! tick cannot run concurrently with the next one. Firings missed while a
//! tick was running are skipped, not queued.

use std::{
    future::Future,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::{error::KeeperError, report::RunReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    pub interval_secs: u64,
    /// Fire on wall-clock multiples of the interval (`:00`, `:15`, ...),
    /// like a cron expression, instead of counting from start-up.
    pub align_to_wall_clock: bool,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            align_to_wall_clock: true,
        }
    }
}

impl Schedule {
    pub fn every(interval_secs: u64) -> Self {
        Self {
            interval_secs,
            align_to_wall_clock: false,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// Delay before the first firing when started at `now`.
    pub fn first_delay(&self, now: SystemTime) -> Duration {
        if !self.align_to_wall_clock {
            return Duration::ZERO;
        }
        let period = self.period();
        let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();
        let into_period = Duration::from_nanos(
            (since_epoch.as_nanos() % period.as_nanos()) as u64,
        );
        if into_period.is_zero() {
            Duration::ZERO
        } else {
            period - into_period
        }
    }
}

/// One execution of the purchase pipeline.
#[async_trait]
pub trait TickRunner: Send + Sync {
    async fn run_tick(&self, tick: u64) -> Result<RunReport, KeeperError>;
}

pub struct Scheduler<R> {
    runner: R,
    schedule: Schedule,
}

impl<R: TickRunner> Scheduler<R> {
    pub fn new(runner: R, schedule: Schedule) -> Self {
        Self { runner, schedule }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Runs ticks until `shutdown` resolves and returns how many started.
    ///
    /// Shutdown mid-tick stops awaiting the tick; transactions already
    /// broadcast are not rolled back.
    pub async fn run_until<F>(&self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        let period = self.schedule.period();
        let start = Instant::now() + self.schedule.first_delay(SystemTime::now());
        let mut timer = tokio::time::interval_at(start, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut tick = 0u64;
        let mut last_finished: Option<Instant> = None;
        loop {
            let fired = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, scheduler stopping");
                    break;
                }
                fired = timer.tick() => fired,
            };

            // The timer hands back a firing that came due while the previous
            // tick was still running; drop it and wait for the next one.
            if last_finished.is_some_and(|finished| fired < finished) {
                warn!(
                    tick,
                    late_ms = fired.elapsed().as_millis() as u64,
                    "Previous tick overran the schedule; skipping this firing"
                );
                continue;
            }

            tick += 1;
            tokio::select! {
                _ = &mut shutdown => {
                    warn!(
                        tick,
                        "Shutdown during tick; transactions already sent may still be included"
                    );
                    break;
                }
                outcome = self.runner.run_tick(tick) => match outcome {
                    Ok(report) if report.abnormal() > 0 => warn!(tick, "{}", report),
                    Ok(report) => info!(tick, "{}", report),
                    Err(e) => error!(tick, "Tick aborted: {}", e),
                },
            }
            last_finished = Some(Instant::now());
        }
        tick
    }
}
