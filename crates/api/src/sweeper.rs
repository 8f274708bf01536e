//! Background expiry of lapsed needs and offers.
//!
//! Expiry is also evaluated lazily on every read and write, so the sweeper
//! only persists what those checks already report. Each tick catches the
//! open-needs view up and calls `expire_stale` for every need the view
//! marks as due.

use std::sync::Arc;
use std::time::Duration;

use event_store::EventStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::ApiError;
use crate::state::AppState;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub needs_checked: usize,
    pub needs_expired: usize,
    pub offers_expired: usize,
    pub failures: usize,
}

pub struct Sweeper<S: EventStore> {
    state: Arc<AppState<S>>,
    interval: Duration,
}

impl<S: EventStore + Clone + 'static> Sweeper<S> {
    pub fn new(state: Arc<AppState<S>>, interval: Duration) -> Self {
        Self { state, interval }
    }

    /// Runs a single pass. A need that fails to expire is logged and left
    /// for the next tick.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_once(&self) -> Result<SweepReport, ApiError> {
        self.state.refresh().await?;

        let now = self.state.market.ports().clock.now();
        let due = self.state.open_needs.due_for_expiry(now).await;
        let mut report = SweepReport {
            needs_checked: due.len(),
            ..SweepReport::default()
        };

        for need_id in due {
            match self.state.market.negotiation.expire_stale(need_id).await {
                Ok(expiry) => {
                    if expiry.need_expired {
                        report.needs_expired += 1;
                    }
                    report.offers_expired += expiry.expired_offers.len();
                }
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(%need_id, error = %e, "failed to expire need");
                }
            }
        }

        if report.needs_expired > 0 {
            metrics::counter!("sweeper_expired_needs_total").increment(report.needs_expired as u64);
        }
        if report.needs_checked > 0 {
            tracing::info!(
                checked = report.needs_checked,
                needs_expired = report.needs_expired,
                offers_expired = report.offers_expired,
                failures = report.failures,
                "expiry sweep finished"
            );
        }
        Ok(report)
    }

    /// Sweeps every interval until `shutdown` flips to true.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.sweep_once().await {
                            tracing::error!(error = %e, "expiry sweep failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::info!("expiry sweeper stopped");
                            break;
                        }
                    }
                }
            }
        })
    }
}
