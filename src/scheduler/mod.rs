//! Background sweeps: reminder dispatch, recurring renewal and payment
//! reminders. Each sweep is guarded by its own lock; a tick that finds the
//! previous run still going is skipped rather than queued.

pub mod payments;
pub mod recurring;
pub mod reminders;

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::SchedulerConfig;
use crate::database::Store;
use crate::error::ServiceError;
use crate::notifications::EmailSender;

/// Outcome of one sweep run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub processed: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn examined(count: usize) -> Self {
        Self { examined: count, ..Default::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SweepKind {
    Reminders,
    Recurring,
    Payments,
}

impl SweepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepKind::Reminders => "reminders",
            SweepKind::Recurring => "recurring",
            SweepKind::Payments => "payments",
        }
    }
}

pub struct Sweeper {
    store: Arc<dyn Store>,
    email: Arc<dyn EmailSender>,
    reminders: Mutex<()>,
    recurring: Mutex<()>,
    payments: Mutex<()>,
}

impl Sweeper {
    pub fn new(store: Arc<dyn Store>, email: Arc<dyn EmailSender>) -> Self {
        Self {
            store,
            email,
            reminders: Mutex::new(()),
            recurring: Mutex::new(()),
            payments: Mutex::new(()),
        }
    }

    fn guard(&self, kind: SweepKind) -> &Mutex<()> {
        match kind {
            SweepKind::Reminders => &self.reminders,
            SweepKind::Recurring => &self.recurring,
            SweepKind::Payments => &self.payments,
        }
    }

    /// Runs one sweep now. `Ok(None)` means a run of the same kind was
    /// already in progress.
    pub async fn run(&self, kind: SweepKind) -> Result<Option<SweepReport>, ServiceError> {
        let Ok(_running) = self.guard(kind).try_lock() else {
            tracing::warn!(sweep = kind.as_str(), "Previous sweep still running, skipping");
            return Ok(None);
        };

        let now = Utc::now();
        let report = match kind {
            SweepKind::Reminders => reminders::sweep(&self.store, &self.email, now).await?,
            SweepKind::Recurring => recurring::sweep(&self.store, now).await?,
            SweepKind::Payments => payments::sweep(&self.store, &self.email, now).await?,
        };

        tracing::info!(
            sweep = kind.as_str(),
            examined = report.examined,
            processed = report.processed,
            failed = report.failed,
            "Sweep finished"
        );
        Ok(Some(report))
    }

    /// Starts one interval loop per sweep. Returns no handles when disabled.
    pub fn spawn(self: Arc<Self>, settings: &SchedulerConfig) -> Vec<JoinHandle<()>> {
        if !settings.enabled {
            tracing::info!("Background sweeps disabled");
            return Vec::new();
        }

        [
            (SweepKind::Reminders, settings.reminder_interval_secs),
            (SweepKind::Recurring, settings.recurring_interval_secs),
            (SweepKind::Payments, settings.payment_reminder_interval_secs),
        ]
        .into_iter()
        .map(|(kind, secs)| {
            let sweeper = self.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if let Err(e) = sweeper.run(kind).await {
                        tracing::error!(sweep = kind.as_str(), "Sweep failed: {}", e);
                    }
                }
            })
        })
        .collect()
    }
}
