//! Background side effects of donation changes.
//!
//! Handlers enqueue and return; the worker appends to the monthly spreadsheet and
//! broadcasts the change. Failures here are logged and never reach the request.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::db::models::DonationRecord;
use crate::export::MonthlyLog;
use crate::notify::ChangeNotifier;

pub const SIDE_EFFECT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum SideEffect {
    Created(DonationRecord),
    Deleted(i64),
}

/// Sending half, cheap to clone into application state.
#[derive(Clone)]
pub struct SideEffects {
    tx: mpsc::Sender<SideEffect>,
}

impl SideEffects {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SideEffect>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Never waits: a full or closed queue drops the job with a warning.
    pub fn enqueue(&self, effect: SideEffect) {
        if let Err(e) = self.tx.try_send(effect) {
            tracing::warn!("Dropping donation side effect: {}", e);
        }
    }
}

pub struct SideEffectWorker {
    log: MonthlyLog,
    notifier: Arc<dyn ChangeNotifier>,
}

impl SideEffectWorker {
    pub fn new(log: MonthlyLog, notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self { log, notifier }
    }

    /// Runs until every sender is dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<SideEffect>) {
        tracing::info!("Donation side-effect worker started");

        while let Some(effect) = rx.recv().await {
            match effect {
                SideEffect::Created(record) => {
                    let log = self.log.clone();
                    let id = record.id;
                    match tokio::task::spawn_blocking(move || log.append(&record)).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => {
                            tracing::error!(donation_id = id, "Failed to log donation to spreadsheet: {:#}", e)
                        }
                        Err(e) => tracing::error!(donation_id = id, "Spreadsheet task panicked: {}", e),
                    }
                }
                SideEffect::Deleted(id) => {
                    tracing::debug!(donation_id = id, "Donation removed");
                }
            }
            self.notifier.notify_changed().await;
        }

        tracing::info!("Side-effect channel closed, worker stopping");
    }
}
