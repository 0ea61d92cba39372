// src/services/award.rs

//! Background delivery of point awards.
//!
//! Submissions only enqueue; a single worker task applies each award to the
//! point ledger with retries. Awards are keyed by the attempt that earned
//! them, so redelivering one never pays twice.

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    config::POINTS_PER_CORRECT_ANSWER,
    store::{AttemptLedger, PointLedger, StoreResult},
    utils::retry::{RetryConfig, retry_async_with_config},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointAward {
    pub attempt_id: i64,
    pub user_id: i64,
    pub points: i64,
}

/// Sending half handed to request handlers. Cheap to clone.
#[derive(Clone)]
pub struct AwardQueue {
    tx: mpsc::UnboundedSender<PointAward>,
}

impl AwardQueue {
    /// Never blocks; the caller's response does not wait on the ledger.
    pub fn enqueue(&self, award: PointAward) {
        if let Err(mpsc::error::SendError(lost)) = self.tx.send(award) {
            tracing::error!(
                attempt_id = lost.attempt_id,
                user_id = lost.user_id,
                points = lost.points,
                "Point award worker is gone, award dropped"
            );
        }
    }
}

pub struct AwardWorker {
    handle: JoinHandle<()>,
}

impl AwardWorker {
    /// Waits until every queued award has been processed. Completes once
    /// all `AwardQueue` clones have been dropped.
    pub async fn shutdown(self) {
        if let Err(e) = self.handle.await {
            tracing::error!("Point award worker panicked: {:?}", e);
        }
    }
}

pub fn spawn(ledger: Arc<dyn PointLedger>, retry: RetryConfig) -> (AwardQueue, AwardWorker) {
    let (tx, mut rx) = mpsc::unbounded_channel::<PointAward>();

    let handle = tokio::spawn(async move {
        while let Some(award) = rx.recv().await {
            apply(ledger.as_ref(), &retry, award).await;
        }
        tracing::info!("Point award worker drained");
    });

    (AwardQueue { tx }, AwardWorker { handle })
}

/// Re-enqueues every correct submission that has no award recorded, e.g.
/// awards that ran out of retries or were still queued when the previous
/// process stopped. Already paid attempts are skipped by the ledger, so
/// running this more than once is harmless. Returns the number enqueued.
pub async fn redeliver_unpaid(attempts: &dyn AttemptLedger, queue: &AwardQueue) -> StoreResult<usize> {
    let unpaid = attempts.unawarded_correct().await?;

    for attempt in &unpaid {
        queue.enqueue(PointAward {
            attempt_id: attempt.id,
            user_id: attempt.user_id,
            points: POINTS_PER_CORRECT_ANSWER,
        });
    }

    if !unpaid.is_empty() {
        tracing::info!(count = unpaid.len(), "Re-enqueued unpaid point awards");
    }

    Ok(unpaid.len())
}

async fn apply(ledger: &dyn PointLedger, retry: &RetryConfig, award: PointAward) {
    let result = retry_async_with_config(retry, || {
        ledger.award(award.attempt_id, award.user_id, award.points)
    })
    .await;

    match result {
        Ok(true) => tracing::info!(
            attempt_id = award.attempt_id,
            user_id = award.user_id,
            points = award.points,
            "Points awarded"
        ),
        Ok(false) => tracing::debug!(attempt_id = award.attempt_id, "Points already awarded for attempt"),
        Err(e) => tracing::error!(
            attempt_id = award.attempt_id,
            user_id = award.user_id,
            points = award.points,
            error = %e,
            "Giving up on point award"
        ),
    }
}
