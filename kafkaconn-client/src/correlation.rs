//! Correlation ID generation.
//!
//! A single task owns the counter and hands out one ID per request it
//! receives, so concurrent callers never see the same value. IDs start at 1
//! and wrap back to 1 before reaching `i32::MAX`.

use tokio::sync::{mpsc, oneshot, watch};

/// Queue depth between callers and the generator task.
const REQUEST_QUEUE_CAPACITY: usize = 32;

/// Handle to the correlation ID generator task.
#[derive(Debug, Clone)]
pub(crate) struct CorrelationIds {
    requests: mpsc::Sender<oneshot::Sender<i32>>,
}

impl CorrelationIds {
    /// Spawns the generator. It stops once `stop` reads `true` or its sender
    /// is dropped.
    pub(crate) fn spawn(stop: watch::Receiver<bool>) -> Self {
        Self::starting_at(1, stop)
    }

    pub(crate) fn starting_at(first: i32, stop: watch::Receiver<bool>) -> Self {
        let (requests, rx) = mpsc::channel(REQUEST_QUEUE_CAPACITY);
        tokio::spawn(generate(first, rx, stop));
        Self { requests }
    }

    /// Returns the next ID, or `None` once the generator has stopped.
    pub(crate) async fn next(&self) -> Option<i32> {
        let (tx, rx) = oneshot::channel();
        self.requests.send(tx).await.ok()?;
        rx.await.ok()
    }
}

async fn generate(
    mut next: i32,
    mut requests: mpsc::Receiver<oneshot::Sender<i32>>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let request = tokio::select! {
            biased;
            _ = stop.wait_for(|stopped| *stopped) => None,
            request = requests.recv() => request,
        };
        let Some(reply) = request else {
            break;
        };
        // A caller that gave up still consumes its ID.
        let _ = reply.send(next);
        next = advance(next);
    }
    tracing::debug!("correlation id generator stopped");
    // Dropping `requests` here wakes queued callers with `None`.
}

/// Returns the ID following `id`, wrapping to 1 before `i32::MAX`.
pub(crate) fn advance(id: i32) -> i32 {
    if id >= i32::MAX - 1 {
        1
    } else {
        id + 1
    }
}
