//! Cancellation and timeout control for one run.

use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::stream::{AgentEventStream, InternalEvent};

/// Wraps the event stream of one run with its cancellation token and deadline.
///
/// The deadline is fixed when the control is created, so the timeout covers
/// the whole run rather than the gap between two events.
#[derive(Debug, Clone)]
pub struct RunControl {
    cancel: CancellationToken,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl RunControl {
    pub fn new(cancel: CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            cancel,
            timeout,
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    /// The token shared with the agent runner
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Await a call into the runner under the same cancellation and deadline
    /// as the event stream.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            _ = wait_for(self.deadline) => Err(Error::Timeout(self.timeout.unwrap_or_default())),
            output = fut => Ok(output),
        }
    }

    /// Wait for the next event.
    ///
    /// Returns `None` when the stream ends, `Some(Err(Error::Cancelled))` or
    /// `Some(Err(Error::Timeout(_)))` when the run is interrupted, and passes
    /// upstream errors through.
    pub async fn next(&self, events: &mut AgentEventStream) -> Option<Result<InternalEvent>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Some(Err(Error::Cancelled)),
            _ = wait_for(self.deadline) => {
                Some(Err(Error::Timeout(self.timeout.unwrap_or_default())))
            }
            item = events.next() => item,
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
