//! Supervisor for the connection's background tasks.

use std::future::Future;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use tether_rpc::InvocationError;

type Outcome = (&'static str, Result<(), InvocationError>);

/// A set of named tasks sharing one cancellation token.
///
/// The first task to fail cancels the rest; [`wait`](Self::wait) reports
/// that first error. A task that returns `Ok` leaves the others running.
pub(crate) struct TaskGroup {
    tasks: JoinSet<Outcome>,
    token: CancellationToken,
}

impl TaskGroup {
    /// A group cancelled whenever `parent` is.
    pub(crate) fn new(parent: &CancellationToken) -> Self {
        Self { tasks: JoinSet::new(), token: parent.child_token() }
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub(crate) fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), InvocationError>> + Send + 'static,
    {
        let span = tracing::debug_span!("task", logger = name);
        self.tasks.spawn(
            async move {
                tracing::debug!("[tether] task started");
                (name, task.await)
            }
            .instrument(span),
        );
    }

    /// Wait for every task; return the first error that was not caused by
    /// the group shutting down.
    pub(crate) async fn wait(mut self) -> Result<(), InvocationError> {
        let mut first = None;
        while let Some(joined) = self.tasks.join_next().await {
            let (name, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => ("unknown", Err(std::io::Error::other(format!("task failed: {e}")).into())),
            };
            match result {
                Ok(()) => tracing::debug!(task = name, "[tether] task done"),
                Err(InvocationError::Cancelled) if self.token.is_cancelled() => {
                    tracing::debug!(task = name, "[tether] task cancelled");
                }
                Err(e) => {
                    if first.is_none() {
                        tracing::debug!(task = name, "[tether] task failed: {e}");
                        first = Some(e);
                    } else {
                        tracing::debug!(task = name, "[tether] task failed after shutdown: {e}");
                    }
                    self.token.cancel();
                }
            }
        }
        first.map_or(Ok(()), Err)
    }
}
