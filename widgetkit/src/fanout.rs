//! Bounded-concurrency fan-out for widgets that aggregate many sub-requests.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

pub const DEFAULT_CONCURRENCY: usize = 8;

/// Runs one fetch per identifier with at most `limit` of them in flight.
///
/// Results come back in input order. If any sub-fetch fails the whole call
/// fails and the results that did succeed are dropped. The call only returns
/// once every spawned sub-fetch has finished.
#[derive(Debug, Clone, Copy)]
pub struct BoundedFetcher {
    limit: usize,
}

impl Default for BoundedFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl BoundedFetcher {
    /// A limit of zero is treated as one.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Fetch every id in `ids`.
    ///
    /// Each sub-fetch receives a clone of `cancel`; once it is cancelled,
    /// sub-fetches still waiting for a slot never start and running ones are
    /// abandoned.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::SubFetch`] wrapping one of the sub-fetch
    /// failures (not necessarily the earliest), or [`FetchError::Task`] if a
    /// sub-fetch task panicked.
    pub async fn fetch_all<I, T, F, Fut>(
        &self,
        ids: Vec<I>,
        cancel: &CancellationToken,
        fetch: F,
    ) -> Result<Vec<T>, FetchError>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(I, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let fetch = Arc::new(fetch);
        let gate = Arc::new(Semaphore::new(self.limit));
        let mut tasks = JoinSet::new();

        for (index, id) in ids.into_iter().enumerate() {
            let fetch = Arc::clone(&fetch);
            let gate = Arc::clone(&gate);
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let outcome = run_one(&gate, &cancel, || fetch(id, cancel.clone())).await;
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<T>> = Vec::with_capacity(tasks.len());
        slots.resize_with(tasks.len(), || None);
        let mut first_error: Option<FetchError> = None;

        // drain everything, even after an error has been seen
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(value))) => slots[index] = Some(value),
                Ok((index, Err(err))) => {
                    if first_error.is_none() {
                        first_error = Some(FetchError::SubFetch {
                            index,
                            source: Box::new(err),
                        });
                    }
                }
                Err(join_err) => {
                    if first_error.is_none() {
                        first_error =
                            Some(FetchError::Task(join_err.to_string()));
                    }
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        slots
            .into_iter()
            .collect::<Option<Vec<T>>>()
            .ok_or_else(|| FetchError::Task("sub-fetch result missing".into()))
    }
}

async fn run_one<T, Fut>(
    gate: &Semaphore,
    cancel: &CancellationToken,
    start: impl FnOnce() -> Fut,
) -> Result<T, FetchError>
where
    Fut: Future<Output = Result<T, FetchError>>,
{
    let _permit = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(FetchError::Cancelled),
        permit = gate.acquire() => permit.map_err(|_| FetchError::Cancelled)?,
    };

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(FetchError::Cancelled),
        result = start() => result,
    }
}
