//! Concurrency Scheduler (spec §4.5/§5): a bounded worker pool sized by
//! `max_threadpool_size`. Each recursion level submits all of its
//! sub-segment `count_and_checksum` calls as one batch; `run_batch`
//! returns their results in the same order the tasks were submitted in,
//! regardless of completion order, so the caller can consume them in key
//! order deterministically.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::try_join_all;
use tokio::sync::Semaphore;

use rdiff_common::err::CResult;

pub struct Scheduler {
    semaphore: Arc<Semaphore>,
}

impl Scheduler {
    pub fn new(max_threadpool_size: usize) -> Self {
        Scheduler {
            semaphore: Arc::new(Semaphore::new(max_threadpool_size.max(1))),
        }
    }

    /// Runs `f(task)` for every task in `tasks`, at most `max_threadpool_size`
    /// concurrently, returning results in input order. A single failing
    /// task fails the whole batch; sibling results are discarded, matching
    /// "a failed checksum query... sibling tasks' results are discarded".
    pub async fn run_batch<T, R, F, Fut>(&self, tasks: Vec<T>, f: F) -> CResult<Vec<R>>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = CResult<R>>,
    {
        let futures = tasks.into_iter().map(|task| {
            let semaphore = Arc::clone(&self.semaphore);
            let fut = f(task);
            async move {
                let _permit = semaphore.acquire().await.expect("scheduler semaphore is never closed");
                fut.await
            }
        });
        try_join_all(futures).await
    }
}
