//! Per-thread connection pool for adapters whose client libraries forbid
//! cross-thread connection sharing (spec §4.6, §9 "Per-engine connection
//! affinity"). Each worker is a dedicated OS thread owning exactly one
//! connection, created lazily on its first job; if creation fails, every
//! subsequent job on that worker gets the same error back.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::Arc;
use std::thread;

use rdiff_common::err::{CResult, ReError};

enum ConnSlot<C> {
    Uninitialized,
    Ready(C),
    Failed(String),
}

type Job<C> = Box<dyn FnOnce(&mut ConnSlot<C>) + Send>;

/// A bounded pool of `size` worker threads, each lazily owning one
/// connection of type `C` built by `init`.
pub struct PerThreadConnectionPool<C> {
    senders: Vec<SyncSender<Job<C>>>,
    next: AtomicUsize,
}

impl<C: Send + 'static> PerThreadConnectionPool<C> {
    pub fn new<F>(size: usize, init: F) -> Self
    where
        F: Fn() -> CResult<C> + Send + Sync + 'static,
    {
        let init: Arc<dyn Fn() -> CResult<C> + Send + Sync> = Arc::new(init);
        let senders = (0..size.max(1))
            .map(|_| {
                let (tx, rx) = sync_channel::<Job<C>>(64);
                let init = init.clone();
                thread::spawn(move || {
                    let mut slot = ConnSlot::Uninitialized;
                    for job in rx {
                        if matches!(slot, ConnSlot::Uninitialized) {
                            slot = match init() {
                                Ok(c) => ConnSlot::Ready(c),
                                Err(e) => ConnSlot::Failed(e.to_string()),
                            };
                        }
                        job(&mut slot);
                    }
                });
                tx
            })
            .collect();
        PerThreadConnectionPool {
            senders,
            next: AtomicUsize::new(0),
        }
    }

    /// Runs `f` against the next worker's dedicated connection, in
    /// round-robin order. Blocks the calling thread until the job
    /// completes; callers driving this from an async runtime should wrap
    /// the call in `spawn_blocking`.
    pub fn execute<F, R>(&self, f: F) -> CResult<R>
    where
        F: FnOnce(&mut C) -> CResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        let (result_tx, result_rx) = std::sync::mpsc::channel();
        let job: Job<C> = Box::new(move |slot| {
            let result = match slot {
                ConnSlot::Ready(c) => f(c),
                ConnSlot::Failed(msg) => Err(ReError::ConnectError(msg.clone())),
                ConnSlot::Uninitialized => {
                    unreachable!("worker initializes the connection before running any job")
                }
            };
            let _ = result_tx.send(result);
        });
        self.senders[idx]
            .send(job)
            .map_err(|_| ReError::ConnectError("worker thread is gone".into()))?;
        result_rx
            .recv()
            .map_err(|_| ReError::ConnectError("worker thread dropped its result".into()))?
    }
}
