//! Bisection Engine (spec §4.4): recursively compares two table
//! segments, bisecting mismatching ranges until they are small or narrow
//! enough to download and merge directly.

use std::cmp::Ordering as CmpOrdering;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use rdiff_common::constants::{
    DEFAULT_BISECTION_FACTOR, DEFAULT_BISECTION_THRESHOLD, DEFAULT_MAX_THREADPOOL_SIZE,
};
use rdiff_common::err::{CResult, ReError};
use rdiff_common::types::{DiffRecord, Sign};
use rdiff_segment::TableSegment;

use crate::scheduler::Scheduler;
use crate::stats::DiffStats;

/// Configuration for a single `diff_tables` run. Immutable once built —
/// the engine itself carries no mutable state beyond what each run
/// allocates (the channel, the scheduler, the stats object).
#[derive(Debug, Clone, Copy)]
pub struct TableDiffer {
    pub bisection_factor: usize,
    pub bisection_threshold: u64,
    pub max_threadpool_size: usize,
}

impl Default for TableDiffer {
    fn default() -> Self {
        TableDiffer {
            bisection_factor: DEFAULT_BISECTION_FACTOR,
            bisection_threshold: DEFAULT_BISECTION_THRESHOLD,
            max_threadpool_size: DEFAULT_MAX_THREADPOOL_SIZE,
        }
    }
}

impl TableDiffer {
    pub fn new(bisection_factor: usize, bisection_threshold: u64, max_threadpool_size: usize) -> CResult<Self> {
        if bisection_factor < 2 {
            return Err(ReError::ValueError("bisection_factor must be >= 2".into()));
        }
        if bisection_threshold < bisection_factor as u64 {
            return Err(ReError::ValueError(
                "bisection_threshold must be >= bisection_factor".into(),
            ));
        }
        Ok(TableDiffer {
            bisection_factor,
            bisection_threshold,
            max_threadpool_size,
        })
    }

    /// Returns a lazy stream of diff records plus the stats object that
    /// fills in as the stream is consumed. Dropping the stream before
    /// exhausting it cancels the producer task and abandons any
    /// in-flight sub-segment futures.
    pub fn diff_tables(&self, a: TableSegment, b: TableSegment) -> (ReceiverStream<CResult<DiffRecord>>, Arc<DiffStats>) {
        let (tx, rx) = mpsc::channel(self.bisection_factor.max(1));
        let stats = Arc::new(DiffStats::new());
        let scheduler = Arc::new(Scheduler::new(self.max_threadpool_size));
        let config = *self;
        let stats_for_task = Arc::clone(&stats);

        tokio::spawn(async move {
            if let Err(e) = run(config, a, b, tx.clone(), scheduler, stats_for_task).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        (ReceiverStream::new(rx), stats)
    }
}

async fn run(
    config: TableDiffer,
    a: TableSegment,
    b: TableSegment,
    tx: mpsc::Sender<CResult<DiffRecord>>,
    scheduler: Arc<Scheduler>,
    stats: Arc<DiffStats>,
) -> CResult<()> {
    let (a, b) = discover_bounds(a, b).await?;
    let (a, b) = tokio::try_join!(a.with_schema(), b.with_schema())?;

    let (a_counts, b_counts) = tokio::try_join!(a.count_and_checksum(), b.count_and_checksum())?;
    stats.set_top_level_counts(a_counts.0, b_counts.0);

    recurse(&config, a, b, a_counts, b_counts, &tx, &scheduler, &stats).await
}

/// If either segment is missing key bounds, issues `MIN`/`MAX` on both
/// sides in parallel and takes the union, per "Bound discovery".
async fn discover_bounds(a: TableSegment, b: TableSegment) -> CResult<(TableSegment, TableSegment)> {
    if a.min_key().is_some() && a.max_key().is_some() && b.min_key().is_some() && b.max_key().is_some() {
        return Ok((a, b));
    }
    let (bounds_a, bounds_b) = tokio::try_join!(a.discover_key_bounds(), b.discover_key_bounds())?;
    let (lo, hi) = match (bounds_a, bounds_b) {
        (None, None) => (0, 0),
        (Some((lo, hi)), None) | (None, Some((lo, hi))) => (lo, hi + 1),
        (Some((lo_a, hi_a)), Some((lo_b, hi_b))) => (lo_a.min(lo_b), hi_a.max(hi_b) + 1),
    };
    Ok((a.new_key_bounds(lo, hi)?, b.new_key_bounds(lo, hi)?))
}

type CountChecksum = (u64, Option<i128>);

/// Boxed because this is a recursive `async fn`: the compiler can't size
/// a future that contains itself.
fn recurse<'a>(
    config: &'a TableDiffer,
    a: TableSegment,
    b: TableSegment,
    a_counts: CountChecksum,
    b_counts: CountChecksum,
    tx: &'a mpsc::Sender<CResult<DiffRecord>>,
    scheduler: &'a Arc<Scheduler>,
    stats: &'a Arc<DiffStats>,
) -> Pin<Box<dyn Future<Output = CResult<()>> + Send + 'a>> {
    Box::pin(async move {
        let (count_a, checksum_a) = a_counts;
        let (count_b, checksum_b) = b_counts;

        // Null-checksum handling: both sides empty, the sub-segment matches.
        if count_a == 0 && count_b == 0 {
            return Ok(());
        }

        if count_a == count_b && checksum_a.is_some() && checksum_a == checksum_b {
            return Ok(());
        }

        let width = match (a.min_key(), a.max_key()) {
            (Some(lo), Some(hi)) => hi - lo,
            _ => 0,
        };
        let small_enough = count_a.max(count_b) <= config.bisection_threshold;
        let narrow_enough = width <= config.bisection_factor as i128;

        if small_enough || narrow_enough || count_a == 0 || count_b == 0 {
            stats.inc_segments_downloaded();
            return download_and_emit(&a, &b, tx, stats).await;
        }

        stats.inc_segments_checksummed();
        let sub_segment_pairs = bisect(&a, &b, config.bisection_factor)?;

        let results = scheduler
            .run_batch(sub_segment_pairs, |(sub_a, sub_b)| async move {
                let (cs_a, cs_b) = tokio::try_join!(sub_a.count_and_checksum(), sub_b.count_and_checksum())?;
                Ok((sub_a, sub_b, cs_a, cs_b))
            })
            .await?;

        for (sub_a, sub_b, cs_a, cs_b) in results {
            recurse(config, sub_a, sub_b, cs_a, cs_b, tx, scheduler, stats).await?;
        }
        Ok(())
    })
}

/// Partitions `[a.min_key, a.max_key)` into `bisection_factor` sub-ranges
/// and pairs `a`'s and `b`'s sub-ranges sharing the same bounds.
fn bisect(a: &TableSegment, b: &TableSegment, bisection_factor: usize) -> CResult<Vec<(TableSegment, TableSegment)>> {
    let lo = a
        .min_key()
        .ok_or_else(|| ReError::ValueError("segment has no min_key bound to bisect".into()))?;
    let hi = a
        .max_key()
        .ok_or_else(|| ReError::ValueError("segment has no max_key bound to bisect".into()))?;
    let checkpoints = a.choose_checkpoints(bisection_factor)?;

    let mut edges = Vec::with_capacity(checkpoints.len() + 2);
    edges.push(lo);
    edges.extend(checkpoints);
    edges.push(hi);

    edges
        .windows(2)
        .map(|w| Ok((a.new_key_bounds(w[0], w[1])?, b.new_key_bounds(w[0], w[1])?)))
        .collect()
}

/// Downloads both sides in key order (each row already normalized by
/// `download_rows`) and stream-merges them, emitting replacement records
/// for keys that differ or exist on only one side. Row comparison is on
/// normalized text, so the same logical value from two different engines
/// never shows up as a false diff.
async fn download_and_emit(
    a: &TableSegment,
    b: &TableSegment,
    tx: &mpsc::Sender<CResult<DiffRecord>>,
    stats: &Arc<DiffStats>,
) -> CResult<()> {
    let (rows_a, rows_b) = tokio::try_join!(a.download_rows(), b.download_rows())?;
    stats.add_rows_downloaded(rows_a.len() as u64 + rows_b.len() as u64);

    let mut ia = rows_a.into_iter().peekable();
    let mut ib = rows_b.into_iter().peekable();

    loop {
        let step = match (ia.peek(), ib.peek()) {
            (None, None) => break,
            (Some(_), None) => CmpOrdering::Less,
            (None, Some(_)) => CmpOrdering::Greater,
            (Some((ka, _)), Some((kb, _))) => ka.cmp(kb),
        };

        match step {
            CmpOrdering::Less => {
                let (_, row) = ia.next().expect("peeked Some");
                if send(tx, Sign::Minus, row).await.is_err() {
                    return Ok(());
                }
            }
            CmpOrdering::Greater => {
                let (_, row) = ib.next().expect("peeked Some");
                if send(tx, Sign::Plus, row).await.is_err() {
                    return Ok(());
                }
            }
            CmpOrdering::Equal => {
                let (_, row_a) = ia.next().expect("peeked Some");
                let (_, row_b) = ib.next().expect("peeked Some");
                if row_a != row_b {
                    if send(tx, Sign::Minus, row_a).await.is_err() {
                        return Ok(());
                    }
                    if send(tx, Sign::Plus, row_b).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    Ok(())
}

async fn send(tx: &mpsc::Sender<CResult<DiffRecord>>, sign: Sign, row: Vec<String>) -> Result<(), ()> {
    tx.send(Ok(DiffRecord::new(sign, row))).await.map_err(|_| {
        debug!("diff record receiver dropped; abandoning producer");
    })
}
