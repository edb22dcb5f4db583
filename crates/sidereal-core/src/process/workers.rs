use rayon::ThreadPoolBuilder;

use crate::error::{Result, SiderealError};

/// Run `work(index, count)` once on each of `threads` dedicated threads and
/// wait for all of them.
///
/// A fatal error from any worker is returned in preference to a
/// cancellation.
pub(crate) fn run_workers<F>(threads: usize, work: F) -> Result<()>
where
    F: Fn(usize, usize) -> Result<()> + Sync,
{
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("sidereal-worker-{}", i))
        .build()?;
    let outcomes = pool.broadcast(|ctx| work(ctx.index(), ctx.num_threads()));

    let mut cancelled = false;
    for outcome in outcomes {
        match outcome {
            Ok(()) => {}
            Err(SiderealError::Cancelled) => cancelled = true,
            Err(e) => return Err(e),
        }
    }
    if cancelled {
        Err(SiderealError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn every_worker_runs_once() {
        let calls = AtomicUsize::new(0);
        run_workers(3, |_, count| {
            assert_eq!(count, 3);
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn fatal_error_wins_over_cancellation() {
        let outcome = run_workers(2, |index, _| {
            if index == 0 {
                Err(SiderealError::Cancelled)
            } else {
                Err(SiderealError::MissingReference)
            }
        });
        assert!(matches!(outcome, Err(SiderealError::MissingReference)));
    }
}
