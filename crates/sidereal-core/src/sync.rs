//! Cross-thread coordination for list processes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, SiderealError};

/// Cooperative cancellation flag, checked by workers between items.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SiderealError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug)]
struct BarrierState {
    live: usize,
    arrived: usize,
    generation: u64,
    broken: bool,
}

/// Phase barrier over a shrinking set of worker threads.
///
/// Every live thread calls [`PassBarrier::wait_with`] at the end of a pass;
/// the last one to arrive runs the pass transition before anyone is
/// released. Threads that stop for good call [`PassBarrier::leave`]; an
/// early departure breaks the barrier so nobody waits for a peer that will
/// never arrive.
#[derive(Debug)]
pub struct PassBarrier {
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl PassBarrier {
    pub fn new(threads: usize) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                live: threads,
                arrived: 0,
                generation: 0,
                broken: false,
            }),
            released: Condvar::new(),
        }
    }

    /// Threads that have not left yet.
    pub fn live(&self) -> usize {
        self.state.lock().live
    }

    pub fn is_broken(&self) -> bool {
        self.state.lock().broken
    }

    /// Block until every live thread has arrived.
    ///
    /// The last thread to arrive runs `transition` while the others are
    /// still held, then releases them. Returns `Err(Cancelled)` if the
    /// barrier was broken by an early departure.
    pub fn wait_with<F>(&self, transition: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let mut state = self.state.lock();
        if state.broken {
            return Err(SiderealError::Cancelled);
        }
        state.arrived += 1;
        if state.arrived >= state.live {
            let outcome = transition();
            if outcome.is_err() {
                state.broken = true;
            }
            state.arrived = 0;
            state.generation += 1;
            self.released.notify_all();
            return outcome;
        }

        let generation = state.generation;
        while state.generation == generation && !state.broken {
            self.released.wait(&mut state);
        }
        if state.broken {
            Err(SiderealError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Block until every live thread has arrived, with no transition.
    pub fn wait(&self) -> Result<()> {
        self.wait_with(|| Ok(()))
    }

    /// Remove the calling thread from the live set.
    ///
    /// `completed` is false for a thread that stops because of an error or
    /// a cancellation. Returns true for the last thread to leave.
    pub fn leave(&self, completed: bool) -> bool {
        let mut state = self.state.lock();
        state.live = state.live.saturating_sub(1);
        if !completed {
            state.broken = true;
            self.released.notify_all();
        } else if state.arrived > 0 && state.arrived >= state.live {
            // Peers waiting on a pass this thread will not reach.
            state.broken = true;
            self.released.notify_all();
        }
        state.live == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn transition_runs_once_per_pass() {
        let barrier = PassBarrier::new(4);
        let transitions = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..3 {
                        barrier
                            .wait_with(|| {
                                transitions.fetch_add(1, Ordering::SeqCst);
                                Ok(())
                            })
                            .unwrap();
                    }
                    barrier.leave(true);
                });
            }
        });
        assert_eq!(transitions.load(Ordering::SeqCst), 3);
        assert_eq!(barrier.live(), 0);
        assert!(!barrier.is_broken());
    }

    #[test]
    fn early_departure_releases_waiters() {
        let barrier = PassBarrier::new(2);
        std::thread::scope(|s| {
            let waiter = s.spawn(|| barrier.wait());
            s.spawn(|| {
                std::thread::sleep(std::time::Duration::from_millis(20));
                barrier.leave(false);
            });
            assert!(matches!(waiter.join().unwrap(), Err(SiderealError::Cancelled)));
        });
    }

    #[test]
    fn last_leaver_is_reported() {
        let barrier = PassBarrier::new(2);
        assert!(!barrier.leave(true));
        assert!(barrier.leave(true));
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
