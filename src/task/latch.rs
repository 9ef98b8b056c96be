// src/task/latch.rs

//! Count-down latch used for dependency gating and for the coordinator's
//! blocking wait.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Returned by [`Latch::wait`] when the latch was interrupted before it
/// reached zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

#[derive(Debug)]
struct LatchState {
    count: usize,
    interrupted: bool,
}

/// A one-shot countdown: waiters block until `count_down` has been called
/// `count` times, or until the latch is interrupted.
#[derive(Debug)]
pub struct Latch {
    state: Mutex<LatchState>,
    cond: Condvar,
}

impl Latch {
    pub fn new(count: usize) -> Self {
        Self {
            state: Mutex::new(LatchState {
                count,
                interrupted: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Decrement the count, waking all waiters when it reaches zero.
    ///
    /// Returns `true` if this call opened the latch. Calls on an open latch
    /// are ignored.
    pub fn count_down(&self) -> bool {
        let mut state = self.state.lock();
        if state.count == 0 {
            return false;
        }
        state.count -= 1;
        if state.count == 0 {
            self.cond.notify_all();
            true
        } else {
            false
        }
    }

    pub fn count(&self) -> usize {
        self.state.lock().count
    }

    pub fn is_open(&self) -> bool {
        self.count() == 0
    }

    /// Wake every waiter with [`Interrupted`]; later waits also fail fast
    /// unless the latch is already open.
    pub fn interrupt(&self) {
        let mut state = self.state.lock();
        state.interrupted = true;
        self.cond.notify_all();
    }

    /// Block until the count reaches zero.
    pub fn wait(&self) -> Result<(), Interrupted> {
        let mut state = self.state.lock();
        loop {
            if state.count == 0 {
                return Ok(());
            }
            if state.interrupted {
                return Err(Interrupted);
            }
            self.cond.wait(&mut state);
        }
    }

    /// Block until the count reaches zero or `timeout` elapses.
    ///
    /// Returns `true` if the latch opened in time. A timeout too large to
    /// represent as a deadline waits without one.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        while state.count > 0 && !state.interrupted {
            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
                None => self.cond.wait(&mut state),
            }
        }
        state.count == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn zero_count_latch_is_open_immediately() {
        let latch = Latch::new(0);
        assert!(latch.is_open());
        assert_eq!(latch.wait(), Ok(()));
        assert!(!latch.count_down());
    }

    #[test]
    fn opens_after_count_downs_from_other_threads() {
        let latch = Arc::new(Latch::new(3));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let latch = Arc::clone(&latch);
                thread::spawn(move || {
                    latch.count_down();
                })
            })
            .collect();

        assert_eq!(latch.wait(), Ok(()));
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(latch.count(), 0);
    }

    #[test]
    fn wait_timeout_gives_up() {
        let latch = Latch::new(1);
        let start = Instant::now();
        assert!(!latch.wait_timeout(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn unbounded_timeout_waits_for_count_down() {
        let latch = Arc::new(Latch::new(1));
        let opener = {
            let latch = Arc::clone(&latch);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                latch.count_down();
            })
        };
        assert!(latch.wait_timeout(Duration::MAX));
        opener.join().unwrap();
    }

    #[test]
    fn unbounded_timeout_returns_on_interrupt() {
        let latch = Arc::new(Latch::new(1));
        let waiter = {
            let latch = Arc::clone(&latch);
            thread::spawn(move || latch.wait_timeout(Duration::MAX))
        };
        thread::sleep(Duration::from_millis(20));
        latch.interrupt();
        assert!(!waiter.join().unwrap());
    }

    #[test]
    fn interrupt_wakes_waiter() {
        let latch = Arc::new(Latch::new(1));
        let waiter = {
            let latch = Arc::clone(&latch);
            thread::spawn(move || latch.wait())
        };
        thread::sleep(Duration::from_millis(20));
        latch.interrupt();
        assert_eq!(waiter.join().unwrap(), Err(Interrupted));
    }
}
