//! Suspension primitives for the reconfiguration barrier.
//!
//! The barrier never decides *how* a caller waits. It hands a readiness
//! predicate to a [`Parker`] and later calls [`Parker::unpark_all`] after
//! changing the state the predicate reads. Implementations must not lose a
//! wakeup that races with the predicate check.

#[cfg(feature = "std")]
use std::time::{Duration, Instant};

/// Wait/signal primitive.
pub trait Parker: Send + Sync {
    /// Suspend the caller until `ready()` returns `true`.
    ///
    /// `ready` may be evaluated any number of times.
    fn park_until(&self, ready: &dyn Fn() -> bool);

    /// Like [`park_until`](Self::park_until) but gives up after `timeout`.
    ///
    /// Returns `true` if `ready()` held before the deadline.
    #[cfg(feature = "std")]
    fn park_until_timeout(&self, ready: &dyn Fn() -> bool, timeout: Duration) -> bool;

    /// Wake every caller suspended in this parker.
    fn unpark_all(&self);
}

/// Busy-waiting parker for targets without a scheduler.
#[derive(Debug, Default)]
pub struct SpinParker;

impl Parker for SpinParker {
    fn park_until(&self, ready: &dyn Fn() -> bool) {
        while !ready() {
            core::hint::spin_loop();
        }
    }

    #[cfg(feature = "std")]
    fn park_until_timeout(&self, ready: &dyn Fn() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !ready() {
            if Instant::now() >= deadline {
                return false;
            }
            core::hint::spin_loop();
        }
        true
    }

    fn unpark_all(&self) {}
}

/// Parker that puts the calling thread to sleep on a `parking_lot` condvar.
#[cfg(feature = "std")]
#[derive(Default)]
pub struct ThreadParker {
    lock: parking_lot::Mutex<()>,
    cond: parking_lot::Condvar,
}

#[cfg(feature = "std")]
impl Parker for ThreadParker {
    fn park_until(&self, ready: &dyn Fn() -> bool) {
        let mut guard = self.lock.lock();
        while !ready() {
            self.cond.wait(&mut guard);
        }
    }

    fn park_until_timeout(&self, ready: &dyn Fn() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock.lock();
        while !ready() {
            if self.cond.wait_until(&mut guard, deadline).timed_out() {
                return ready();
            }
        }
        true
    }

    fn unpark_all(&self) {
        // Taking the lock orders this wakeup after any in-progress predicate
        // check, so a waiter cannot miss it.
        let _guard = self.lock.lock();
        self.cond.notify_all();
    }
}

/// Parker used when none is named: thread parking on hosted builds,
/// spinning otherwise.
#[cfg(feature = "std")]
pub type DefaultParker = ThreadParker;

#[cfg(not(feature = "std"))]
pub type DefaultParker = SpinParker;

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn wakes_waiter<P: Parker + Default + 'static>() {
        let parker = Arc::new(P::default());
        let flag = Arc::new(AtomicBool::new(false));

        let waiter = {
            let parker = Arc::clone(&parker);
            let flag = Arc::clone(&flag);
            thread::spawn(move || parker.park_until(&|| flag.load(Ordering::SeqCst)))
        };

        thread::sleep(Duration::from_millis(20));
        flag.store(true, Ordering::SeqCst);
        parker.unpark_all();
        waiter.join().unwrap();
    }

    #[test]
    fn thread_parker_wakes_waiter() {
        wakes_waiter::<ThreadParker>();
    }

    #[test]
    fn spin_parker_wakes_waiter() {
        wakes_waiter::<SpinParker>();
    }

    #[test]
    fn ready_predicate_returns_immediately() {
        ThreadParker::default().park_until(&|| true);
        SpinParker.park_until(&|| true);
    }

    #[test]
    fn timeout_expires() {
        let parker = ThreadParker::default();
        assert!(!parker.park_until_timeout(&|| false, Duration::from_millis(10)));
        assert!(!SpinParker.park_until_timeout(&|| false, Duration::from_millis(10)));
        assert!(parker.park_until_timeout(&|| true, Duration::from_millis(10)));
    }
}
