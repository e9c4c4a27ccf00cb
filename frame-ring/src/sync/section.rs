//! Short critical sections.
//!
//! The transmit ring's fill count is the only state in the engines touched by
//! more than one party. Updates to it run inside a [`CriticalSection`], which
//! must be safe to enter from the interrupt context that drains the ring.
//! Only O(1) work is done inside; no copying.

/// A short mutual-exclusion region.
///
/// Bare-metal targets implement this by masking interrupts around `f`; the
/// host implementations below use a spin lock or a `parking_lot` mutex.
pub trait CriticalSection: Send + Sync {
    /// Run `f` with exclusive access to the protected state.
    fn with<R>(&self, f: impl FnOnce() -> R) -> R;
}

/// Spin-lock section. Interrupt-safe only when every party runs on a
/// context that cannot preempt the lock holder on the same core.
#[derive(Default)]
pub struct SpinSection {
    lock: spin::Mutex<()>,
}

impl SpinSection {
    pub const fn new() -> Self {
        SpinSection {
            lock: spin::Mutex::new(()),
        }
    }
}

impl CriticalSection for SpinSection {
    #[inline]
    fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock.lock();
        f()
    }
}

/// Section backed by a `parking_lot` mutex, for hosted builds where the
/// "interrupt" side is an ordinary thread.
#[cfg(feature = "std")]
#[derive(Default)]
pub struct MutexSection {
    lock: parking_lot::Mutex<()>,
}

#[cfg(feature = "std")]
impl CriticalSection for MutexSection {
    #[inline]
    fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock.lock();
        f()
    }
}

/// Section used when none is named.
#[cfg(feature = "std")]
pub type DefaultSection = MutexSection;

#[cfg(not(feature = "std"))]
pub type DefaultSection = SpinSection;

/// Lock serializing reconfigurations of one channel. A second reconfigurer
/// sleeps on hosted builds instead of spinning through the first one's drain.
#[cfg(feature = "std")]
pub(crate) type SetupLock = parking_lot::Mutex<()>;

#[cfg(not(feature = "std"))]
pub(crate) type SetupLock = spin::Mutex<()>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn hammer<S: CriticalSection + Default + 'static>() {
        let section = Arc::new(S::default());
        let counter = Arc::new(core::sync::atomic::AtomicUsize::new(0));
        let handles: std::vec::Vec<_> = (0..4)
            .map(|_| {
                let section = Arc::clone(&section);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        section.with(|| {
                            // Non-atomic read-modify-write made safe by the section.
                            let v = counter.load(core::sync::atomic::Ordering::Relaxed);
                            counter.store(v + 1, core::sync::atomic::Ordering::Relaxed);
                        });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(core::sync::atomic::Ordering::Relaxed), 4000);
    }

    #[test]
    fn spin_section_serializes() {
        hammer::<SpinSection>();
    }

    #[cfg(feature = "std")]
    #[test]
    fn mutex_section_serializes() {
        hammer::<MutexSection>();
    }

    #[cfg(feature = "std")]
    #[test]
    fn setup_lock_parks_second_reconfigurer() {
        let lock: Arc<parking_lot::Mutex<()>> = Arc::new(SetupLock::new(()));
        let held = lock.lock();
        let waiter = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                let _g = lock.lock();
            })
        };
        assert!(lock.try_lock().is_none());
        drop(held);
        waiter.join().unwrap();
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn returns_closure_value() {
        let s = SpinSection::new();
        assert_eq!(s.with(|| 7), 7);
    }
}
