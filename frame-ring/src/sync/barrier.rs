//! Reconfiguration barrier.
//!
//! One barrier guards one direction of one channel. Streaming calls (reads
//! or writes from user sessions) are admitted concurrently; a
//! reconfiguration excludes all of them. The hardware side of the rings never
//! touches the barrier, so a reconfiguration cannot stall the fixed-rate
//! producer/consumer.
//!
//! ```text
//!            begin_reconfigure()              in_flight == 0
//! Streaming ───────────────────► Draining ─────────────────► Reconfiguring
//!     ▲                                                            │
//!     └──────────────────────── end_reconfigure() ─────────────────┘
//! ```
//!
//! Admission uses two sequentially consistent atomics in a Dekker-style
//! handshake: a streamer increments `in_flight` and then re-checks the flag,
//! the reconfigurer sets the flag and then checks `in_flight`. At least one
//! side always observes the other, so a streamer never slips past a
//! reconfiguration that has already seen `in_flight == 0`.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[cfg(feature = "std")]
use std::time::{Duration, Instant};

use super::park::{DefaultParker, Parker};
#[cfg(feature = "std")]
use crate::error::{Result, RingError};

/// Observable barrier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierState {
    /// No reconfiguration pending; streaming calls are admitted.
    Streaming,
    /// Reconfiguration requested; waiting for in-flight calls to finish.
    Draining,
    /// Reconfigurer holds exclusive access.
    Reconfiguring,
}

impl fmt::Display for BarrierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BarrierState::Streaming => "streaming",
            BarrierState::Draining => "draining",
            BarrierState::Reconfiguring => "reconfiguring",
        };
        f.write_str(name)
    }
}

/// Admission control between streaming calls and a reconfigurer.
pub struct ReconfigBarrier<P: Parker = DefaultParker> {
    reconfigure: AtomicBool,
    in_flight: AtomicUsize,
    /// Streaming calls waiting for the flag to clear.
    stream_wait: P,
    /// The reconfigurer waiting for `in_flight` to drain.
    drain_wait: P,
}

impl<P: Parker + Default> Default for ReconfigBarrier<P> {
    fn default() -> Self {
        Self::with_parkers(P::default(), P::default())
    }
}

impl ReconfigBarrier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: Parker> ReconfigBarrier<P> {
    /// Build a barrier from explicit wait primitives.
    pub const fn with_parkers(stream_wait: P, drain_wait: P) -> Self {
        ReconfigBarrier {
            reconfigure: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            stream_wait,
            drain_wait,
        }
    }

    /// Admit a streaming call, suspending while a reconfiguration is pending.
    ///
    /// Every successful call must be paired with [`exit_stream`](Self::exit_stream);
    /// prefer [`stream`](Self::stream), which pairs them automatically.
    pub fn enter_stream(&self) {
        loop {
            if self.reconfigure.load(Ordering::SeqCst) {
                self.stream_wait
                    .park_until(&|| !self.reconfigure.load(Ordering::SeqCst));
            }
            if self.try_admit() {
                return;
            }
        }
    }

    /// Admit a streaming call only if no reconfiguration is pending.
    pub fn try_enter_stream(&self) -> bool {
        !self.reconfigure.load(Ordering::SeqCst) && self.try_admit()
    }

    /// Cancel-aware admission: give up after `timeout`.
    ///
    /// On timeout `in_flight` is left exactly as it was found.
    #[cfg(feature = "std")]
    pub fn enter_stream_timeout(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.reconfigure.load(Ordering::SeqCst) {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let cleared = self.stream_wait.park_until_timeout(
                    &|| !self.reconfigure.load(Ordering::SeqCst),
                    remaining,
                );
                if !cleared {
                    return Err(RingError::Timeout);
                }
            }
            if self.try_admit() {
                return Ok(());
            }
        }
    }

    /// Leave a streaming call; wakes a waiting reconfigurer on the last exit.
    pub fn exit_stream(&self) {
        let prev = self.in_flight.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0, "exit_stream without enter_stream");
        if prev == 1 && self.reconfigure.load(Ordering::SeqCst) {
            self.drain_wait.unpark_all();
        }
    }

    /// Request exclusive access and wait until in-flight streaming drains.
    ///
    /// Callers must serialize reconfigurations of the same barrier.
    pub fn begin_reconfigure(&self) {
        let was_set = self.reconfigure.swap(true, Ordering::SeqCst);
        debug_assert!(!was_set, "overlapping reconfigurations");
        log::trace!(
            "reconfigure requested, {} stream call(s) in flight",
            self.in_flight.load(Ordering::Relaxed)
        );
        self.drain_wait
            .park_until(&|| self.in_flight.load(Ordering::SeqCst) == 0);
    }

    /// Release exclusive access and wake suspended streaming calls.
    pub fn end_reconfigure(&self) {
        self.reconfigure.store(false, Ordering::SeqCst);
        self.stream_wait.unpark_all();
    }

    /// RAII form of [`enter_stream`](Self::enter_stream).
    pub fn stream(&self) -> StreamGuard<'_, P> {
        self.enter_stream();
        StreamGuard { barrier: self }
    }

    /// RAII form of [`try_enter_stream`](Self::try_enter_stream).
    pub fn try_stream(&self) -> Option<StreamGuard<'_, P>> {
        self.try_enter_stream()
            .then(|| StreamGuard { barrier: self })
    }

    /// RAII form of [`enter_stream_timeout`](Self::enter_stream_timeout).
    #[cfg(feature = "std")]
    pub fn stream_timeout(&self, timeout: Duration) -> Result<StreamGuard<'_, P>> {
        self.enter_stream_timeout(timeout)?;
        Ok(StreamGuard { barrier: self })
    }

    /// RAII form of [`begin_reconfigure`](Self::begin_reconfigure).
    pub fn reconfigure(&self) -> ReconfigureGuard<'_, P> {
        self.begin_reconfigure();
        ReconfigureGuard { barrier: self }
    }

    pub fn state(&self) -> BarrierState {
        if !self.reconfigure.load(Ordering::SeqCst) {
            BarrierState::Streaming
        } else if self.in_flight.load(Ordering::SeqCst) == 0 {
            BarrierState::Reconfiguring
        } else {
            BarrierState::Draining
        }
    }

    /// Number of streaming calls currently admitted.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn try_admit(&self) -> bool {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if !self.reconfigure.load(Ordering::SeqCst) {
            return true;
        }
        // Lost the race against a reconfigurer: back out.
        self.exit_stream();
        false
    }
}

/// Admitted streaming call; exits the barrier on drop.
#[must_use = "dropping the guard immediately exits the stream"]
pub struct StreamGuard<'a, P: Parker> {
    barrier: &'a ReconfigBarrier<P>,
}

impl<P: Parker> Drop for StreamGuard<'_, P> {
    fn drop(&mut self) {
        self.barrier.exit_stream();
    }
}

/// Exclusive reconfiguration window; ends it on drop.
#[must_use = "dropping the guard immediately ends the reconfiguration"]
pub struct ReconfigureGuard<'a, P: Parker> {
    barrier: &'a ReconfigBarrier<P>,
}

impl<P: Parker> Drop for ReconfigureGuard<'_, P> {
    fn drop(&mut self) {
        self.barrier.end_reconfigure();
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::sync::park::{SpinParker, ThreadParker};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::vec::Vec;

    #[test]
    fn starts_streaming() {
        let b = ReconfigBarrier::new();
        assert_eq!(b.state(), BarrierState::Streaming);
        assert_eq!(b.in_flight(), 0);
    }

    #[test]
    fn guards_pair_enter_and_exit() {
        let b = ReconfigBarrier::new();
        {
            let _a = b.stream();
            let _c = b.stream();
            assert_eq!(b.in_flight(), 2);
        }
        assert_eq!(b.in_flight(), 0);

        {
            let _r = b.reconfigure();
            assert_eq!(b.state(), BarrierState::Reconfiguring);
            assert!(b.try_stream().is_none());
            assert_eq!(b.in_flight(), 0);
        }
        assert_eq!(b.state(), BarrierState::Streaming);
        assert!(b.try_stream().is_some());
    }

    #[test]
    fn reconfigure_waits_for_all_streams_to_exit() {
        const N: usize = 4;
        let b = Arc::new(ReconfigBarrier::<ThreadParker>::default());
        let exited = Arc::new(AtomicUsize::new(0));
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(parking_lot::Mutex::new(release_rx));

        let streams: Vec<_> = (0..N)
            .map(|_| {
                let b = Arc::clone(&b);
                let exited = Arc::clone(&exited);
                let entered_tx = entered_tx.clone();
                let release_rx = Arc::clone(&release_rx);
                thread::spawn(move || {
                    b.enter_stream();
                    entered_tx.send(()).unwrap();
                    release_rx.lock().recv().unwrap();
                    exited.fetch_add(1, Ordering::SeqCst);
                    b.exit_stream();
                })
            })
            .collect();
        for _ in 0..N {
            entered_rx.recv().unwrap();
        }

        let reconfigurer = {
            let b = Arc::clone(&b);
            let exited = Arc::clone(&exited);
            thread::spawn(move || {
                b.begin_reconfigure();
                let seen = exited.load(Ordering::SeqCst);
                b.end_reconfigure();
                seen
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert_eq!(b.state(), BarrierState::Draining);
        for _ in 0..N {
            release_tx.send(()).unwrap();
        }
        for s in streams {
            s.join().unwrap();
        }
        assert_eq!(reconfigurer.join().unwrap(), N);
        assert_eq!(b.state(), BarrierState::Streaming);
    }

    #[test]
    fn stream_blocks_until_reconfigure_ends() {
        let b = Arc::new(ReconfigBarrier::<ThreadParker>::default());
        b.begin_reconfigure();

        let admitted = Arc::new(AtomicBool::new(false));
        let stream = {
            let b = Arc::clone(&b);
            let admitted = Arc::clone(&admitted);
            thread::spawn(move || {
                let _g = b.stream();
                admitted.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!admitted.load(Ordering::SeqCst));
        b.end_reconfigure();
        stream.join().unwrap();
        assert!(admitted.load(Ordering::SeqCst));
        assert_eq!(b.in_flight(), 0);
    }

    #[test]
    fn timeout_leaves_in_flight_untouched() {
        let b = ReconfigBarrier::<ThreadParker>::default();
        b.begin_reconfigure();
        assert_eq!(
            b.stream_timeout(Duration::from_millis(5)).err(),
            Some(RingError::Timeout)
        );
        assert_eq!(b.in_flight(), 0);
        b.end_reconfigure();
        assert!(b.stream_timeout(Duration::from_millis(5)).is_ok());
        assert_eq!(b.in_flight(), 0);
    }

    #[test]
    fn spin_parker_barrier_under_contention() {
        let b = Arc::new(ReconfigBarrier::<SpinParker>::default());
        let streamers: Vec<_> = (0..3)
            .map(|_| {
                let b = Arc::clone(&b);
                thread::spawn(move || {
                    for _ in 0..2000 {
                        let _g = b.stream();
                        assert_ne!(b.state(), BarrierState::Reconfiguring);
                    }
                })
            })
            .collect();
        for _ in 0..200 {
            let _r = b.reconfigure();
            assert_ne!(b.state(), BarrierState::Streaming);
        }
        for s in streamers {
            s.join().unwrap();
        }
        assert_eq!(b.in_flight(), 0);
    }
}
