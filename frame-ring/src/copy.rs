//! Injected copy operations.
//!
//! The ring engines never touch the caller's memory directly. Every transfer
//! between a ring slot and a caller buffer goes through [`CopySink`] (ring →
//! caller) or [`CopySource`] (caller → ring), so the engines stay agnostic
//! of which address space the caller's buffer lives in.
//!
//! Both traits follow the same convention: the return value is the number of
//! bytes that could **not** be copied. Zero means the whole chunk moved.

/// Destination of bytes extracted from a ring.
pub trait CopySink {
    /// Copy `src` into the destination starting at byte `offset`.
    ///
    /// Returns the number of bytes not copied.
    fn copy_in(&mut self, offset: usize, src: &[u8]) -> usize;
}

/// Origin of bytes injected into a ring.
pub trait CopySource {
    /// Fill `dst` from the source starting at byte `offset`.
    ///
    /// Returns the number of bytes not copied.
    fn copy_out(&mut self, offset: usize, dst: &mut [u8]) -> usize;
}

impl CopySink for [u8] {
    fn copy_in(&mut self, offset: usize, src: &[u8]) -> usize {
        let room = self.len().saturating_sub(offset);
        let n = room.min(src.len());
        if n > 0 {
            self[offset..offset + n].copy_from_slice(&src[..n]);
        }
        src.len() - n
    }
}

impl CopySource for [u8] {
    fn copy_out(&mut self, offset: usize, dst: &mut [u8]) -> usize {
        let avail = self.len().saturating_sub(offset);
        let n = avail.min(dst.len());
        if n > 0 {
            dst[..n].copy_from_slice(&self[offset..offset + n]);
        }
        dst.len() - n
    }
}

/// Read-only slices can only act as a source.
impl CopySource for &[u8] {
    fn copy_out(&mut self, offset: usize, dst: &mut [u8]) -> usize {
        let avail = self.len().saturating_sub(offset);
        let n = avail.min(dst.len());
        if n > 0 {
            dst[..n].copy_from_slice(&self[offset..offset + n]);
        }
        dst.len() - n
    }
}

impl<T: CopySink + ?Sized> CopySink for &mut T {
    fn copy_in(&mut self, offset: usize, src: &[u8]) -> usize {
        (**self).copy_in(offset, src)
    }
}

impl<T: CopySource + ?Sized> CopySource for &mut T {
    fn copy_out(&mut self, offset: usize, dst: &mut [u8]) -> usize {
        (**self).copy_out(offset, dst)
    }
}

/// Adapter turning a closure into a copy operation.
///
/// The closure receives `(offset, chunk)` and returns the number of bytes it
/// failed to move, matching the `copy(dst, src, len, ctx) -> not_copied`
/// convention of user-access helpers. Any context is captured by the closure.
pub struct CopyFn<F>(pub F);

impl<F> CopySink for CopyFn<F>
where
    F: FnMut(usize, &[u8]) -> usize,
{
    fn copy_in(&mut self, offset: usize, src: &[u8]) -> usize {
        (self.0)(offset, src)
    }
}

impl<F> CopySource for CopyFn<F>
where
    F: FnMut(usize, &mut [u8]) -> usize,
{
    fn copy_out(&mut self, offset: usize, dst: &mut [u8]) -> usize {
        (self.0)(offset, dst)
    }
}

/// Copy wrapper that faults after a fixed number of bytes, simulating a
/// cross-address-space fault part way through a transfer.
#[cfg(test)]
pub(crate) struct Faulting<T> {
    pub inner: T,
    pub budget: usize,
}

#[cfg(test)]
impl<T: CopySink> CopySink for Faulting<T> {
    fn copy_in(&mut self, offset: usize, src: &[u8]) -> usize {
        let n = self.budget.min(src.len());
        self.budget -= n;
        let missed = self.inner.copy_in(offset, &src[..n]);
        src.len() - n + missed
    }
}

#[cfg(test)]
impl<T: CopySource> CopySource for Faulting<T> {
    fn copy_out(&mut self, offset: usize, dst: &mut [u8]) -> usize {
        let n = self.budget.min(dst.len());
        self.budget -= n;
        let missed = self.inner.copy_out(offset, &mut dst[..n]);
        dst.len() - n + missed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_sink_copies_at_offset() {
        let mut buf = [0u8; 6];
        assert_eq!(buf.copy_in(2, &[7, 8, 9]), 0);
        assert_eq!(buf, [0, 0, 7, 8, 9, 0]);
    }

    #[test]
    fn slice_sink_reports_overflow() {
        let mut buf = [0u8; 4];
        assert_eq!(buf.copy_in(3, &[1, 2, 3]), 2);
        assert_eq!(buf, [0, 0, 0, 1]);
        assert_eq!(buf.copy_in(9, &[1]), 1);
    }

    #[test]
    fn slice_source_reports_underflow() {
        let mut src: &[u8] = &[1, 2, 3];
        let mut dst = [0u8; 4];
        assert_eq!(src.copy_out(1, &mut dst), 2);
        assert_eq!(dst, [2, 3, 0, 0]);
    }

    #[test]
    fn closure_adapter() {
        let mut seen = 0usize;
        let mut sink = CopyFn(|_off: usize, chunk: &[u8]| {
            seen += chunk.len();
            1
        });
        assert_eq!(sink.copy_in(0, &[1, 2, 3]), 1);
        drop(sink);
        assert_eq!(seen, 3);
    }

    #[test]
    fn faulting_stops_after_budget() {
        let mut buf = [0u8; 8];
        let mut sink = Faulting {
            inner: &mut buf[..],
            budget: 5,
        };
        assert_eq!(sink.copy_in(0, &[1, 1, 1, 1]), 0);
        assert_eq!(sink.copy_in(4, &[2, 2, 2, 2]), 3);
        assert_eq!(buf, [1, 1, 1, 1, 2, 0, 0, 0]);
    }
}
