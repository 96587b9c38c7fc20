//! Bounded, lossy capture queue shared by the radio callback and the drain task.

use core::cell::RefCell;
use critical_section::Mutex;
use heapless::Deque;

/// Capacity used by the capture agent.
pub const CAPTURE_CAPACITY: usize = 200;

/// Counter snapshot taken in a single critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferStats {
    /// Lifetime number of enqueued records
    pub packet_count: u64,
    /// Lifetime number of records overwritten before being drained
    pub overflow_count: u64,
    /// Records currently waiting to be drained
    pub buffered: usize,
    pub capacity: usize,
}

/// Fixed-capacity FIFO that overwrites its oldest entry when full.
///
/// `enqueue` never fails and never blocks. Overflow is counted, not reported.
#[derive(Debug)]
pub struct CaptureBuffer<T, const C: usize> {
    slots: Deque<T, C>,
    packet_count: u64,
    overflow_count: u64,
}

impl<T, const C: usize> Default for CaptureBuffer<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const C: usize> CaptureBuffer<T, C> {
    pub const fn new() -> Self {
        Self {
            slots: Deque::new(),
            packet_count: 0,
            overflow_count: 0,
        }
    }

    pub fn enqueue(&mut self, record: T) {
        if self.slots.is_full() {
            self.slots.pop_front();
            self.overflow_count += 1;
        }
        // A slot is always free at this point.
        let _ = self.slots.push_back(record);
        self.packet_count += 1;
    }

    pub fn dequeue(&mut self) -> Option<T> {
        self.slots.pop_front()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            packet_count: self.packet_count,
            overflow_count: self.overflow_count,
            buffered: self.slots.len(),
            capacity: C,
        }
    }
}

/// A [`CaptureBuffer`] behind a critical-section mutex.
///
/// Every operation enters the critical section exactly once and does a
/// bounded amount of work inside it, so the producer side can be called from
/// the radio callback.
pub struct SharedCaptureBuffer<T, const C: usize> {
    inner: Mutex<RefCell<CaptureBuffer<T, C>>>,
}

impl<T, const C: usize> Default for SharedCaptureBuffer<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const C: usize> SharedCaptureBuffer<T, C> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(CaptureBuffer::new())),
        }
    }

    pub fn enqueue(&self, record: T) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).enqueue(record));
    }

    pub fn dequeue(&self) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).dequeue())
    }

    pub fn stats(&self) -> BufferStats {
        critical_section::with(|cs| self.inner.borrow_ref(cs).stats())
    }
}
