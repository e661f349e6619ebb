//! Core implementation of the ring buffer storage engine.
//!
//! This module provides the RingBuffer struct and the slot claim protocol that
//! lets many threads write into one bounded buffer concurrently.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

use crate::error::{LogError, Result};
use crate::slot::{EventFields, EventRecord, PendingPayload, Slot};

/// Maximum number of slots in a ring buffer. Larger requests are clamped.
pub const MAX_EVENTS: usize = 128;

/// Result of a log call that reached a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub enum LogOutcome {
    /// The event was written and is visible to readers.
    Stored,
    /// The target slot was still being populated by another thread, so the
    /// event was dropped. This is expected under load and is not a failure.
    EventLocked,
}

impl LogOutcome {
    pub fn is_stored(self) -> bool {
        self == LogOutcome::Stored
    }
}

/// Write position of a ring buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Index of the next slot to hand out.
    pub next: usize,
    /// Number of times `next` has returned to the first slot.
    pub wraps: u64,
}

impl Cursor {
    #[inline]
    fn advance(&mut self, capacity: usize) -> usize {
        let index = self.next;
        self.next = (self.next + 1) % capacity;
        if self.next == 0 {
            self.wraps += 1;
        }
        index
    }

    /// Index display iteration starts from: the first slot until the buffer
    /// has wrapped, the oldest surviving event afterwards.
    #[inline]
    fn display_start(&self) -> usize {
        if self.wraps == 0 {
            0
        } else {
            self.next
        }
    }
}

/// Counters describing a buffer at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    pub capacity: usize,
    pub cursor: usize,
    pub wraps: u64,
    /// Events dropped because their slot was still claimed.
    pub dropped: u64,
    pub in_use: usize,
}

/// A consistent copy of a buffer's populated slots.
#[derive(Debug, Clone)]
pub struct BufferSnapshot {
    pub stats: BufferStats,
    /// Populated records in display order.
    pub events: Vec<EventRecord>,
}

/// A fixed-capacity circular buffer of log slots.
///
/// The buffer uses a split locking strategy to keep producers out of each
/// other's way:
///
/// 1. A short buffer lock serializes cursor advancement only. Claiming a slot
///    costs an index increment under the lock, nothing more.
/// 2. The claimed slot is populated outside the buffer lock, under the slot's
///    own claim flag.
/// 3. If a producer finds its slot still claimed (the buffer wrapped onto a
///    slot another thread is still writing), the event is dropped and counted
///    instead of blocking the caller.
///
/// # Thread Safety
///
/// RingBuffer is `Sync`: share it between threads behind an `Arc` and call
/// [`RingBuffer::write`] from all of them. Readers copy records out under the
/// buffer lock and never see a half-written slot.
///
/// # Examples
///
/// ```
/// # use ring_logger::ring_buffer::{RingBuffer, LogOutcome};
/// # use ring_logger::slot::EventFields;
/// let buffer = RingBuffer::new(3).unwrap();
///
/// for message in ["a", "b", "c", "d"] {
///     let outcome = buffer.write(&EventFields::message(message), None, 0).unwrap();
///     assert_eq!(outcome, LogOutcome::Stored);
/// }
///
/// let messages: Vec<String> = buffer.snapshot().events.into_iter().map(|e| e.message).collect();
/// assert_eq!(messages, ["b", "c", "d"]);
/// assert_eq!(buffer.stats().wraps, 1);
/// ```
pub struct RingBuffer {
    slots: Box<[Slot]>,
    cursor: Arc<Mutex<Cursor>>,
    dropped: AtomicU64,
    retired: AtomicBool,
}

impl RingBuffer {
    /// Creates a buffer with `capacity` slots.
    ///
    /// A capacity of 0 or above [`MAX_EVENTS`] yields [`MAX_EVENTS`] slots.
    ///
    /// # Errors
    ///
    /// [`LogError::SlotAllocation`] if the slot storage cannot be allocated.
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = clamp_capacity(capacity);
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| LogError::SlotAllocation(capacity))?;
        slots.extend((0..capacity).map(|_| Slot::new()));

        Ok(Self {
            slots: slots.into_boxed_slice(),
            cursor: Arc::new(Mutex::new(Cursor::default())),
            dropped: AtomicU64::new(0),
            retired: AtomicBool::new(false),
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Reserves the slot at the cursor and advances the cursor.
    ///
    /// The buffer lock is held only for the cursor update. The wrap count is
    /// incremented exactly when the cursor returns to the first slot.
    ///
    /// # Errors
    ///
    /// [`LogError::NotInitialized`] if the buffer has been destroyed.
    pub fn claim_slot(&self) -> Result<SlotHandle<'_>> {
        let mut cursor = self.cursor.lock();
        if self.retired.load(Ordering::Acquire) {
            return Err(LogError::NotInitialized);
        }
        let index = cursor.advance(self.slots.len());
        Ok(SlotHandle { buffer: self, index })
    }

    /// Claims the next slot and populates it.
    pub fn write(
        &self,
        fields: &EventFields<'_>,
        payload: Option<PendingPayload<'_>>,
        indent: u8,
    ) -> Result<LogOutcome> {
        Ok(self.claim_slot()?.populate(fields, payload, indent))
    }

    /// Clears every slot in place and rewinds the cursor.
    ///
    /// Waits for in-flight populations of each slot before clearing it. Wrap
    /// and drop counters are zeroed; slot storage is kept.
    ///
    /// # Errors
    ///
    /// [`LogError::NotInitialized`] if the buffer has been destroyed.
    pub fn reset(&self) -> Result<()> {
        let mut cursor = self.cursor.lock();
        if self.retired.load(Ordering::Acquire) {
            return Err(LogError::NotInitialized);
        }
        for slot in self.slots.iter() {
            slot.clear();
        }
        *cursor = Cursor::default();
        self.dropped.store(0, Ordering::Relaxed);
        Ok(())
    }

    /// Releases every payload and retires the buffer.
    ///
    /// Writers still holding a reference get [`LogError::NotInitialized`]
    /// from then on instead of writing into a buffer nobody can read.
    pub(crate) fn destroy(&self) {
        let _cursor = self.cursor.lock();
        self.retired.store(true, Ordering::Release);
        for slot in self.slots.iter() {
            slot.clear();
        }
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Copies the populated slots out in display order.
    ///
    /// Iteration starts at the first slot if the buffer never wrapped and at
    /// the cursor (the oldest surviving event) otherwise, and stops at the
    /// first free slot or after one full cycle.
    pub fn snapshot(&self) -> BufferSnapshot {
        let cursor = self.cursor.lock();
        self.snapshot_locked(&cursor)
    }

    pub(crate) fn snapshot_locked(&self, cursor: &Cursor) -> BufferSnapshot {
        let capacity = self.slots.len();
        let start = cursor.display_start();
        let mut events = Vec::with_capacity(capacity);
        for offset in 0..capacity {
            let index = (start + offset) % capacity;
            match self.slots[index].read(index) {
                Some(record) => events.push(record),
                None => break,
            }
        }
        BufferSnapshot {
            stats: self.stats_locked(cursor),
            events,
        }
    }

    /// Copies every slot in physical order, free slots included.
    pub fn slots(&self) -> Vec<Option<EventRecord>> {
        self.inspect().1
    }

    /// Counters and every slot in physical order, taken under one lock.
    pub fn inspect(&self) -> (BufferStats, Vec<Option<EventRecord>>) {
        let cursor = self.cursor.lock();
        let slots = self
            .slots
            .iter()
            .enumerate()
            .map(|(index, slot)| slot.read(index))
            .collect();
        (self.stats_locked(&cursor), slots)
    }

    pub fn stats(&self) -> BufferStats {
        let cursor = self.cursor.lock();
        self.stats_locked(&cursor)
    }

    fn stats_locked(&self, cursor: &Cursor) -> BufferStats {
        BufferStats {
            capacity: self.slots.len(),
            cursor: cursor.next,
            wraps: cursor.wraps,
            dropped: self.dropped.load(Ordering::Relaxed),
            in_use: self.slots.iter().filter(|s| s.is_in_use()).count(),
        }
    }

    /// Number of events dropped on slot contention since the last reset.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Takes the buffer lock as an owned guard, for the registry's full lock.
    pub(crate) fn lock_cursor_arc(&self) -> ArcMutexGuard<RawMutex, Cursor> {
        self.cursor.lock_arc()
    }

    /// Direct access to a slot, mainly for tests and diagnostics.
    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }
}

/// A slot reserved by [`RingBuffer::claim_slot`] and not yet populated.
pub struct SlotHandle<'a> {
    buffer: &'a RingBuffer,
    index: usize,
}

impl SlotHandle<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Populates the claimed slot.
    ///
    /// If another thread still holds the slot's claim flag, nothing is
    /// written, the buffer's drop counter is incremented and
    /// [`LogOutcome::EventLocked`] is returned.
    pub fn populate(
        self,
        fields: &EventFields<'_>,
        payload: Option<PendingPayload<'_>>,
        indent: u8,
    ) -> LogOutcome {
        match self.buffer.slots[self.index].try_claim() {
            Some(writer) => {
                writer.populate(fields, payload, indent);
                LogOutcome::Stored
            }
            None => {
                self.buffer.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(slot = self.index, "slot still claimed, event dropped");
                LogOutcome::EventLocked
            }
        }
    }
}

fn clamp_capacity(capacity: usize) -> usize {
    if capacity == 0 || capacity > MAX_EVENTS {
        MAX_EVENTS
    } else {
        capacity
    }
}
