//! A single fixed-size event record and its claim protocol.
//!
//! A [`Slot`] keeps two pieces of state. The claim flag is an `AtomicBool`
//! only writers touch: a writer that finds it already set drops its event
//! instead of waiting. The record itself sits behind a `parking_lot::Mutex`
//! that the claiming writer holds while populating and that readers and
//! resets hold only while copying or clearing, so they never observe a
//! half-written record and never make a writer drop.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::efficient_clock::EventTimestamp;
use crate::event_registry::{EventType, RenderFn};

/// Maximum number of bytes stored for a function name.
pub const FUNCTION_NAME_LEN: usize = 31;
/// Maximum number of bytes stored for a thread name.
pub const THREAD_NAME_LEN: usize = 31;
/// Maximum number of bytes stored for a message.
pub const MESSAGE_LEN: usize = 255;

/// Inline string storage holding at most `N` bytes.
///
/// Longer input is truncated silently, backing off to the previous UTF-8
/// character boundary so the stored text is always valid.
#[derive(Clone, Copy)]
pub struct FixedStr<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> FixedStr<N> {
    pub const fn new() -> Self {
        Self { buf: [0; N], len: 0 }
    }

    /// Replaces the content with `s`, truncated to `N` bytes.
    pub fn set(&mut self, s: &str) {
        let mut end = s.len().min(N);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.buf[..end].copy_from_slice(&s.as_bytes()[..end]);
        self.len = end;
    }

    /// Replaces the content with `s`, or clears it for `None`.
    pub fn set_opt(&mut self, s: Option<&str>) {
        match s {
            Some(s) => self.set(s),
            None => self.clear(),
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }

    /// The stored text, `None` when empty.
    pub fn get(&self) -> Option<&str> {
        if self.len == 0 {
            None
        } else {
            Some(self.as_str())
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<const N: usize> Default for FixedStr<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for FixedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

/// The textual part of an event as supplied by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFields<'a> {
    pub thread: Option<&'a str>,
    pub function: Option<&'a str>,
    /// Source line, 0 when unknown.
    pub line: u32,
    pub message: &'a str,
}

impl<'a> EventFields<'a> {
    /// Fields carrying only a message.
    pub fn message(message: &'a str) -> Self {
        Self {
            message,
            ..Default::default()
        }
    }
}

/// An extended payload stored in a slot.
///
/// The bytes are reference counted so readers can copy a record out of the
/// buffer without copying the payload under the buffer lock.
#[derive(Clone)]
pub struct ExtPayload {
    event_type: EventType,
    data: Arc<[u8]>,
    render: RenderFn,
}

impl ExtPayload {
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The callback resolved when the slot was populated.
    pub fn render_fn(&self) -> RenderFn {
        self.render
    }

    /// Renders the payload with its callback.
    pub fn render(&self, out: &mut dyn io::Write) -> io::Result<()> {
        (self.render)(out, &self.data)
    }
}

impl fmt::Debug for ExtPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtPayload")
            .field("event_type", &self.event_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// A payload borrowed from the caller, copied into the slot once claimed.
#[derive(Clone, Copy)]
pub struct PendingPayload<'a> {
    pub event_type: EventType,
    pub data: &'a [u8],
    pub render: RenderFn,
}

#[derive(Debug, Default)]
pub(crate) struct SlotData {
    in_use: bool,
    function: FixedStr<FUNCTION_NAME_LEN>,
    thread: FixedStr<THREAD_NAME_LEN>,
    message: FixedStr<MESSAGE_LEN>,
    line: u32,
    timestamp: EventTimestamp,
    indent: u8,
    payload: Option<ExtPayload>,
}

impl SlotData {
    fn clear(&mut self) {
        self.in_use = false;
        self.function.clear();
        self.thread.clear();
        self.message.clear();
        self.line = 0;
        self.timestamp = EventTimestamp::ZERO;
        self.indent = 0;
        self.payload = None;
    }

    fn record(&self, index: usize) -> Option<EventRecord> {
        if !self.in_use {
            return None;
        }
        Some(EventRecord {
            index,
            thread: self.thread.get().map(str::to_owned),
            function: self.function.get().map(str::to_owned),
            line: self.line,
            message: self.message.as_str().to_owned(),
            timestamp: self.timestamp,
            indent: self.indent,
            payload: self.payload.clone(),
        })
    }
}

/// One log record inside a ring buffer.
#[derive(Debug, Default)]
pub struct Slot {
    claimed: AtomicBool,
    data: Mutex<SlotData>,
}

impl Slot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tries to take the slot's claim flag without waiting.
    ///
    /// Returns `None` when another thread is still populating the slot.
    /// Readers copying the slot only delay the claim until their copy is done.
    pub fn try_claim(&self) -> Option<SlotWriter<'_>> {
        if self.claimed.swap(true, Ordering::Acquire) {
            return None;
        }
        Some(SlotWriter {
            guard: self.data.lock(),
            claimed: &self.claimed,
        })
    }

    /// Copies the record out, waiting for any in-flight population.
    ///
    /// `index` is the slot's position in its buffer and is carried into the
    /// returned record. Free slots yield `None`.
    pub fn read(&self, index: usize) -> Option<EventRecord> {
        self.data.lock().record(index)
    }

    pub fn is_in_use(&self) -> bool {
        self.data.lock().in_use
    }

    /// Clears every field and releases the payload, keeping the storage.
    pub fn clear(&self) {
        self.data.lock().clear();
    }
}

/// Exclusive write access to a claimed slot.
///
/// The claim is released when the writer is dropped, which
/// [`SlotWriter::populate`] does as its last step.
pub struct SlotWriter<'a> {
    guard: MutexGuard<'a, SlotData>,
    claimed: &'a AtomicBool,
}

impl Drop for SlotWriter<'_> {
    fn drop(&mut self) {
        self.claimed.store(false, Ordering::Release);
    }
}

impl SlotWriter<'_> {
    /// Overwrites the slot with a new event and publishes it.
    ///
    /// The previous payload is released first, all fields are replaced
    /// unconditionally and the timestamp is taken now.
    pub fn populate(mut self, fields: &EventFields<'_>, payload: Option<PendingPayload<'_>>, indent: u8) {
        let data = &mut *self.guard;
        data.payload = None;
        data.timestamp = EventTimestamp::now();
        data.thread.set_opt(fields.thread);
        data.function.set_opt(fields.function);
        data.line = fields.line;
        data.message.set(fields.message);
        data.payload = payload
            .filter(|p| !p.data.is_empty())
            .map(|p| ExtPayload {
                event_type: p.event_type,
                data: Arc::from(p.data),
                render: p.render,
            });
        data.indent = indent;
        data.in_use = true;
    }
}

/// An owned copy of a populated slot.
#[derive(Debug, Clone)]
pub struct EventRecord {
    /// Position of the slot inside its buffer.
    pub index: usize,
    pub thread: Option<String>,
    pub function: Option<String>,
    /// Source line, 0 when unknown.
    pub line: u32,
    pub message: String,
    pub timestamp: EventTimestamp,
    pub indent: u8,
    pub payload: Option<ExtPayload>,
}
