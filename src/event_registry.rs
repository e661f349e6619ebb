//! Registry of extended event types.
//!
//! An extended event carries a binary payload next to its message. The payload
//! is stored raw and rendered only when the buffer is displayed, by the
//! callback registered for the event's type. This keeps the write path down to
//! a single copy of the bytes.
//!
//! # Thread Safety
//!
//! Registration and lookup are serialized by an internal mutex and can be
//! called from any thread. [`EventRegistry::is_valid`] is lock free.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::error::{LogError, Result};

/// Renders an extended payload to a text sink.
pub type RenderFn = fn(&mut dyn io::Write, &[u8]) -> io::Result<()>;

/// Maximum number of entries in the registry, built-ins included.
pub const MAX_EVENT_TYPES: usize = 256;

/// Identifier of an extended event type.
///
/// Built-in types have fixed values below [`EventType::DYNAMIC_START`];
/// registered types are numbered sequentially from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventType(u32);

impl EventType {
    /// No extended payload.
    pub const NONE: EventType = EventType(0);
    /// Captured backtrace, rendered as text.
    pub const BACKTRACE: EventType = EventType(1);
    /// Arbitrary bytes, rendered as a hex dump.
    pub const HEX_DUMP: EventType = EventType(2);
    /// Highest built-in identifier.
    pub const LAST_BUILT_IN: EventType = EventType::HEX_DUMP;
    /// First identifier handed out by [`EventRegistry::register`].
    pub const DYNAMIC_START: EventType = EventType(100);

    pub const fn new(raw: u32) -> Self {
        EventType(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_built_in(self) -> bool {
        self.0 > Self::NONE.0 && self.0 <= Self::LAST_BUILT_IN.0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Entry {
    event_type: EventType,
    render: RenderFn,
}

fn same_callback(a: RenderFn, b: RenderFn) -> bool {
    a as usize == b as usize
}

/// The table mapping event types to their render callbacks.
pub struct EventRegistry {
    entries: Mutex<Vec<Entry>>,
    next_type: AtomicU32,
    initialized: AtomicBool,
}

impl EventRegistry {
    /// Creates an empty, uninitialized registry.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::with_capacity(MAX_EVENT_TYPES)),
            next_type: AtomicU32::new(EventType::DYNAMIC_START.0),
            initialized: AtomicBool::new(false),
        }
    }

    /// Clears the table and registers the built-in event types.
    pub fn init(&self) {
        let mut entries = self.entries.lock();
        entries.clear();
        entries.push(Entry {
            event_type: EventType::BACKTRACE,
            render: render_backtrace,
        });
        entries.push(Entry {
            event_type: EventType::HEX_DUMP,
            render: render_hex_dump,
        });
        self.next_type.store(EventType::DYNAMIC_START.0, Ordering::Release);
        self.initialized.store(true, Ordering::Release);
    }

    /// Drops every registration, built-ins included.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        self.initialized.store(false, Ordering::Release);
        entries.clear();
        self.next_type.store(EventType::DYNAMIC_START.0, Ordering::Release);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Registers a render callback and returns its event type.
    ///
    /// Registration is idempotent per callback: registering the same function
    /// again returns the type issued the first time.
    ///
    /// # Errors
    ///
    /// * [`LogError::NotInitialized`] before `init` or after `clear`
    /// * [`LogError::EventTableFull`] once [`MAX_EVENT_TYPES`] entries exist
    ///
    /// # Examples
    ///
    /// ```
    /// # use ring_logger::event_registry::EventRegistry;
    /// # use std::io::{self, Write};
    /// fn render_temperature(out: &mut dyn Write, data: &[u8]) -> io::Result<()> {
    ///     write!(out, "{} C", data[0])
    /// }
    ///
    /// let registry = EventRegistry::new();
    /// registry.init();
    ///
    /// let first = registry.register(render_temperature).unwrap();
    /// let again = registry.register(render_temperature).unwrap();
    /// assert_eq!(first, again);
    /// assert!(registry.is_valid(first));
    /// ```
    pub fn register(&self, render: RenderFn) -> Result<EventType> {
        if !self.is_initialized() {
            return Err(LogError::NotInitialized);
        }
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.iter().find(|e| same_callback(e.render, render)) {
            return Ok(entry.event_type);
        }
        if entries.len() >= MAX_EVENT_TYPES {
            tracing::warn!(capacity = MAX_EVENT_TYPES, "extended event table is full");
            return Err(LogError::EventTableFull(MAX_EVENT_TYPES));
        }
        let event_type = EventType(self.next_type.load(Ordering::Acquire));
        entries.push(Entry { event_type, render });
        self.next_type.store(event_type.0 + 1, Ordering::Release);
        tracing::debug!(%event_type, "registered extended event type");
        Ok(event_type)
    }

    /// Looks up the render callback of `event_type`.
    pub fn resolve(&self, event_type: EventType) -> Option<RenderFn> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.event_type == event_type)
            .map(|e| e.render)
    }

    /// True for built-in types and for any dynamic type issued so far.
    pub fn is_valid(&self, event_type: EventType) -> bool {
        event_type.is_built_in()
            || (event_type >= EventType::DYNAMIC_START
                && event_type.0 < self.next_type.load(Ordering::Acquire))
    }

    /// Number of registered types, built-ins included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Captures the current thread's backtrace as text, the payload of
/// [`EventType::BACKTRACE`] events.
pub fn capture_backtrace() -> String {
    std::backtrace::Backtrace::force_capture().to_string()
}

/// Built-in renderer for [`EventType::BACKTRACE`] payloads.
pub fn render_backtrace(out: &mut dyn io::Write, data: &[u8]) -> io::Result<()> {
    out.write_all(String::from_utf8_lossy(data).as_bytes())
}

/// Built-in renderer for [`EventType::HEX_DUMP`] payloads.
///
/// Sixteen bytes per line: offset, hex bytes and a printable ASCII column.
///
/// ```
/// # use ring_logger::event_registry::render_hex_dump;
/// let mut out = Vec::new();
/// render_hex_dump(&mut out, b"Hi!").unwrap();
/// let text = String::from_utf8(out).unwrap();
/// assert!(text.starts_with("0000  48 69 21"));
/// assert!(text.trim_end().ends_with("|Hi!|"));
/// ```
pub fn render_hex_dump(out: &mut dyn io::Write, data: &[u8]) -> io::Result<()> {
    const WIDTH: usize = 16;
    for (line, chunk) in data.chunks(WIDTH).enumerate() {
        write!(out, "{:04x}  ", line * WIDTH)?;
        for byte in chunk {
            write!(out, "{:02x} ", byte)?;
        }
        for _ in chunk.len()..WIDTH {
            write!(out, "   ")?;
        }
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        writeln!(out, " |{}|", ascii)?;
    }
    Ok(())
}
