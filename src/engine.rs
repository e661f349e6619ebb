//! The logging engine: registries, flags and the log operations over them.
//!
//! An [`Engine`] owns one [`BufferRegistry`] and one [`EventRegistry`]. The
//! crate keeps a process-wide instance behind the free functions in
//! [`crate::global`]; separate engines can be created for embedding or tests.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::display::{self, DebugBuffer, DisplayOptions};
use crate::error::{LogError, Result};
use crate::event_registry::{capture_backtrace, EventRegistry, EventType, RenderFn};
use crate::registry::{BufferId, BufferRegistry, LockMode, LockState};
use crate::ring_buffer::{BufferSnapshot, LogOutcome, RingBuffer};
use crate::slot::{EventFields, PendingPayload};
use crate::thread_context;

/// A complete ring logger instance.
///
/// # Thread Safety
///
/// Every method takes `&self` and can be called from any thread. Log calls
/// only contend on the target buffer's cursor lock and, when the buffer wraps
/// onto a slot still being written, drop the event rather than wait.
///
/// # Examples
///
/// ```
/// # use ring_logger::{Engine, LogOutcome};
/// let engine = Engine::new();
/// engine.init(3).unwrap();
///
/// for message in ["a", "b", "c", "d", "e"] {
///     assert_eq!(engine.log(message).unwrap(), LogOutcome::Stored);
/// }
///
/// let shown: Vec<String> = engine
///     .snapshot(None)
///     .unwrap()
///     .events
///     .into_iter()
///     .map(|e| e.message)
///     .collect();
/// assert_eq!(shown, ["c", "d", "e"]);
/// engine.shutdown().unwrap();
/// ```
pub struct Engine {
    initialized: AtomicBool,
    buffers: BufferRegistry,
    events: EventRegistry,
    indentation: AtomicBool,
}

impl Engine {
    /// Creates an engine in the uninitialized state.
    pub fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            buffers: BufferRegistry::new(),
            events: EventRegistry::new(),
            indentation: AtomicBool::new(false),
        }
    }

    /// Initializes with a default buffer of `capacity` slots.
    ///
    /// A capacity of 0 creates no default buffer; the first buffer created
    /// later becomes the default. Larger capacities are clamped to
    /// [`MAX_EVENTS`](crate::ring_buffer::MAX_EVENTS).
    pub fn init(&self, capacity: usize) -> Result<()> {
        self.init_with(Config::builder().default_capacity(capacity).build())
    }

    /// Initializes from a [`Config`].
    ///
    /// # Errors
    ///
    /// * [`LogError::AlreadyInitialized`] if called again before
    ///   [`Engine::shutdown`]
    /// * any error of the default buffer creation, in which case the engine
    ///   stays uninitialized
    pub fn init_with(&self, config: Config) -> Result<()> {
        self.buffers.open()?;
        self.events.init();

        if config.default_capacity > 0 {
            let mut guard = self.buffers.lock(LockMode::Registry)?;
            if let Err(err) = guard.create_buffer(config.default_capacity) {
                tracing::warn!(error = %err, "default buffer creation failed");
                guard.destroy_all();
                guard.teardown();
                self.events.clear();
                return Err(err);
            }
        }

        self.indentation.store(config.indentation, Ordering::Relaxed);
        self.buffers.set_enabled(config.start_enabled);
        self.initialized.store(true, Ordering::Release);
        tracing::debug!(
            capacity = config.default_capacity,
            enabled = config.start_enabled,
            "ring logger initialized"
        );
        Ok(())
    }

    /// Destroys every buffer, clears the event registry and returns to the
    /// uninitialized state. [`Engine::init`] may be called again afterwards.
    pub fn shutdown(&self) -> Result<()> {
        self.ensure_initialized()?;
        let mut guard = self.buffers.lock(LockMode::Registry)?;
        self.initialized.store(false, Ordering::Release);
        self.buffers.set_enabled(false);
        guard.destroy_all();
        self.events.clear();
        guard.teardown();
        tracing::debug!("ring logger shut down");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(LogError::NotInitialized)
        }
    }

    fn buffer_for(&self, id: Option<BufferId>) -> Result<Arc<RingBuffer>> {
        match id {
            Some(id) => self.buffers.get(id).ok_or(LogError::UnknownBuffer(id)),
            None => self
                .buffers
                .default_buffer()
                .map(|(_, buffer)| buffer)
                .ok_or(LogError::NoDefaultBuffer),
        }
    }

    fn write_target(&self, id: Option<BufferId>) -> Result<Arc<RingBuffer>> {
        self.ensure_initialized()?;
        if !self.buffers.is_enabled() {
            return Err(LogError::Disabled);
        }
        self.buffer_for(id)
    }

    /// Records an event described by `fields` into buffer `id`, or into the
    /// default buffer for `None`.
    ///
    /// An omitted thread name is taken from the calling thread's context, and
    /// so is the indentation level. `ext` attaches an extended payload whose
    /// render callback is resolved before a slot is claimed.
    ///
    /// # Errors
    ///
    /// * [`LogError::NotInitialized`] or [`LogError::Disabled`]
    /// * [`LogError::UnknownBuffer`] / [`LogError::NoDefaultBuffer`]
    /// * [`LogError::InvalidEventType`] for an unregistered event type
    pub fn log_event(
        &self,
        id: Option<BufferId>,
        fields: &EventFields<'_>,
        ext: Option<(EventType, &[u8])>,
    ) -> Result<LogOutcome> {
        let buffer = self.write_target(id)?;
        let payload = match ext {
            Some((event_type, data)) => {
                let render = self
                    .events
                    .resolve(event_type)
                    .ok_or(LogError::InvalidEventType(event_type.get()))?;
                Some(PendingPayload {
                    event_type,
                    data,
                    render,
                })
            }
            None => None,
        };

        thread_context::with_context(|ctx| {
            let fields = EventFields {
                thread: fields.thread.or(ctx.name()),
                function: fields.function,
                line: fields.line,
                message: fields.message,
            };
            buffer.write(&fields, payload, ctx.indent())
        })
    }

    /// Records a message into the default buffer.
    pub fn log(&self, message: &str) -> Result<LogOutcome> {
        self.log_event(None, &EventFields::message(message), None)
    }

    /// Records a message into buffer `id`.
    pub fn log_id(&self, id: BufferId, message: &str) -> Result<LogOutcome> {
        self.log_event(Some(id), &EventFields::message(message), None)
    }

    /// Records a message with thread, function and line into the default
    /// buffer.
    pub fn log_long(
        &self,
        thread: Option<&str>,
        function: Option<&str>,
        line: u32,
        message: &str,
    ) -> Result<LogOutcome> {
        let fields = EventFields {
            thread,
            function,
            line,
            message,
        };
        self.log_event(None, &fields, None)
    }

    /// Records a message with thread, function and line into buffer `id`.
    pub fn log_long_id(
        &self,
        id: BufferId,
        thread: Option<&str>,
        function: Option<&str>,
        line: u32,
        message: &str,
    ) -> Result<LogOutcome> {
        let fields = EventFields {
            thread,
            function,
            line,
            message,
        };
        self.log_event(Some(id), &fields, None)
    }

    /// Records an extended event into the default buffer.
    pub fn log_ext(&self, event_type: EventType, data: &[u8], message: &str) -> Result<LogOutcome> {
        self.log_event(None, &EventFields::message(message), Some((event_type, data)))
    }

    /// Records an extended event into buffer `id`.
    pub fn log_ext_id(
        &self,
        id: BufferId,
        event_type: EventType,
        data: &[u8],
        message: &str,
    ) -> Result<LogOutcome> {
        self.log_event(Some(id), &EventFields::message(message), Some((event_type, data)))
    }

    /// Records an extended event with thread, function and line into the
    /// default buffer.
    pub fn log_ext_long(
        &self,
        thread: Option<&str>,
        function: Option<&str>,
        line: u32,
        event_type: EventType,
        data: &[u8],
        message: &str,
    ) -> Result<LogOutcome> {
        let fields = EventFields {
            thread,
            function,
            line,
            message,
        };
        self.log_event(None, &fields, Some((event_type, data)))
    }

    /// Records an extended event with thread, function and line into buffer
    /// `id`.
    #[allow(clippy::too_many_arguments)]
    pub fn log_ext_long_id(
        &self,
        id: BufferId,
        thread: Option<&str>,
        function: Option<&str>,
        line: u32,
        event_type: EventType,
        data: &[u8],
        message: &str,
    ) -> Result<LogOutcome> {
        let fields = EventFields {
            thread,
            function,
            line,
            message,
        };
        self.log_event(Some(id), &fields, Some((event_type, data)))
    }

    /// Records the calling thread's backtrace into the default buffer.
    pub fn log_backtrace(&self, message: &str) -> Result<LogOutcome> {
        self.log_backtrace_at(None, 0, message)
    }

    /// Records the calling thread's backtrace with the caller's function and
    /// line into the default buffer.
    pub fn log_backtrace_at(&self, function: Option<&str>, line: u32, message: &str) -> Result<LogOutcome> {
        self.write_target(None)?;
        let trace = capture_backtrace();
        self.log_ext_long(None, function, line, EventType::BACKTRACE, trace.as_bytes(), message)
    }

    /// Records `data` as a hex dump into the default buffer.
    pub fn log_hex_dump(&self, data: &[u8], message: &str) -> Result<LogOutcome> {
        self.log_ext(EventType::HEX_DUMP, data, message)
    }

    /// Creates a buffer and returns its id.
    ///
    /// A capacity of 0 means [`MAX_EVENTS`](crate::ring_buffer::MAX_EVENTS).
    pub fn create_buffer(&self, capacity: usize) -> Result<BufferId> {
        self.ensure_initialized()?;
        self.buffers.lock(LockMode::Registry)?.create_buffer(capacity)
    }

    /// Deletes a buffer other than the default one.
    pub fn delete_buffer(&self, id: BufferId) -> Result<()> {
        self.ensure_initialized()?;
        self.buffers.lock(LockMode::Registry)?.delete_buffer(id)
    }

    /// Resets every buffer, stopping at the first failure.
    pub fn reset(&self) -> Result<()> {
        self.ensure_initialized()?;
        self.buffers.lock(LockMode::Registry)?.reset_all()?;
        tracing::debug!("all buffers reset");
        Ok(())
    }

    /// Resets one buffer.
    pub fn reset_buffer(&self, id: BufferId) -> Result<()> {
        self.ensure_initialized()?;
        self.buffer_for(Some(id))?.reset()?;
        tracing::debug!(%id, "buffer reset");
        Ok(())
    }

    /// Registers an extended event render callback.
    pub fn register_event(&self, render: RenderFn) -> Result<EventType> {
        self.ensure_initialized()?;
        self.events.register(render)
    }

    /// The extended event registry.
    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    pub fn enable(&self) -> Result<()> {
        self.ensure_initialized()?;
        self.buffers.set_enabled(true);
        Ok(())
    }

    pub fn disable(&self) -> Result<()> {
        self.ensure_initialized()?;
        self.buffers.set_enabled(false);
        Ok(())
    }

    /// Flips logging on or off and returns the new state.
    pub fn toggle(&self) -> Result<bool> {
        self.ensure_initialized()?;
        Ok(self.buffers.toggle_enabled())
    }

    /// True when the engine is initialized and logging is enabled.
    pub fn status(&self) -> bool {
        self.is_initialized() && self.buffers.is_enabled()
    }

    /// Turns indentation of displayed events on or off.
    pub fn set_indentation(&self, enabled: bool) {
        self.indentation.store(enabled, Ordering::Relaxed);
    }

    pub fn indentation(&self) -> bool {
        self.indentation.load(Ordering::Relaxed)
    }

    fn display_options(&self) -> DisplayOptions {
        DisplayOptions {
            indentation: self.indentation(),
        }
    }

    pub fn lock_state(&self) -> LockState {
        self.buffers.state()
    }

    pub fn default_buffer_id(&self) -> Option<BufferId> {
        self.buffers.default_id()
    }

    /// Ids of every existing buffer, in order.
    pub fn buffer_ids(&self) -> Vec<BufferId> {
        self.buffers.occupied().into_iter().map(|(id, _)| id).collect()
    }

    /// The buffer `id`, or the default buffer for `None`.
    pub fn buffer(&self, id: Option<BufferId>) -> Result<Arc<RingBuffer>> {
        self.ensure_initialized()?;
        self.buffer_for(id)
    }

    /// Copies one buffer's events out in display order.
    pub fn snapshot(&self, id: Option<BufferId>) -> Result<BufferSnapshot> {
        Ok(self.buffer(id)?.snapshot())
    }

    /// Copies every buffer out at a single instant, under the full lock.
    ///
    /// Logging is disabled while the copies are taken and restored to its
    /// previous state afterwards.
    pub fn snapshot_all(&self) -> Result<Vec<(BufferId, BufferSnapshot)>> {
        self.ensure_initialized()?;
        let guard = self.buffers.lock(LockMode::Full)?;
        Ok(guard.snapshot_all())
    }

    /// Writes the default buffer's events to `out`.
    pub fn print_buffer(&self, out: &mut dyn Write) -> Result<()> {
        let snapshot = self.snapshot(None)?;
        display::write_events(out, &snapshot.events, self.display_options())?;
        Ok(())
    }

    /// Writes buffer `id`'s events to `out`.
    pub fn print_buffer_id(&self, out: &mut dyn Write, id: BufferId) -> Result<()> {
        let snapshot = self.snapshot(Some(id))?;
        display::write_events(out, &snapshot.events, self.display_options())?;
        Ok(())
    }

    /// Writes every buffer's events to `out`, from one consistent snapshot.
    pub fn print_all_buffers(&self, out: &mut dyn Write) -> Result<()> {
        let options = self.display_options();
        for (id, snapshot) in self.snapshot_all()? {
            display::write_snapshot(out, id, &snapshot, options)?;
        }
        Ok(())
    }

    /// Writes one status line per buffer id.
    pub fn print_buffer_list(&self, out: &mut dyn Write) -> Result<()> {
        self.ensure_initialized()?;
        display::write_buffer_list(out, &self.buffer_ids(), self.default_buffer_id())?;
        Ok(())
    }

    /// Writes the library status and, when initialized, every buffer's
    /// counters and slots in physical order.
    pub fn debug_print_all_buffers(
        &self,
        out: &mut dyn Write,
        show_status: bool,
        show_events: bool,
    ) -> Result<()> {
        display::write_library_status(out, self.is_initialized(), self.buffers.is_enabled())?;
        if !self.is_initialized() {
            writeln!(out, "The ring logger has not been initialized")?;
            return Ok(());
        }
        let dumps: Vec<DebugBuffer> = {
            let _guard = self.buffers.lock(LockMode::Registry)?;
            self.buffers
                .occupied()
                .into_iter()
                .map(|(id, buffer)| {
                    let (stats, slots) = buffer.inspect();
                    DebugBuffer { id, stats, slots }
                })
                .collect()
        };
        display::write_debug_buffers(out, &dumps, show_status, show_events, self.display_options())?;
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io;

    fn render_len(out: &mut dyn io::Write, data: &[u8]) -> io::Result<()> {
        write!(out, "len={}", data.len())
    }

    #[test]
    fn test_uninitialized_operations_fail() {
        let engine = Engine::new();
        assert_eq!(engine.log("x"), Err(LogError::NotInitialized));
        assert_eq!(engine.create_buffer(1), Err(LogError::NotInitialized));
        assert_eq!(engine.reset(), Err(LogError::NotInitialized));
        assert_eq!(engine.shutdown(), Err(LogError::NotInitialized));
        assert!(!engine.status());
    }

    #[test]
    fn test_double_init_rejected() {
        let engine = Engine::new();
        engine.init(4).unwrap();
        assert_eq!(engine.init(4), Err(LogError::AlreadyInitialized));
    }

    #[test]
    fn test_zero_capacity_means_no_default() {
        let engine = Engine::new();
        engine.init(0).unwrap();
        assert_eq!(engine.log("x"), Err(LogError::NoDefaultBuffer));
        let id = engine.create_buffer(0).unwrap();
        assert_eq!(engine.default_buffer_id(), Some(id));
        assert!(engine.log("x").unwrap().is_stored());
    }

    #[test]
    fn test_disabled_logging() {
        let engine = Engine::new();
        engine.init_with(Config::builder().default_capacity(2).start_enabled(false).build()).unwrap();
        assert_eq!(engine.log("x").unwrap_err().kind(), ErrorKind::Disabled);
        assert!(engine.toggle().unwrap());
        assert!(engine.log("x").unwrap().is_stored());
    }

    #[test]
    fn test_thread_name_falls_back_to_context() {
        let engine = Arc::new(Engine::new());
        engine.init(4).unwrap();
        let worker = Arc::clone(&engine);
        std::thread::spawn(move || {
            thread_context::thread_init("ctx-name");
            thread_context::increment_indent();
            worker.log("implicit").unwrap();
            worker.log_long(Some("explicit"), None, 0, "named").unwrap();
        })
        .join()
        .unwrap();

        let events = engine.snapshot(None).unwrap().events;
        assert_eq!(events[0].thread.as_deref(), Some("ctx-name"));
        assert_eq!(events[0].indent, 1);
        assert_eq!(events[1].thread.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_unregistered_event_type_rejected() {
        let engine = Engine::new();
        engine.init(2).unwrap();
        assert_eq!(
            engine.log_ext(EventType::DYNAMIC_START, b"x", "m"),
            Err(LogError::InvalidEventType(100))
        );
        assert_eq!(engine.log_ext(EventType::NONE, b"x", "m"), Err(LogError::InvalidEventType(0)));
        assert!(engine.snapshot(None).unwrap().events.is_empty());

        let ty = engine.register_event(render_len).unwrap();
        assert!(engine.log_ext(ty, b"abc", "m").unwrap().is_stored());
    }

    #[test]
    fn test_shutdown_then_reinit() {
        let engine = Engine::new();
        engine.init(2).unwrap();
        let ty = engine.register_event(render_len).unwrap();
        engine.log("before").unwrap();
        engine.shutdown().unwrap();

        assert_eq!(engine.lock_state(), LockState::Uninitialized);
        assert_eq!(engine.log("x"), Err(LogError::NotInitialized));
        assert!(!engine.events().is_valid(ty));

        engine.init(2).unwrap();
        assert!(engine.snapshot(None).unwrap().events.is_empty());
        assert_eq!(engine.register_event(render_len).unwrap(), EventType::DYNAMIC_START);
    }

    #[test]
    fn test_snapshot_all_restores_enabled_state() {
        let engine = Engine::new();
        engine.init(2).unwrap();
        engine.create_buffer(2).unwrap();
        engine.log("a").unwrap();
        let all = engine.snapshot_all().unwrap();
        assert_eq!(all.len(), 2);
        assert!(engine.status());
        assert_eq!(engine.lock_state(), LockState::Unlocked);
    }

    #[test]
    fn test_debug_print_uninitialized() {
        let engine = Engine::new();
        let mut out = Vec::new();
        engine.debug_print_all_buffers(&mut out, true, true).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("initialized       : false"));
        assert!(text.contains("has not been initialized"));
    }
}
