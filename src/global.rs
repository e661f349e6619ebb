//! Free-function API over the process-wide engine.
//!
//! Every function forwards to the same method on [`Engine`]. Libraries and
//! applications that want one logger per process use these; code that needs
//! isolated instances creates its own `Engine`.

use std::io::Write;
use std::sync::Arc;

use lazy_static::lazy_static;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;
use crate::event_registry::{EventType, RenderFn};
use crate::registry::BufferId;
use crate::ring_buffer::{BufferSnapshot, LogOutcome};

lazy_static! {
    /// The engine behind the free functions.
    ///
    /// Starts uninitialized; [`init`] or [`init_with`] activates it.
    static ref ENGINE: Arc<Engine> = Arc::new(Engine::new());
}

/// A shared handle to the process-wide engine.
///
/// # Examples
///
/// ```
/// # use ring_logger::global;
/// global::init(8).unwrap();
/// global::log("hello").unwrap();
///
/// let engine = global::engine();
/// assert_eq!(engine.snapshot(None).unwrap().events[0].message, "hello");
/// global::shutdown().unwrap();
/// ```
pub fn engine() -> Arc<Engine> {
    Arc::clone(&ENGINE)
}

/// Initializes the process-wide engine with a default buffer of `capacity`
/// slots (none for 0).
pub fn init(capacity: usize) -> Result<()> {
    ENGINE.init(capacity)
}

pub fn init_with(config: Config) -> Result<()> {
    ENGINE.init_with(config)
}

pub fn shutdown() -> Result<()> {
    ENGINE.shutdown()
}

pub fn log(message: &str) -> Result<LogOutcome> {
    ENGINE.log(message)
}

pub fn log_id(id: BufferId, message: &str) -> Result<LogOutcome> {
    ENGINE.log_id(id, message)
}

pub fn log_long(thread: Option<&str>, function: Option<&str>, line: u32, message: &str) -> Result<LogOutcome> {
    ENGINE.log_long(thread, function, line, message)
}

pub fn log_long_id(
    id: BufferId,
    thread: Option<&str>,
    function: Option<&str>,
    line: u32,
    message: &str,
) -> Result<LogOutcome> {
    ENGINE.log_long_id(id, thread, function, line, message)
}

pub fn log_ext(event_type: EventType, data: &[u8], message: &str) -> Result<LogOutcome> {
    ENGINE.log_ext(event_type, data, message)
}

pub fn log_ext_id(id: BufferId, event_type: EventType, data: &[u8], message: &str) -> Result<LogOutcome> {
    ENGINE.log_ext_id(id, event_type, data, message)
}

pub fn log_ext_long(
    thread: Option<&str>,
    function: Option<&str>,
    line: u32,
    event_type: EventType,
    data: &[u8],
    message: &str,
) -> Result<LogOutcome> {
    ENGINE.log_ext_long(thread, function, line, event_type, data, message)
}

#[allow(clippy::too_many_arguments)]
pub fn log_ext_long_id(
    id: BufferId,
    thread: Option<&str>,
    function: Option<&str>,
    line: u32,
    event_type: EventType,
    data: &[u8],
    message: &str,
) -> Result<LogOutcome> {
    ENGINE.log_ext_long_id(id, thread, function, line, event_type, data, message)
}

pub fn log_backtrace(message: &str) -> Result<LogOutcome> {
    ENGINE.log_backtrace(message)
}

pub fn log_hex_dump(data: &[u8], message: &str) -> Result<LogOutcome> {
    ENGINE.log_hex_dump(data, message)
}

pub fn create_buffer(capacity: usize) -> Result<BufferId> {
    ENGINE.create_buffer(capacity)
}

pub fn delete_buffer(id: BufferId) -> Result<()> {
    ENGINE.delete_buffer(id)
}

/// Resets every buffer.
pub fn reset() -> Result<()> {
    ENGINE.reset()
}

pub fn reset_buffer(id: BufferId) -> Result<()> {
    ENGINE.reset_buffer(id)
}

pub fn register_event(render: RenderFn) -> Result<EventType> {
    ENGINE.register_event(render)
}

pub fn enable() -> Result<()> {
    ENGINE.enable()
}

pub fn disable() -> Result<()> {
    ENGINE.disable()
}

pub fn toggle() -> Result<bool> {
    ENGINE.toggle()
}

pub fn status() -> bool {
    ENGINE.status()
}

pub fn set_indentation(enabled: bool) {
    ENGINE.set_indentation(enabled)
}

pub fn snapshot(id: Option<BufferId>) -> Result<BufferSnapshot> {
    ENGINE.snapshot(id)
}

pub fn print_buffer(out: &mut dyn Write) -> Result<()> {
    ENGINE.print_buffer(out)
}

pub fn print_buffer_id(out: &mut dyn Write, id: BufferId) -> Result<()> {
    ENGINE.print_buffer_id(out, id)
}

pub fn print_all_buffers(out: &mut dyn Write) -> Result<()> {
    ENGINE.print_all_buffers(out)
}

pub fn print_buffer_list(out: &mut dyn Write) -> Result<()> {
    ENGINE.print_buffer_list(out)
}

pub fn debug_print_all_buffers(out: &mut dyn Write, show_status: bool, show_events: bool) -> Result<()> {
    ENGINE.debug_print_all_buffers(out, show_status, show_events)
}
