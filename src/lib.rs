//! # Ring Logger
//!
//! An in-process event logger that records diagnostic events into
//! fixed-capacity circular buffers kept in memory, for inspection while the
//! process keeps running.
//!
//! * **Bounded memory**: every buffer has a fixed number of slots and wraps,
//!   overwriting its oldest events
//! * **Concurrent writers**: threads only serialize on a short cursor update;
//!   populating a slot happens in parallel
//! * **Never blocks the caller**: a writer that wraps onto a slot another
//!   thread is still filling drops its event and reports
//!   [`LogOutcome::EventLocked`]
//! * **Extended events**: binary payloads rendered later by a registered
//!   callback, with built-in backtrace and hex-dump types
//!
//! ## Main Components
//!
//! * `ring_buffer`: the circular buffer and its slot claim protocol
//! * `registry`: up to five buffers, the default buffer and the coordination
//!   lock for buffer-wide operations
//! * `event_registry`: extended event types and their render callbacks
//! * `engine` / `global`: the logging API, as an object or as free functions
//!   over a process-wide instance
//! * `display`: text rendering of events and buffers
//! * `console`: a TCP console for inspecting buffers of a live process
//!
//! ## Quick Start
//!
//! ```
//! use ring_logger::{global, ring_entry, ring_leave, ring_log};
//!
//! global::init(64).unwrap();
//! ring_logger::thread_init("main");
//!
//! fn handle(request: u32) {
//!     ring_entry!().unwrap();
//!     ring_log!("handling request {}", request).unwrap();
//!     ring_leave!().unwrap();
//! }
//! handle(7);
//!
//! let mut out = Vec::new();
//! global::print_buffer(&mut out).unwrap();
//! let text = String::from_utf8(out).unwrap();
//! assert!(text.contains("[main:handle:"));
//! assert!(text.contains("]: handling request 7"));
//! # global::shutdown().unwrap();
//! ```

pub mod config;
pub mod console;
pub mod display;
pub mod efficient_clock;
pub mod engine;
pub mod error;
pub mod event_registry;
pub mod global;
pub mod log_bridge;
#[macro_use]
pub mod macros;
pub mod registry;
pub mod ring_buffer;
pub mod slot;
pub mod thread_context;

pub use config::{Config, ConsoleConfig};
pub use engine::Engine;
pub use error::{ErrorKind, LogError, Result};
pub use event_registry::{EventType, RenderFn};
pub use registry::{BufferId, LockState, MAX_BUFFERS};
pub use ring_buffer::{LogOutcome, MAX_EVENTS};
pub use slot::EventRecord;
pub use thread_context::{decrement_indent, increment_indent, thread_init};
