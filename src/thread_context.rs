//! Per-thread name and indentation bookkeeping.
//!
//! Every thread owns a [`ThreadContext`] in thread-local storage. It is
//! created on first use with an empty name and zero indentation, so calling
//! [`thread_init`] is optional. Log calls that omit the thread name use the
//! name stored here, and every populated slot copies the current indentation.

use std::cell::RefCell;

use crate::slot::FixedStr;

/// Maximum number of bytes kept from a thread display name.
pub const THREAD_CONTEXT_NAME_LEN: usize = 15;

/// Name and nesting depth of the current thread.
#[derive(Debug, Clone, Default)]
pub struct ThreadContext {
    name: FixedStr<THREAD_CONTEXT_NAME_LEN>,
    indent: u8,
}

impl ThreadContext {
    /// The thread display name, `None` while unset.
    pub fn name(&self) -> Option<&str> {
        self.name.get()
    }

    /// The current indentation depth.
    pub fn indent(&self) -> u8 {
        self.indent
    }
}

thread_local! {
    static CONTEXT: RefCell<ThreadContext> = RefCell::new(ThreadContext::default());
}

/// Sets the display name of the calling thread and resets its indentation.
///
/// Names longer than [`THREAD_CONTEXT_NAME_LEN`] bytes are truncated.
///
/// # Examples
///
/// ```
/// # use ring_logger::thread_context::{thread_init, thread_name, increment_indent, indent_level};
/// increment_indent();
/// thread_init("worker-1");
///
/// assert_eq!(thread_name().as_deref(), Some("worker-1"));
/// assert_eq!(indent_level(), 0);
/// ```
pub fn thread_init(name: &str) {
    CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        ctx.name.set(name);
        ctx.indent = 0;
    });
}

/// Returns a copy of the calling thread's display name.
pub fn thread_name() -> Option<String> {
    CONTEXT.with(|ctx| ctx.borrow().name().map(str::to_owned))
}

/// Returns the calling thread's indentation depth.
pub fn indent_level() -> u8 {
    CONTEXT.with(|ctx| ctx.borrow().indent)
}

/// Increases the indentation depth, saturating at `u8::MAX`.
pub fn increment_indent() {
    CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        ctx.indent = ctx.indent.saturating_add(1);
    });
}

/// Decreases the indentation depth, saturating at zero.
pub fn decrement_indent() {
    CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        ctx.indent = ctx.indent.saturating_sub(1);
    });
}

/// Runs `f` with a shared borrow of the calling thread's context.
///
/// Used on the write path to read the name and indentation without copying
/// the name out of thread-local storage.
pub(crate) fn with_context<R>(f: impl FnOnce(&ThreadContext) -> R) -> R {
    CONTEXT.with(|ctx| f(&ctx.borrow()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_defaults_on_first_use() {
        thread::spawn(|| {
            assert_eq!(thread_name(), None);
            assert_eq!(indent_level(), 0);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_indent_saturates_at_zero() {
        thread::spawn(|| {
            decrement_indent();
            assert_eq!(indent_level(), 0);
            increment_indent();
            increment_indent();
            decrement_indent();
            assert_eq!(indent_level(), 1);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_indent_saturates_at_max() {
        thread::spawn(|| {
            for _ in 0..300 {
                increment_indent();
            }
            assert_eq!(indent_level(), u8::MAX);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_name_is_truncated_and_resets_indent() {
        thread::spawn(|| {
            increment_indent();
            thread_init("a-very-long-thread-name");
            assert_eq!(thread_name().as_deref(), Some("a-very-long-thr"));
            assert_eq!(indent_level(), 0);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_context_is_per_thread() {
        thread::spawn(|| {
            thread_init("outer");
            thread::spawn(|| assert_eq!(thread_name(), None))
                .join()
                .unwrap();
            assert_eq!(thread_name().as_deref(), Some("outer"));
        })
        .join()
        .unwrap();
    }
}
