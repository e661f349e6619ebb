//! Logging macros that fill in the caller's function name and line.
//!
//! All macros log into the default buffer of the process-wide engine and
//! evaluate to the `Result<LogOutcome>` of the underlying call.

/// Strips a `type_name` path down to the enclosing function's name.
#[doc(hidden)]
pub fn short_function_name(path: &'static str) -> &'static str {
    let mut path = path.strip_suffix("::__f").unwrap_or(path);
    while let Some(outer) = path.strip_suffix("::{{closure}}") {
        path = outer;
    }
    match path.rfind("::") {
        Some(pos) => &path[pos + 2..],
        None => path,
    }
}

/// Expands to the name of the enclosing function.
#[doc(hidden)]
#[macro_export]
macro_rules! __function_name {
    () => {{
        fn __f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::macros::short_function_name(type_name_of(__f))
    }};
}

/// Logs a message, or `format!` arguments, into the default buffer.
///
/// # Examples
///
/// ```
/// # use ring_logger::{global, ring_log};
/// global::init(8).unwrap();
///
/// fn connect(port: u16) {
///     ring_log!("connecting to port {}", port).unwrap();
/// }
/// connect(8080);
///
/// let event = &global::snapshot(None).unwrap().events[0];
/// assert_eq!(event.function.as_deref(), Some("connect"));
/// assert_eq!(event.message, "connecting to port 8080");
/// # global::shutdown().unwrap();
/// ```
#[macro_export]
macro_rules! ring_log {
    ($($arg:tt)+) => {
        $crate::global::log_long(
            None,
            Some($crate::__function_name!()),
            line!(),
            &format!($($arg)+),
        )
    };
}

/// Increments the calling thread's indentation, then logs `ENTRY`.
#[macro_export]
macro_rules! ring_entry {
    () => {{
        $crate::thread_context::increment_indent();
        $crate::global::log_long(None, Some($crate::__function_name!()), line!(), "ENTRY")
    }};
}

/// Logs `LEAVE`, then decrements the calling thread's indentation.
#[macro_export]
macro_rules! ring_leave {
    () => {{
        let result = $crate::global::log_long(None, Some($crate::__function_name!()), line!(), "LEAVE");
        $crate::thread_context::decrement_indent();
        result
    }};
}

/// Logs `LEAVE`, decrements the indentation and returns from the enclosing
/// function, with the value of the expression if one is given.
///
/// The expression is evaluated before `LEAVE` is logged. A failed `LEAVE`
/// log does not prevent the return.
///
/// # Examples
///
/// ```
/// # use ring_logger::{global, ring_entry, ring_return};
/// global::init(8).unwrap();
///
/// fn parse(input: &str) -> Option<u32> {
///     ring_entry!().unwrap();
///     if input.is_empty() {
///         ring_return!(None);
///     }
///     ring_return!(input.parse().ok())
/// }
/// assert_eq!(parse(""), None);
/// assert_eq!(parse("12"), Some(12));
///
/// let events = global::snapshot(None).unwrap().events;
/// let texts: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();
/// assert_eq!(texts, ["ENTRY", "LEAVE", "ENTRY", "LEAVE"]);
/// assert_eq!(ring_logger::thread_context::indent_level(), 0);
/// # global::shutdown().unwrap();
/// ```
#[macro_export]
macro_rules! ring_return {
    () => {{
        let _ = $crate::global::log_long(None, Some($crate::__function_name!()), line!(), "LEAVE");
        $crate::thread_context::decrement_indent();
        return;
    }};
    ($value:expr) => {{
        let value = $value;
        let _ = $crate::global::log_long(None, Some($crate::__function_name!()), line!(), "LEAVE");
        $crate::thread_context::decrement_indent();
        return value;
    }};
}

/// Logs the calling thread's backtrace, with an optional message.
#[macro_export]
macro_rules! ring_backtrace {
    () => {
        $crate::ring_backtrace!("Backtrace")
    };
    ($($arg:tt)+) => {
        $crate::global::engine().log_backtrace_at(
            Some($crate::__function_name!()),
            line!(),
            &format!($($arg)+),
        )
    };
}

/// Logs a byte slice as a hex dump, with an optional message.
#[macro_export]
macro_rules! ring_hex {
    ($data:expr) => {
        $crate::ring_hex!($data, "Hex dump")
    };
    ($data:expr, $($arg:tt)+) => {
        $crate::global::log_ext_long(
            None,
            Some($crate::__function_name!()),
            line!(),
            $crate::event_registry::EventType::HEX_DUMP,
            AsRef::<[u8]>::as_ref(&$data),
            &format!($($arg)+),
        )
    };
}

#[cfg(test)]
mod tests {
    use super::short_function_name;

    #[test]
    fn test_short_function_name() {
        assert_eq!(short_function_name("my_crate::net::connect::__f"), "connect");
        assert_eq!(short_function_name("my_crate::run::{{closure}}::{{closure}}::__f"), "run");
        assert_eq!(short_function_name("main::__f"), "main");
        assert_eq!(short_function_name("plain"), "plain");
    }

    #[test]
    fn test_function_name_macro() {
        fn outer_fn() -> &'static str {
            crate::__function_name!()
        }
        assert_eq!(outer_fn(), "outer_fn");
    }
}
