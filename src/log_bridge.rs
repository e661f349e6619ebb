//! Routes records of the `log` facade into the default ring buffer.
//!
//! Applications already instrumented with `log::info!` and friends can keep
//! their call sites and inspect the output through the ring logger. The record
//! target fills the function field, the source line the line field, and the
//! message is prefixed with the level.

use std::sync::Arc;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::engine::Engine;
use crate::global;

/// A `log::Log` implementation writing into an [`Engine`].
pub struct RingLogBridge {
    engine: Arc<Engine>,
    level: LevelFilter,
}

impl RingLogBridge {
    pub fn new(engine: Arc<Engine>, level: LevelFilter) -> Self {
        Self { engine, level }
    }
}

impl Log for RingLogBridge {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level && self.engine.status()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = format!("{:<5} {}", record.level(), record.args());
        // a full or disabled logger drops the record, the facade has no error channel
        let _ = self.engine.log_long(
            None,
            Some(record.target()),
            record.line().unwrap_or(0),
            &message,
        );
    }

    fn flush(&self) {}
}

/// Installs a bridge to the process-wide engine as the `log` logger.
///
/// # Errors
///
/// Fails if another `log` logger has already been installed.
pub fn install(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(RingLogBridge::new(global::engine(), level)))?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn test_bridge_stores_records() {
        let engine = Arc::new(Engine::new());
        engine.init(4).unwrap();
        let bridge = RingLogBridge::new(Arc::clone(&engine), LevelFilter::Info);

        bridge.log(
            &Record::builder()
                .level(Level::Warn)
                .target("net::socket")
                .line(Some(17))
                .args(format_args!("retrying {}", 3))
                .build(),
        );
        bridge.log(
            &Record::builder()
                .level(Level::Debug)
                .target("net::socket")
                .args(format_args!("filtered"))
                .build(),
        );

        let events = engine.snapshot(None).unwrap().events;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].function.as_deref(), Some("net::socket"));
        assert_eq!(events[0].line, 17);
        assert_eq!(events[0].message, "WARN  retrying 3");
    }

    #[test]
    fn test_bridge_disabled_when_engine_is_off() {
        let engine = Arc::new(Engine::new());
        let bridge = RingLogBridge::new(Arc::clone(&engine), LevelFilter::Trace);
        let metadata = Metadata::builder().level(Level::Error).build();
        assert!(!bridge.enabled(&metadata));
        engine.init(2).unwrap();
        assert!(bridge.enabled(&metadata));
    }
}
