//! Text rendering of events and buffers.
//!
//! Everything here works on records already copied out of a buffer, so no
//! buffer lock is held while writing to the sink or while an extended event
//! callback runs.

use std::io::{self, Write};

use crate::efficient_clock::EventTimestamp;
use crate::registry::{BufferId, MAX_BUFFERS};
use crate::ring_buffer::{BufferSnapshot, BufferStats};
use crate::slot::EventRecord;

const RULE: &str = "--------------------------------------------------";
const BANNER_RULE: &str = "==================================================";

/// Options applied when rendering event lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayOptions {
    /// Indent each line by two spaces per nesting level.
    pub indentation: bool,
}

/// Formats a timestamp as local time, `MM/DD/YY HH:MM:SS.uuuuuu`.
pub fn format_timestamp(timestamp: EventTimestamp) -> String {
    match timestamp.to_local() {
        Some(local) => format!(
            "{}.{:06}",
            local.format("%m/%d/%y %H:%M:%S"),
            timestamp.subsec_micros()
        ),
        None => format!("{}.{:06}", timestamp.secs(), timestamp.subsec_micros()),
    }
}

fn or_dash(field: Option<&str>) -> &str {
    match field {
        Some(s) if !s.is_empty() => s,
        _ => "-",
    }
}

/// Formats the text line of one event, without a trailing newline.
///
/// # Examples
///
/// ```
/// # use ring_logger::display::{format_event_line, DisplayOptions};
/// # use ring_logger::ring_buffer::RingBuffer;
/// # use ring_logger::slot::EventFields;
/// let buffer = RingBuffer::new(4).unwrap();
/// let fields = EventFields { thread: Some("main"), function: None, line: 12, message: "ready" };
/// let _ = buffer.write(&fields, None, 0).unwrap();
///
/// let record = &buffer.snapshot().events[0];
/// let line = format_event_line(record, DisplayOptions::default());
/// assert!(line.ends_with(" [main:-:12]: ready"));
/// ```
pub fn format_event_line(record: &EventRecord, options: DisplayOptions) -> String {
    let indent = if options.indentation {
        usize::from(record.indent) * 2
    } else {
        0
    };
    let line = if record.line == 0 {
        "-".to_owned()
    } else {
        record.line.to_string()
    };
    format!(
        "{} {:indent$}[{}:{}:{}]: {}",
        format_timestamp(record.timestamp),
        "",
        or_dash(record.thread.as_deref()),
        or_dash(record.function.as_deref()),
        line,
        or_dash(Some(&record.message)),
        indent = indent,
    )
}

/// Writes one event: its line, then for extended events an empty line, the
/// callback output and a newline.
pub fn write_event(out: &mut dyn Write, record: &EventRecord, options: DisplayOptions) -> io::Result<()> {
    writeln!(out, "{}", format_event_line(record, options))?;
    if let Some(payload) = record.payload.as_ref().filter(|p| !p.is_empty()) {
        writeln!(out)?;
        payload.render(out)?;
        writeln!(out)?;
    }
    Ok(())
}

/// Writes every event of a snapshot in display order.
pub fn write_events(out: &mut dyn Write, events: &[EventRecord], options: DisplayOptions) -> io::Result<()> {
    for record in events {
        write_event(out, record, options)?;
    }
    Ok(())
}

/// Writes one status line per table id.
pub fn write_buffer_list(
    out: &mut dyn Write,
    occupied: &[BufferId],
    default_id: Option<BufferId>,
) -> io::Result<()> {
    for raw in 0..MAX_BUFFERS as u8 {
        let id = BufferId::new(raw);
        let state = if occupied.contains(&id) {
            "initialized"
        } else {
            "not initialized"
        };
        let marker = if default_id == Some(id) { " (default)" } else { "" };
        writeln!(out, "Log buffer #{}: {}{}", id, state, marker)?;
    }
    Ok(())
}

/// Writes the library status block.
pub fn write_library_status(out: &mut dyn Write, initialized: bool, enabled: bool) -> io::Result<()> {
    writeln!(out, "{}", RULE)?;
    writeln!(out, "                   Library status")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "initialized       : {}", initialized)?;
    writeln!(out, "enabled           : {}", enabled)
}

/// Writes the counters of one buffer.
pub fn write_buffer_status(out: &mut dyn Write, stats: &BufferStats) -> io::Result<()> {
    writeln!(out, "{}", RULE)?;
    writeln!(out, "                   Buffer status")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "Buffer capacity     : {}", stats.capacity)?;
    writeln!(out, "Buffer cursor       : {}", stats.cursor)?;
    writeln!(out, "Buffer wraps        : {}", stats.wraps)?;
    writeln!(out, "Buffer dropped      : {}", stats.dropped)?;
    writeln!(out, "Buffer slots in use : {}", stats.in_use)
}

/// Content of one table id for [`write_debug_buffers`].
#[derive(Debug, Clone)]
pub struct DebugBuffer {
    pub id: BufferId,
    pub stats: BufferStats,
    /// Every slot in physical order, free ones as `None`.
    pub slots: Vec<Option<EventRecord>>,
}

/// Writes the diagnostic dump of every table id.
///
/// `buffers` holds the occupied ids; the rest are reported as not
/// initialized.
pub fn write_debug_buffers(
    out: &mut dyn Write,
    buffers: &[DebugBuffer],
    show_status: bool,
    show_events: bool,
    options: DisplayOptions,
) -> io::Result<()> {
    writeln!(out, "{}", BANNER_RULE)?;
    writeln!(out, "                  Ring buffers")?;
    writeln!(out, "{}", BANNER_RULE)?;
    for raw in 0..MAX_BUFFERS as u8 {
        let id = BufferId::new(raw);
        writeln!(out, "Buffer index: {}", id)?;
        match buffers.iter().find(|b| b.id == id) {
            None => writeln!(out, "This buffer is not initialized.")?,
            Some(buffer) => {
                if show_status {
                    write_buffer_status(out, &buffer.stats)?;
                }
                if show_events {
                    writeln!(out, "{}", RULE)?;
                    writeln!(out, "Contents of this buffer")?;
                    writeln!(out, "{}", RULE)?;
                    for (index, slot) in buffer.slots.iter().enumerate() {
                        match slot {
                            Some(record) => {
                                writeln!(out, "slot {:3}: {}", index, format_event_line(record, options))?
                            }
                            None => writeln!(out, "slot {:3}: free", index)?,
                        }
                    }
                }
            }
        }
        writeln!(out, "{}", RULE)?;
    }
    Ok(())
}

/// Writes a snapshot's events, used for one buffer of a multi-buffer print.
pub fn write_snapshot(
    out: &mut dyn Write,
    id: BufferId,
    snapshot: &BufferSnapshot,
    options: DisplayOptions,
) -> io::Result<()> {
    writeln!(out, "Log buffer #{}:", id)?;
    write_events(out, &snapshot.events, options)
}

/// Writes a console banner: rule, title, rule.
pub fn write_banner(out: &mut dyn Write, title: &str) -> io::Result<()> {
    writeln!(out, "{}", BANNER_RULE)?;
    writeln!(out, "{}", title)?;
    writeln!(out, "{}", BANNER_RULE)
}

/// Writes the rule closing a console banner block.
pub fn write_footer(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{}", BANNER_RULE)
}
