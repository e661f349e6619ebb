use ring_logger::display::format_timestamp;
use ring_logger::efficient_clock::EventTimestamp;
use ring_logger::ring_buffer::RingBuffer;
use ring_logger::slot::EventFields;
use std::thread;
use std::time::Duration;

#[test]
fn test_slot_timestamps_follow_write_order() {
    let buffer = RingBuffer::new(4).unwrap();
    let _ = buffer.write(&EventFields::message("first"), None, 0).unwrap();
    thread::sleep(Duration::from_millis(2));
    let _ = buffer.write(&EventFields::message("second"), None, 0).unwrap();

    let events = buffer.snapshot().events;
    let gap = events[1].timestamp.as_micros().saturating_sub(events[0].timestamp.as_micros());
    println!("gap between writes: {} us", gap);
    assert!(events[1].timestamp > events[0].timestamp, "Later write should carry a later timestamp");
    assert!(gap < 5_000_000, "Writes a few milliseconds apart should not be seconds apart");
}

#[test]
fn test_reset_clears_timestamps() {
    let buffer = RingBuffer::new(2).unwrap();
    let _ = buffer.write(&EventFields::message("x"), None, 0).unwrap();
    buffer.reset().unwrap();
    let _ = buffer.write(&EventFields::message("y"), None, 0).unwrap();

    let slots = buffer.slots();
    assert!(slots[0].as_ref().unwrap().timestamp > EventTimestamp::ZERO);
    assert!(slots[1].is_none(), "Reset slot should stay free");
}

#[test]
fn test_microsecond_suffix_is_zero_padded() {
    let text = format_timestamp(EventTimestamp::from_micros(86_400_000_000 * 365 + 7));
    println!("formatted: {}", text);
    assert!(text.ends_with(".000007"));
    assert_eq!(text.matches('/').count(), 2);
    assert_eq!(text.matches(':').count(), 2);
}

#[test]
fn test_current_time_renders_current_year() {
    let now = EventTimestamp::now();
    let local = now.to_local().expect("current time should be representable");
    let text = format_timestamp(now);
    let year = local.format("%y").to_string();
    assert_eq!(&text[6..8], year, "Two-digit year should follow month and day");
}
