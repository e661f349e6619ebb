use ring_logger::console::{self, PROMPT};
use ring_logger::{ConsoleConfig, Engine};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn local_config(marker_dir: &std::path::Path) -> ConsoleConfig {
    ConsoleConfig::builder()
        .bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .marker_dir(marker_dir)
        .build()
}

fn connect(addr: SocketAddr) -> (BufReader<TcpStream>, TcpStream) {
    let stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    (BufReader::new(stream.try_clone().unwrap()), stream)
}

/// Reads until the prompt is the last thing received.
fn read_until_prompt(reader: &mut BufReader<TcpStream>) -> String {
    let mut received = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        match reader.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {
                received.push(byte[0]);
                if received.ends_with(PROMPT.as_bytes()) || received.ends_with(b"Buffer id: ") {
                    break;
                }
            }
            Err(err) => panic!("console read failed: {}", err),
        }
    }
    String::from_utf8(received).unwrap()
}

#[test]
fn test_console_session_over_tcp() {
    let dir = tempdir().unwrap();
    let engine = Arc::new(Engine::new());
    engine.init(8).unwrap();
    engine.log("visible over tcp").unwrap();

    let handle = console::start(Arc::clone(&engine), local_config(dir.path())).unwrap();
    let addr = handle.local_addr();
    let marker = handle.marker_path().to_path_buf();
    assert!(marker.exists(), "Marker file should exist while listening");
    let expected_name = format!("{}_ringlog_console_{}", std::process::id(), addr.port());
    assert_eq!(marker.file_name().unwrap().to_str().unwrap(), expected_name);

    let (mut reader, mut writer) = connect(addr);
    let welcome = read_until_prompt(&mut reader);
    assert!(welcome.contains(">> Ring logger inspection console <<"));
    assert!(welcome.contains("[1] List log buffers"));

    writer.write_all(b"1\n").unwrap();
    let listing = read_until_prompt(&mut reader);
    assert!(listing.contains("Log buffer #0: initialized (default)"));

    writer.write_all(b"3\n").unwrap();
    let logs = read_until_prompt(&mut reader);
    println!("{}", logs);
    assert!(logs.contains("]: visible over tcp"));

    writer.write_all(b"7\n").unwrap();
    let toggled = read_until_prompt(&mut reader);
    assert!(toggled.contains("Current logging state: Disabled"));
    assert!(!engine.status());

    writer.write_all(b"8\n").unwrap();
    let mut rest = String::new();
    reader.read_to_string(&mut rest).unwrap();

    handle.wait();
    assert!(!marker.exists(), "Marker file should be removed on stop");
}

#[test]
fn test_quit_keeps_listener_running() {
    let dir = tempdir().unwrap();
    let engine = Arc::new(Engine::new());
    engine.init(4).unwrap();
    let handle = console::start(Arc::clone(&engine), local_config(dir.path())).unwrap();
    let addr = handle.local_addr();

    for _ in 0..2 {
        let (mut reader, mut writer) = connect(addr);
        read_until_prompt(&mut reader);
        writer.write_all(b"q\n").unwrap();
        let mut line = String::new();
        assert_eq!(reader.read_line(&mut line).unwrap(), 0, "Server should close after q");
    }

    let marker = handle.marker_path().to_path_buf();
    handle.stop();
    assert!(!marker.exists());
}

#[test]
fn test_select_buffer_prompt() {
    let dir = tempdir().unwrap();
    let engine = Arc::new(Engine::new());
    engine.init(4).unwrap();
    let side = engine.create_buffer(4).unwrap();
    engine.log_id(side, "on the side").unwrap();
    let handle = console::start(Arc::clone(&engine), local_config(dir.path())).unwrap();

    let (mut reader, mut writer) = connect(handle.local_addr());
    read_until_prompt(&mut reader);
    writer.write_all(b"2\n").unwrap();
    assert!(read_until_prompt(&mut reader).ends_with("Buffer id: "));
    writer.write_all(format!("{}\n", side).as_bytes()).unwrap();
    assert!(read_until_prompt(&mut reader).contains(&format!("The active buffer now is {}", side)));

    writer.write_all(b"3\n").unwrap();
    assert!(read_until_prompt(&mut reader).contains("]: on the side"));
    writer.write_all(b"q\n").unwrap();

    handle.stop();
}
