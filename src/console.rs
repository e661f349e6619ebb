//! TCP inspection console.
//!
//! A background thread accepts one connection at a time and serves a small
//! line-based menu for listing, printing and resetting buffers and for
//! toggling logging. There is no authentication; bind it to a trusted
//! interface.
//!
//! While the listener runs, an empty marker file named
//! `<pid>_ringlog_console_<port>` exists in the configured marker directory
//! so tools can discover the port of a running process.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::ConsoleConfig;
use crate::display;
use crate::engine::Engine;
use crate::registry::BufferId;

/// Prompt written before every command read.
pub const PROMPT: &str = "ringlog> ";

const WELCOME: &str = "\n  >> Ring logger inspection console <<\n\n";

const MENU: &[&str] = &[
    "[1] List log buffers",
    "[2] Select active buffer",
    "[3] Print logs from the active buffer",
    "[4] Print logs from all buffers",
    "[5] Reset (clear) the active buffer",
    "[6] Reset (clear) all buffers",
    "[7] Enable/disable logging",
    "[8] Stop logging console",
    "[q] Close connection",
];

/// Handle to a running console listener.
pub struct ConsoleHandle {
    local_addr: SocketAddr,
    marker: PathBuf,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ConsoleHandle {
    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Path of the marker file announcing the listener.
    pub fn marker_path(&self) -> &Path {
        &self.marker
    }

    /// Blocks until a client stops the console with command `8`.
    pub fn wait(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("console thread panicked");
            }
        }
    }

    /// Stops the listener after the current connection, if any, closes.
    pub fn stop(self) {
        self.stop.store(true, Ordering::Release);
        // wake the blocking accept
        let _ = TcpStream::connect(loopback(self.local_addr));
        self.wait();
    }
}

fn loopback(addr: SocketAddr) -> SocketAddr {
    if addr.ip().is_unspecified() {
        SocketAddr::from((Ipv4Addr::LOCALHOST, addr.port()))
    } else {
        addr
    }
}

/// Starts the console on a background thread.
///
/// Binding and marker creation happen before this returns, so the handle's
/// address is immediately connectable.
///
/// # Errors
///
/// Fails if the address cannot be bound, the marker file cannot be created or
/// the thread cannot be spawned.
pub fn start(engine: Arc<Engine>, config: ConsoleConfig) -> io::Result<ConsoleHandle> {
    let listener = TcpListener::bind(config.bind)?;
    let local_addr = listener.local_addr()?;
    let marker = config
        .marker_dir
        .join(format!("{}_ringlog_console_{}", std::process::id(), local_addr.port()));
    File::create(&marker)?;

    let stop = Arc::new(AtomicBool::new(false));
    let thread = {
        let stop = Arc::clone(&stop);
        let marker = marker.clone();
        thread::Builder::new()
            .name("ringlog-console".into())
            .spawn(move || accept_loop(listener, &engine, &stop, &marker))
    };
    let thread = match thread {
        Ok(thread) => thread,
        Err(err) => {
            let _ = fs::remove_file(&marker);
            return Err(err);
        }
    };
    tracing::info!(addr = %local_addr, marker = %marker.display(), "inspection console started");

    Ok(ConsoleHandle {
        local_addr,
        marker,
        stop,
        thread: Some(thread),
    })
}

fn accept_loop(listener: TcpListener, engine: &Engine, stop: &AtomicBool, marker: &Path) {
    for stream in listener.incoming() {
        if stop.load(Ordering::Acquire) {
            break;
        }
        match stream {
            Ok(stream) => {
                let peer = stream.peer_addr().ok();
                tracing::debug!(?peer, "console connection opened");
                if let Err(err) = handle_stream(stream, engine, stop) {
                    tracing::warn!(error = %err, "console connection failed");
                }
                tracing::debug!(?peer, "console connection closed");
            }
            Err(err) => tracing::warn!(error = %err, "console accept failed"),
        }
        if stop.load(Ordering::Acquire) {
            break;
        }
    }
    if let Err(err) = fs::remove_file(marker) {
        tracing::warn!(error = %err, marker = %marker.display(), "could not remove console marker");
    }
    tracing::info!("inspection console stopped");
}

fn handle_stream(stream: TcpStream, engine: &Engine, stop: &AtomicBool) -> io::Result<()> {
    let reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);
    writer.write_all(WELCOME.as_bytes())?;
    serve(reader, &mut writer, engine, stop)
}

/// What the session loop should do after a command.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// Runs the command loop of one connection until it closes.
///
/// Returns on `q`, on `8` (after raising `stop`), at end of input and on any
/// I/O error.
pub fn serve<R: BufRead, W: Write>(mut reader: R, out: &mut W, engine: &Engine, stop: &AtomicBool) -> io::Result<()> {
    let mut session = Session { active: BufferId::new(0) };
    loop {
        for item in MENU {
            writeln!(out, "{}", item)?;
        }
        write!(out, "{}", PROMPT)?;
        out.flush()?;

        let Some(line) = read_command(&mut reader)? else {
            return Ok(());
        };
        let flow = match line.chars().next() {
            Some('8') => {
                stop.store(true, Ordering::Release);
                Flow::Close
            }
            Some('q') => Flow::Close,
            Some(command) => session.run(command, &mut reader, out, engine)?,
            None => Flow::Continue,
        };
        out.flush()?;
        if flow == Flow::Close {
            return Ok(());
        }
    }
}

fn read_command<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_owned()))
}

struct Session {
    active: BufferId,
}

impl Session {
    fn run<R: BufRead, W: Write>(
        &mut self,
        command: char,
        reader: &mut R,
        out: &mut W,
        engine: &Engine,
    ) -> io::Result<Flow> {
        let title = match command {
            '1' => "List log buffers",
            '2' => "Set the active buffer",
            '3' => "Show logs from buffer",
            '4' => "Show logs from all buffers",
            '5' => "Reset the active buffer",
            '6' => "Reset all log buffers",
            '7' => "Enable/Disable logging",
            _ => return Ok(Flow::Continue),
        };
        writeln!(out)?;
        display::write_banner(out, title)?;

        match command {
            '1' => {
                writeln!(out, "Active buffer: {}\n", self.active)?;
                let result = engine.print_buffer_list(out);
                report(out, result)?;
            }
            '2' => {
                write!(out, "Buffer id: ")?;
                out.flush()?;
                let Some(answer) = read_command(reader)? else {
                    return Ok(Flow::Close);
                };
                match answer.parse::<u8>() {
                    Ok(raw) => {
                        self.active = BufferId::new(raw);
                        writeln!(out, "The active buffer now is {}", self.active)?;
                    }
                    Err(_) => {
                        self.active = BufferId::new(0);
                        writeln!(out, "Error. Fallback to buffer 0.")?;
                    }
                }
            }
            '3' => {
                writeln!(out, "Active buffer: {}\n", self.active)?;
                let result = engine.print_buffer_id(out, self.active);
                report(out, result)?;
            }
            '4' => {
                let result = engine.print_all_buffers(out);
                report(out, result)?;
            }
            '5' => {
                writeln!(out, "Active buffer: {}\n", self.active)?;
                match engine.reset_buffer(self.active) {
                    Ok(()) => writeln!(out, "Reset has been completed.")?,
                    Err(err) => writeln!(out, "Error: {}", err)?,
                }
            }
            '6' => match engine.reset() {
                Ok(()) => writeln!(out, "Reset has been completed.")?,
                Err(err) => writeln!(out, "Error: {}", err)?,
            },
            _ => {
                let state = match engine.toggle() {
                    Ok(true) => "Enabled",
                    Ok(false) => "Disabled",
                    Err(err) => {
                        writeln!(out, "Error: {}", err)?;
                        "Disabled"
                    }
                };
                writeln!(out, "Current logging state: {}", state)?;
            }
        }
        display::write_footer(out)?;
        writeln!(out)?;
        Ok(Flow::Continue)
    }
}

fn report<W: Write>(out: &mut W, result: crate::error::Result<()>) -> io::Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) => writeln!(out, "Error: {}", err),
    }
}
