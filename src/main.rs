//! Ring logger demo.
//!
//! Spawns worker threads that log into the ring buffers, then prints the
//! buffers. With `--console` the inspection console stays up until a client
//! sends command `8`.
//!
//! ```bash
//! # four workers, 200 events each, default buffer of 32 slots
//! ring_logger --threads 4 --events 200 --capacity 32
//!
//! # keep the process inspectable on port 7000
//! ring_logger --console --port 7000
//! ```

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use ring_logger::{
    console, global, ring_backtrace, ring_entry, ring_hex, ring_leave, ring_log, BufferId, Config,
    ConsoleConfig, Engine, LogOutcome,
};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "ring_logger")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Concurrent ring-buffer event logger demo")]
struct Cli {
    /// Capacity of the default buffer (0 = no default buffer)
    #[arg(short, long, default_value = "32")]
    capacity: usize,

    /// Number of worker threads
    #[arg(short, long, default_value = "4")]
    threads: usize,

    /// Events logged by each worker
    #[arg(short, long, default_value = "100")]
    events: usize,

    /// Render nesting depth as indentation
    #[arg(long)]
    indent: bool,

    /// Print the debug dump instead of the buffers
    #[arg(long)]
    debug: bool,

    /// Start the inspection console and wait for it to be stopped
    #[arg(long)]
    console: bool,

    /// Console port (0 picks a free one)
    #[arg(long, default_value = "0")]
    port: u16,

    /// Verbose mode (show internal logs)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (writer, _guard) = tracing_appender::non_blocking(io::stderr());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("ring_logger=debug")
        } else {
            EnvFilter::new("ring_logger=info")
        }
    });
    fmt().with_env_filter(filter).with_writer(writer).with_target(false).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "demo failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::from_env();
    config.default_capacity = cli.capacity;
    config.indentation |= cli.indent;
    global::init_with(config)?;

    let side = global::create_buffer(8)?;
    tracing::info!(capacity = cli.capacity, side = %side, "ring logger ready");

    let engine = global::engine();
    let workers: Vec<_> = (0..cli.threads)
        .map(|n| {
            let engine = Arc::clone(&engine);
            let events = cli.events;
            thread::Builder::new()
                .name(format!("worker-{}", n))
                .spawn(move || worker(&engine, n, events, side))
        })
        .collect::<Result<_, _>>()?;

    let mut stored = 0;
    let mut dropped = 0;
    for handle in workers {
        match handle.join() {
            Ok((s, d)) => {
                stored += s;
                dropped += d;
            }
            Err(_) => tracing::warn!("worker panicked"),
        }
    }
    tracing::info!(stored, dropped, "workers finished");

    nested_call(3);
    let _ = ring_hex!(b"\x00\x01ring logger\xff")?;
    let _ = ring_backtrace!()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.debug {
        global::debug_print_all_buffers(&mut out, true, true)?;
    } else {
        global::print_buffer_list(&mut out)?;
        writeln!(out)?;
        global::print_all_buffers(&mut out)?;
    }
    out.flush()?;
    drop(out);

    if cli.console {
        let config = ConsoleConfig::builder().port(cli.port).build();
        let handle = console::start(global::engine(), config)?;
        println!("Inspection console listening on {}", handle.local_addr());
        handle.wait();
    }

    global::shutdown()?;
    Ok(())
}

fn worker(engine: &Engine, n: usize, events: usize, side: BufferId) -> (usize, usize) {
    ring_logger::thread_init(&format!("worker-{}", n));
    let mut stored = 0;
    let mut dropped = 0;
    for i in 0..events {
        let message = format!("event {} from worker {}", i, n);
        let outcome = if i % 10 == 0 {
            engine.log_long_id(side, None, Some("worker"), line!(), &message)
        } else {
            engine.log_long(None, Some("worker"), line!(), &message)
        };
        match outcome {
            Ok(LogOutcome::Stored) => stored += 1,
            Ok(LogOutcome::EventLocked) => dropped += 1,
            Err(err) => {
                tracing::warn!(error = %err, "log call rejected");
                break;
            }
        }
    }
    (stored, dropped)
}

fn nested_call(depth: u32) {
    let _ = ring_entry!();
    let _ = ring_log!("depth {}", depth);
    if depth > 1 {
        nested_call(depth - 1);
    }
    let _ = ring_leave!();
}
