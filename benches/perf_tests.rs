use criterion::{black_box, criterion_group, criterion_main, Criterion};
use log::{info, LevelFilter};
use log4rs::{
    append::file::FileAppender,
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};
use ring_logger::{Engine, EventType, LogOutcome};
use std::sync::{Arc, Once};
use std::thread;
use std::time::Instant;
use tempfile::tempdir;

const CAPACITY: usize = 128;
const ITERATIONS: usize = 64 * 1024;
const THREADS: usize = 4;

static LOGGER_INIT: Once = Once::new();

#[derive(Debug)]
struct TestEvent {
    id: i32,
    active: bool,
    data: [u8; 16],
    description: &'static str,
}

impl std::fmt::Display for TestEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Event[id={}, active={}, data={:?}, desc={}]",
            self.id, self.active, self.data, self.description
        )
    }
}

const EVENT: TestEvent = TestEvent {
    id: 42,
    active: true,
    data: [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16],
    description: "CPU: 95%, Memory: 2.5GB, Network: 1.2Gbps",
};

fn setup_log4rs(log_file: &str) {
    LOGGER_INIT.call_once(|| {
        let logfile = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{d} - {m}{n}")))
            .append(true)
            .build(log_file)
            .unwrap();

        let config = Config::builder()
            .appender(Appender::builder().build("logfile", Box::new(logfile)))
            .build(Root::builder().appender("logfile").build(LevelFilter::Info))
            .unwrap();

        log4rs::init_config(config).unwrap();
    });
}

fn engine() -> Arc<Engine> {
    let engine = Arc::new(Engine::new());
    engine.init(CAPACITY).unwrap();
    engine
}

fn bench_single_thread(c: &mut Criterion) {
    let engine = engine();
    let mut group = c.benchmark_group("Ring logging");

    group.bench_function("log_long", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            let message = format!("Test perf: iteration={}, event={}", i, EVENT);
            black_box(engine.log_long(Some("bench"), Some("bench_single_thread"), line!(), &message))
        });
    });

    group.bench_function("log_hex_dump", |b| {
        b.iter(|| black_box(engine.log_ext(EventType::HEX_DUMP, &EVENT.data, "payload")));
    });

    group.finish();
}

fn bench_logging_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("Logging Comparison");
    group.sample_size(10);

    group.bench_function("ring_vs_traditional", |b| {
        b.iter(|| {
            let dir = tempdir().unwrap();
            let engine = engine();

            let ring_start = Instant::now();
            let workers: Vec<_> = (0..THREADS)
                .map(|t| {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || {
                        let mut dropped = 0usize;
                        for i in 0..ITERATIONS / THREADS {
                            let message = format!("Test perf: thread={}, iteration={}, event={}", t, i, EVENT);
                            if let Ok(LogOutcome::EventLocked) = engine.log(&message) {
                                dropped += 1;
                            }
                        }
                        dropped
                    })
                })
                .collect();
            let dropped: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
            let ring_duration = ring_start.elapsed();

            let traditional_log_file = dir.path().join("traditional.log").to_str().unwrap().to_string();
            setup_log4rs(&traditional_log_file);

            let traditional_start = Instant::now();
            for i in 0..ITERATIONS {
                info!("Test perf: iteration={}, event={}", i, EVENT);
            }
            let traditional_duration = traditional_start.elapsed();

            println!("\nPerformance comparison ({} events, {} threads):", ITERATIONS, THREADS);
            println!("Ring logging (in-memory): {:?}, dropped {}", ring_duration, dropped);
            println!("Traditional logging (with I/O): {:?}", traditional_duration);
            println!(
                "Speedup: {:.2}x",
                traditional_duration.as_secs_f64() / ring_duration.as_secs_f64()
            );

            black_box((ring_duration, traditional_duration))
        });
    });

    group.finish();
}

criterion_group!(benches, bench_single_thread, bench_logging_comparison);
criterion_main!(benches);
