use clap::Parser;
use lapring::{Consumer, Producer, RingBuffer, State};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// This example will spawn a producer thread that writes a counter byte stream in large chunks
/// and (after a delay) a consumer thread that reads it back in small chunks, both logging ring
/// buffer state before every transfer. Run with `RUST_LOG=debug` to see per transfer diagnostics.
#[derive(Debug, Parser)]
struct Args {
    /// Ring buffer capacity in bytes (power of two).
    #[arg(long, env = "LAPRING_CAPACITY", default_value_t = 1 << 14)]
    capacity: usize,
    /// Bytes written per transfer (defaults to a quarter of the capacity).
    #[arg(long, env = "LAPRING_WRITE_SIZE")]
    write_size: Option<usize>,
    /// Bytes read per transfer (defaults to 1/64 of the capacity).
    #[arg(long, env = "LAPRING_READ_SIZE")]
    read_size: Option<usize>,
    /// Delay before the consumer starts, in milliseconds.
    #[arg(long, env = "LAPRING_CONSUMER_DELAY_MS", default_value_t = 200)]
    consumer_delay_ms: u64,
    /// Total run time, in milliseconds.
    #[arg(long, env = "LAPRING_RUN_MS", default_value_t = 1000)]
    run_ms: u64,
}

fn log_state(side: &str, state: &State, n: usize) {
    tracing::debug!(
        side,
        write_position = state.write_position,
        read_position = state.read_position,
        write_index = state.write_index,
        read_index = state.read_index,
        full = state.full,
        empty = state.empty,
        used = state.used_size,
        free = state.free_size,
        contiguous_used = state.contiguous_used_size,
        contiguous_free = state.contiguous_free_size,
        n,
        "transfer"
    );
}

fn produce(mut producer: Producer, write_size: usize, stop: &AtomicBool) -> usize {
    let mut counter = 0u8;
    let mut total = 0;
    while !stop.load(Ordering::Acquire) {
        let state = producer.state();
        if state.free_size >= write_size {
            let n = write_size.min(state.contiguous_free_size);
            log_state("producer", &state, n);

            // publish in small steps so that the consumer can pick up partial progress
            let step = (n >> 7).max(1);
            let mut published = 0;
            while published < n {
                let len = step.min(n - published);
                let (first, _) = producer.vacant_slices();
                for b in &mut first[..len] {
                    *b = counter;
                    counter = counter.wrapping_add(1);
                }
                unsafe { producer.advance_write(len) };
                published += len;
                thread::yield_now();
            }
            total += n;
        }
        thread::sleep(Duration::from_millis(1));
    }
    info!(total, "producer stop requested, exiting");
    total
}

fn consume(mut consumer: Consumer, read_size: usize, stop: &AtomicBool) -> anyhow::Result<usize> {
    let mut expected = 0u8;
    let mut total = 0;
    while !stop.load(Ordering::Acquire) {
        let state = consumer.state();
        if state.used_size >= read_size {
            let n = read_size.min(state.contiguous_used_size);
            log_state("consumer", &state, n);

            let (first, _) = consumer.occupied_slices();
            for b in &first[..n] {
                anyhow::ensure!(*b == expected, "unexpected byte {b} at {total}, expected {expected}");
                expected = expected.wrapping_add(1);
            }
            let state = consumer.state();
            consumer.try_advance_read(n, &state)?;
            total += n;
        }
        thread::sleep(Duration::from_millis(1));
    }
    info!(total, "consumer stop requested, exiting");
    Ok(total)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let write_size = args.write_size.unwrap_or(args.capacity >> 2).max(1);
    let read_size = args.read_size.unwrap_or(args.capacity >> 6).max(1);
    info!(capacity = args.capacity, write_size, read_size, "starting");

    let (producer, consumer) = RingBuffer::new(args.capacity)?.split();
    let stop = Arc::new(AtomicBool::new(false));

    let producer_task = thread::spawn({
        let stop = stop.clone();
        move || produce(producer, write_size, &stop)
    });

    thread::sleep(Duration::from_millis(args.consumer_delay_ms));
    let consumer_task = thread::spawn({
        let stop = stop.clone();
        move || consume(consumer, read_size, &stop)
    });

    thread::sleep(Duration::from_millis(args.run_ms));
    stop.store(true, Ordering::Release);
    info!("requested workers to stop");

    let written = producer_task.join().map_err(|_| anyhow::anyhow!("producer panicked"))?;
    let read = consumer_task.join().map_err(|_| anyhow::anyhow!("consumer panicked"))??;
    if read > written {
        warn!(written, read, "consumer read more than was written");
    }
    info!(written, read, "workers joined");

    Ok(())
}
