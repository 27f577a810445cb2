use clap::{Parser, Subcommand};
use lapring::mmap::{MappedConsumer, MappedProducer};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::info;

/// This example shares a ring buffer between two processes through a memory mapped file.
/// Start the producer first (it creates the file), then the consumer in another terminal:
/// `cargo run --example ipc --features mmap -- producer` and
/// `cargo run --example ipc --features mmap -- consumer`.
#[derive(Debug, Parser)]
struct Args {
    /// Memory mapped file path.
    #[arg(long, env = "LAPRING_PATH", default_value = "lapring.dat")]
    path: PathBuf,
    #[command(subcommand)]
    role: Role,
}

#[derive(Debug, Subcommand)]
enum Role {
    /// Create the file and write a line of text every millisecond.
    Producer {
        /// Ring buffer capacity in bytes (power of two).
        #[arg(long, default_value_t = 1024)]
        capacity: usize,
    },
    /// Attach to the file and print received bytes.
    Consumer,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match args.role {
        Role::Producer { capacity } => {
            let mut producer = MappedProducer::create(&args.path, capacity)?;
            let mut sequence = 0u64;
            loop {
                let line = format!("message {sequence}\n");
                // only publish whole lines
                if producer.state().free_size >= line.len() {
                    producer.push_slice(line.as_bytes());
                    sequence += 1;
                }
                thread::sleep(Duration::from_millis(1));
            }
        }
        Role::Consumer => {
            // only one consumer process is started per file
            let mut consumer = unsafe { MappedConsumer::open(&args.path)? };
            let mut buf = [0u8; 4096];
            loop {
                let len = consumer.pop_slice(&mut buf);
                if len > 0 {
                    info!(len, "{}", String::from_utf8_lossy(&buf[..len]).trim_end());
                }
                thread::sleep(Duration::from_millis(10));
            }
        }
    }
}
