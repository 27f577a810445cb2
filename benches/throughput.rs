use lapring::{Consumer, Producer, RingBuffer};
use std::hint;
use std::time::{Duration, Instant};

const MSG_LENGTH_BYTES: usize = 32;

const RING_BUFFER_SIZE: usize = 1024 * 1024 * 64;

const PAYLOAD: [u8; MSG_LENGTH_BYTES] = [0u8; MSG_LENGTH_BYTES];

const REPORT_INTERVAL_BYTES: usize = 1024 * 1024 * 1024;

struct Publisher {
    producer: Producer,
}

impl Publisher {
    fn new(producer: Producer) -> Self {
        Self { producer }
    }

    fn run(&mut self) {
        loop {
            if self.producer.push_slice(&PAYLOAD) == 0 {
                hint::spin_loop();
            }
        }
    }
}

struct Subscriber {
    consumer: Consumer,
    byte_count: usize,
    start_time: Instant,
}

impl Subscriber {
    fn new(consumer: Consumer) -> Self {
        Self {
            consumer,
            byte_count: 0,
            start_time: Instant::now(),
        }
    }

    fn run(&mut self) {
        loop {
            // consume whatever is available without copying
            let state = self.consumer.state();
            if state.empty {
                hint::spin_loop();
                continue;
            }
            let len = state.contiguous_used_size;
            unsafe { self.consumer.advance_read(len) };
            self.byte_count += len;

            if self.byte_count >= REPORT_INTERVAL_BYTES {
                let elapsed = self.start_time.elapsed().as_nanos() as u64;
                let bytes_per_sec = (self.byte_count as u64 * 1_000_000_000) / elapsed;

                println!(
                    "{}ms {} MiB/sec {} msgs/sec",
                    Duration::from_nanos(elapsed).as_millis(),
                    bytes_per_sec / (1024 * 1024),
                    bytes_per_sec / MSG_LENGTH_BYTES as u64,
                );
                self.byte_count = 0;
                self.start_time = Instant::now();
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let (producer, consumer) = RingBuffer::new(RING_BUFFER_SIZE)?.split();

    let publisher_task = std::thread::spawn(move || Publisher::new(producer).run());
    let subscriber_task = std::thread::spawn(move || Subscriber::new(consumer).run());

    publisher_task.join().unwrap();
    subscriber_task.join().unwrap();

    Ok(())
}
