use lapring::RingBuffer;
use std::hint;
use std::thread;

const TOTAL_BYTES: usize = 4 * 1024 * 1024;

#[test]
fn should_transfer_bytes_in_order_between_threads() {
    let (mut producer, mut consumer) = RingBuffer::new(256).unwrap().split();

    let producer_task = thread::spawn(move || {
        let mut sent = 0usize;
        let mut chunk = [0u8; 100];
        while sent < TOTAL_BYTES {
            let len = chunk.len().min(TOTAL_BYTES - sent);
            for (i, b) in chunk[..len].iter_mut().enumerate() {
                *b = (sent + i) as u8;
            }
            let written = producer.push_slice(&chunk[..len]);
            if written == 0 {
                hint::spin_loop();
            }
            sent += written;
        }
    });

    let consumer_task = thread::spawn(move || {
        let mut received = 0usize;
        let mut buf = [0u8; 77];
        while received < TOTAL_BYTES {
            let len = consumer.pop_slice(&mut buf);
            if len == 0 {
                hint::spin_loop();
            }
            for b in &buf[..len] {
                assert_eq!(received as u8, *b);
                received += 1;
            }
        }
        assert!(consumer.state().empty);
        received
    });

    producer_task.join().unwrap();
    assert_eq!(TOTAL_BYTES, consumer_task.join().unwrap());
}

#[test]
fn should_transfer_with_zero_copy_advances() {
    let (mut producer, mut consumer) = RingBuffer::new(64).unwrap().split();

    let producer_task = thread::spawn(move || {
        let mut counter = 0u8;
        let mut sent = 0usize;
        while sent < TOTAL_BYTES {
            let state = producer.state();
            let n = state.contiguous_free_size.min(TOTAL_BYTES - sent).min(13);
            if n == 0 {
                hint::spin_loop();
                continue;
            }
            let (first, _) = producer.vacant_slices();
            for b in &mut first[..n] {
                *b = counter;
                counter = counter.wrapping_add(1);
            }
            producer.try_advance_write(n, &state).unwrap();
            sent += n;
        }
    });

    let consumer_task = thread::spawn(move || {
        let mut expected = 0u8;
        let mut received = 0usize;
        while received < TOTAL_BYTES {
            let state = consumer.state();
            if state.empty {
                hint::spin_loop();
                continue;
            }
            let n = state.contiguous_used_size;
            let (first, _) = consumer.occupied_slices();
            for b in &first[..n] {
                assert_eq!(expected, *b);
                expected = expected.wrapping_add(1);
            }
            unsafe { consumer.advance_read(n) };
            received += n;
        }
        received
    });

    producer_task.join().unwrap();
    assert_eq!(TOTAL_BYTES, consumer_task.join().unwrap());
}
