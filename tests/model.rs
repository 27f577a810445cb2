use lapring::{RingBuffer, State};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

fn assert_matches_model(state: &State, model: &VecDeque<u8>) {
    assert_eq!(model.len(), state.used_size);
    assert_eq!(state.capacity - model.len(), state.free_size);
    assert_eq!(model.is_empty(), state.empty);
    assert_eq!(model.len() == state.capacity, state.full);
    assert!(state.contiguous_used_size <= state.used_size);
    assert!(state.contiguous_free_size <= state.free_size);
}

fn run_model(capacity: usize, steps: usize, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let (mut producer, mut consumer) = RingBuffer::new(capacity).unwrap().split();
    let mut model = VecDeque::new();
    let mut counter = 0u8;

    for _ in 0..steps {
        if rng.gen_bool(0.5) {
            let len = rng.gen_range(0..=capacity + 2);
            let bytes: Vec<u8> = (0..len)
                .map(|_| {
                    counter = counter.wrapping_add(1);
                    counter
                })
                .collect();
            let written = producer.push_slice(&bytes);
            assert_eq!(written, len.min(capacity - model.len()));
            model.extend(&bytes[..written]);
            // bytes that did not fit are never produced
            counter = counter.wrapping_sub((len - written) as u8);
        } else {
            let mut buf = vec![0u8; rng.gen_range(0..=capacity + 2)];
            let read = consumer.pop_slice(&mut buf);
            assert_eq!(read, buf.len().min(model.len()));
            let expected: Vec<u8> = model.drain(..read).collect();
            assert_eq!(expected, buf[..read]);
        }
        assert_matches_model(&producer.state(), &model);
        assert_matches_model(&consumer.state(), &model);
    }
}

#[test]
fn should_match_reference_model() {
    for (capacity, seed) in [(1, 1), (2, 2), (8, 3), (64, 4), (1024, 5)] {
        run_model(capacity, 5_000, seed);
    }
}

#[test]
fn should_match_occupied_slices_with_model() {
    let mut rng = StdRng::seed_from_u64(42);
    let (mut producer, mut consumer) = RingBuffer::new(16).unwrap().split();
    let mut model = VecDeque::new();

    for _ in 0..2_000 {
        let bytes: Vec<u8> = (0..rng.gen_range(0..12)).map(|_| rng.gen_range(0..=255)).collect();
        let written = producer.push_slice(&bytes);
        model.extend(&bytes[..written]);

        let (first, second) = consumer.occupied_slices();
        let occupied: Vec<u8> = first.iter().chain(second.iter()).copied().collect();
        assert_eq!(model.iter().copied().collect::<Vec<u8>>(), occupied);

        let skip = rng.gen_range(0..=model.len());
        assert_eq!(skip, consumer.skip(skip));
        model.drain(..skip);
    }
}
