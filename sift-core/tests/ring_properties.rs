//! Property-based tests for the ring buffer against a queue model

use std::collections::VecDeque;

use proptest::prelude::*;
use sift_core::RingBuffer;

const CAPACITY: usize = 16;

#[derive(Debug, Clone)]
enum Op {
    Append(Vec<u8>),
    AppendUpto(Vec<u8>),
    Consume(usize),
    Skip(usize),
    Peek(usize, usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..24).prop_map(Op::Append),
        prop::collection::vec(any::<u8>(), 0..24).prop_map(Op::AppendUpto),
        (0usize..24).prop_map(Op::Consume),
        (0usize..24).prop_map(Op::Skip),
        (0usize..24, 0usize..24).prop_map(|(offset, len)| Op::Peek(offset, len)),
    ]
}

proptest! {
    #[test]
    fn ring_matches_queue_model(ops in prop::collection::vec(op_strategy(), 1..64)) {
        let mut ring = RingBuffer::new(CAPACITY);
        let mut model: VecDeque<u8> = VecDeque::new();

        for op in ops {
            match op {
                Op::Append(data) => {
                    let fits = data.len() <= CAPACITY - model.len();
                    match ring.append(&data) {
                        Ok(()) => {
                            prop_assert!(fits);
                            model.extend(data.iter().copied());
                        }
                        Err(_) => prop_assert!(!fits),
                    }
                }
                Op::AppendUpto(data) => {
                    let expect = data.len().min(CAPACITY - model.len());
                    let copied = ring.append_upto(&data);
                    prop_assert_eq!(copied, expect);
                    model.extend(data[..copied].iter().copied());
                }
                Op::Consume(n) => {
                    let mut out = vec![0u8; n];
                    match ring.consume_into(&mut out) {
                        Ok(()) => {
                            prop_assert!(n <= model.len());
                            let expect: Vec<u8> = model.drain(..n).collect();
                            prop_assert_eq!(out, expect);
                        }
                        Err(_) => prop_assert!(n > model.len()),
                    }
                }
                Op::Skip(n) => {
                    match ring.skip(n) {
                        Ok(()) => {
                            prop_assert!(n <= model.len());
                            model.drain(..n);
                        }
                        Err(_) => prop_assert!(n > model.len()),
                    }
                }
                Op::Peek(offset, len) => {
                    let mut out = vec![0u8; len];
                    match ring.peek_into(offset, &mut out) {
                        Ok(()) => {
                            prop_assert!(offset + len <= model.len());
                            let expect: Vec<u8> =
                                model.iter().skip(offset).take(len).copied().collect();
                            prop_assert_eq!(out, expect);
                        }
                        Err(_) => prop_assert!(offset + len > model.len()),
                    }
                }
            }

            prop_assert_eq!(ring.len(), model.len());
            prop_assert_eq!(ring.free_space(), CAPACITY - model.len());
        }
    }

    #[test]
    fn interleaved_appends_preserve_fifo_order(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..8), 1..32)
    ) {
        let mut ring = RingBuffer::new(CAPACITY);
        let mut fed: Vec<u8> = Vec::new();
        let mut drained: Vec<u8> = Vec::new();

        for chunk in &chunks {
            let copied = ring.append_upto(chunk);
            fed.extend_from_slice(&chunk[..copied]);

            // Drain roughly half of what is buffered to force wraparound.
            let take = ring.len() / 2;
            let mut out = vec![0u8; take];
            ring.consume_into(&mut out).expect("within buffered range");
            drained.extend_from_slice(&out);
        }

        let mut tail = vec![0u8; ring.len()];
        ring.consume_into(&mut tail).expect("within buffered range");
        drained.extend_from_slice(&tail);

        prop_assert_eq!(drained, fed);
    }
}
