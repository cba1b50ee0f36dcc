//! Concurrency tests
//!
//! Many threads encoding through one shared handle must each get exactly the
//! vectors a single-threaded run produces.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use embeddings_core::{EmbeddingsConfig, EmbeddingsHandle};
use embeddings_e2e_tests::{HashBackend, TEST_DIMENSION, TestModelDir, TestTexts};

const THREADS: usize = 8;
const ROUNDS: usize = 40;

fn yielding_handle(dir: &TestModelDir) -> EmbeddingsHandle {
    dir.open_with(
        HashBackend::new(TEST_DIMENSION).yielding(),
        EmbeddingsConfig::default().with_threads(3),
    )
    .unwrap()
}

#[test]
fn test_concurrent_encodes_do_not_cross_contaminate() {
    let dir = TestModelDir::new_temp();
    let handle = yielding_handle(&dir);

    let texts = TestTexts::corpus(THREADS);
    let expected: Vec<Vec<f32>> = texts
        .iter()
        .map(|text| handle.encode(text).unwrap().into_vec())
        .collect();

    let checked = AtomicUsize::new(0);
    std::thread::scope(|scope| {
        for (thread, text) in texts.iter().enumerate() {
            let handle = &handle;
            let expected = &expected;
            let checked = &checked;
            scope.spawn(move || {
                for _ in 0..ROUNDS {
                    let vector = handle.encode(text).unwrap();
                    assert_eq!(vector.as_slice(), expected[thread].as_slice());
                    checked.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });

    assert_eq!(checked.load(Ordering::Relaxed), THREADS * ROUNDS);
}

#[test]
fn test_concurrent_batches_and_singles() {
    let dir = TestModelDir::new_temp();
    let handle = Arc::new(yielding_handle(&dir));

    let corpus = Arc::new(TestTexts::corpus(24));
    let expected = Arc::new(handle.encode_batch(corpus.as_slice()).unwrap());

    let workers: Vec<_> = (0..THREADS)
        .map(|worker| {
            let handle = Arc::clone(&handle);
            let corpus = Arc::clone(&corpus);
            let expected = Arc::clone(&expected);
            std::thread::spawn(move || {
                for round in 0..ROUNDS / 4 {
                    if (worker + round) % 2 == 0 {
                        let batch = handle.encode_batch(corpus.as_slice()).unwrap();
                        assert_eq!(batch, *expected);
                    } else {
                        let index = (worker * 7 + round) % corpus.len();
                        let single = handle.encode(&corpus[index]).unwrap();
                        assert_eq!(Some(single.as_slice()), expected.get(index));
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
}

#[test]
fn test_failures_stay_scoped_to_their_call() {
    let dir = TestModelDir::new_temp();
    let handle = yielding_handle(&dir);
    let good = handle.encode("buffer thread").unwrap();

    std::thread::scope(|scope| {
        for thread in 0..THREADS {
            let handle = &handle;
            let good = &good;
            scope.spawn(move || {
                for _ in 0..ROUNDS {
                    if thread % 2 == 0 {
                        assert!(handle.encode_bytes(TestTexts::UNDECODABLE).is_err());
                    } else {
                        assert_eq!(&handle.encode("buffer thread").unwrap(), good);
                    }
                }
            });
        }
    });
}

#[test]
fn test_separate_handles_in_parallel() {
    let dir = TestModelDir::new_temp();

    std::thread::scope(|scope| {
        for dimension in [4, 16, 64, 128] {
            let dir = &dir;
            scope.spawn(move || {
                let handle = dir
                    .open_with(HashBackend::new(dimension), EmbeddingsConfig::default())
                    .unwrap();
                for text in TestTexts::corpus(10) {
                    assert_eq!(handle.encode(&text).unwrap().len(), dimension);
                }
                handle.close();
            });
        }
    });
}
