//! # Backpressure Integration Tests
//!
//! Queue and counter admission under contention:
//!
//! 1. **Non-blocking offer**: refuses exactly at capacity, succeeds after a take
//! 2. **Blocking put**: parks the producer until a consumer makes room
//! 3. **Bypass**: ignores capacity entirely
//! 4. **Interrupt**: wakes every parked producer with an error

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use shared_wiring::{BackpressureCounter, BackpressureQueue, WiringError};

    // =========================================================================
    // QUEUE
    // =========================================================================

    #[test]
    fn test_offer_refuses_at_capacity_and_recovers_after_take() {
        const CAPACITY: usize = 8;
        let queue = BackpressureQueue::new(CAPACITY);

        for i in 0..CAPACITY {
            assert!(queue.offer(i).is_ok(), "offer {} should fit", i);
        }
        assert_eq!(queue.offer(99), Err(99));

        assert_eq!(queue.take().unwrap(), 0);
        assert!(queue.offer(99).is_ok());
        assert_eq!(queue.len(), CAPACITY);
    }

    #[test]
    fn test_put_blocks_until_take() {
        let queue = Arc::new(BackpressureQueue::new(1));
        queue.put(1u32).unwrap();

        let finished = Arc::new(AtomicBool::new(false));
        let producer = {
            let queue = Arc::clone(&queue);
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                queue.put(2).unwrap();
                finished.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!finished.load(Ordering::SeqCst), "second put must block");

        assert_eq!(queue.take().unwrap(), 1);
        producer.join().unwrap();
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(queue.take().unwrap(), 2);
    }

    #[test]
    fn test_bypass_exceeds_capacity() {
        let queue = BackpressureQueue::new(2);
        for i in 0..5 {
            queue.bypass_backpressure(i);
        }
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.offer(5), Err(5));

        let drained = queue.drain();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_interrupt_wakes_every_blocked_producer() {
        const PRODUCERS: usize = 4;
        let queue = Arc::new(BackpressureQueue::new(1));
        queue.put(0u32).unwrap();

        let barrier = Arc::new(Barrier::new(PRODUCERS + 1));
        let (tx, rx) = mpsc::channel();
        for i in 0..PRODUCERS {
            let queue = Arc::clone(&queue);
            let barrier = Arc::clone(&barrier);
            let tx = tx.clone();
            thread::spawn(move || {
                barrier.wait();
                tx.send(queue.put(i as u32 + 1)).unwrap();
            });
        }
        barrier.wait();
        thread::sleep(Duration::from_millis(50));
        queue.interrupt();

        for _ in 0..PRODUCERS {
            let result = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            assert!(matches!(result, Err(WiringError::Interrupted { .. })));
        }
        // The queue itself stays usable.
        assert_eq!(queue.take().unwrap(), 0);
        assert!(queue.offer(7).is_ok());
    }

    #[test]
    fn test_fifo_across_producers_and_consumer() {
        let queue = Arc::new(BackpressureQueue::new(4));
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..1_000u32 {
                    queue.put(i).unwrap();
                }
            })
        };

        let received: Vec<u32> = (0..1_000).map(|_| queue.take().unwrap()).collect();
        producer.join().unwrap();
        assert_eq!(received, (0..1_000).collect::<Vec<_>>());
    }

    // =========================================================================
    // COUNTER
    // =========================================================================

    #[test]
    fn test_counter_on_ramp_blocks_until_off_ramp() {
        let counter = Arc::new(BackpressureCounter::new(1));
        counter.on_ramp().unwrap();
        assert!(!counter.attempt_on_ramp());

        let entered = Arc::new(AtomicBool::new(false));
        let waiter = {
            let counter = Arc::clone(&counter);
            let entered = Arc::clone(&entered);
            thread::spawn(move || {
                counter.on_ramp().unwrap();
                entered.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));
        counter.off_ramp();
        waiter.join().unwrap();
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn test_counter_force_and_wait_until_empty() {
        let counter = Arc::new(BackpressureCounter::new(1));
        counter.force_on_ramp();
        counter.force_on_ramp();
        assert_eq!(counter.count(), 2);

        let drainer = {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                counter.off_ramp();
                counter.off_ramp();
            })
        };
        counter.wait_until_empty().unwrap();
        assert_eq!(counter.count(), 0);
        drainer.join().unwrap();
    }
}
