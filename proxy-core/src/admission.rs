//! # Reader/Writer Admission Queue
//!
//! Gates access to the cache with reader/writer fairness: a burst of
//! concurrent readers may proceed together, but a waiting writer is not
//! starved by a continuous stream of new readers, and a writer excludes all
//! readers while active. Admission is strict FIFO among arrivals, with the
//! one relaxation `spec.md` §4.4 allows: a contiguous run of readers at the
//! front of the queue is admitted together rather than one at a time.
//!
//! `proxy.c`'s queue only ever enqueues and dequeues bookkeeping counters; it
//! never actually parks the calling thread on anything, so a reader or
//! writer that "loses" the race proceeds anyway. That bug is what
//! `SPEC_FULL.md` calls out as the one behavior this port does not
//! reproduce: here, [`AdmissionQueue::acquire_read`] and
//! `acquire_write` block the calling thread on a `Condvar` until the queue
//! actually grants them, the way the teacher's client pool
//! (`hkv-client/src/pool.rs`) blocks a checkout on a condition variable
//! until a connection is returned.
//!
//! Admission is granted RAII-style: `acquire_read`/`acquire_write` return a
//! guard whose `Drop` releases the slot, so a panicking or early-returning
//! caller can never leave the queue wedged.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// A queued arrival, carrying the ticket it was assigned on enqueue.
struct Waiter {
    ticket: u64,
    is_reader: bool,
}

struct QueueState {
    readers_active: usize,
    writer_active: bool,
    /// Arrivals not yet admitted, in strict FIFO order.
    queue: VecDeque<Waiter>,
    /// Tickets the queue has granted admission to but whose owning thread
    /// hasn't yet observed and consumed that grant.
    admitted: HashSet<u64>,
    next_ticket: u64,
}

impl QueueState {
    fn new() -> Self {
        QueueState {
            readers_active: 0,
            writer_active: false,
            queue: VecDeque::new(),
            admitted: HashSet::new(),
            next_ticket: 0,
        }
    }

    /// Assigns the next ticket and enqueues it at the back, preserving
    /// arrival order against every other ticket already queued.
    fn enqueue(&mut self, is_reader: bool) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.queue.push_back(Waiter { ticket, is_reader });
        ticket
    }

    /// Admits every ticket at the front of the queue that current state
    /// allows, in order. A writer at the front stops the drain as soon as
    /// it is admitted (it excludes everything behind it); a run of readers
    /// at the front is admitted as a single contiguous batch.
    fn drain(&mut self) {
        loop {
            match self.queue.front() {
                Some(w) if w.is_reader && !self.writer_active => {
                    let w = self.queue.pop_front().expect("front just matched");
                    self.readers_active += 1;
                    self.admitted.insert(w.ticket);
                }
                Some(w) if !w.is_reader && !self.writer_active && self.readers_active == 0 => {
                    let w = self.queue.pop_front().expect("front just matched");
                    self.writer_active = true;
                    self.admitted.insert(w.ticket);
                    break;
                }
                _ => break,
            }
        }
    }
}

struct Inner {
    state: Mutex<QueueState>,
    condvar: Condvar,
}

/// A reader/writer admission queue guarding access to a shared resource such
/// as [`crate::cache::Cache`].
#[derive(Clone)]
pub struct AdmissionQueue {
    inner: Arc<Inner>,
}

impl Default for AdmissionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        AdmissionQueue {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::new()),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Blocks until a read slot is granted, then returns a guard that
    /// releases it on drop. Multiple readers may hold a guard concurrently.
    pub fn acquire_read(&self) -> ReadGuard<'_> {
        let mut state = self.inner.state.lock();
        let ticket = state.enqueue(true);
        state.drain();
        while !state.admitted.remove(&ticket) {
            self.inner.condvar.wait(&mut state);
        }
        ReadGuard { queue: self }
    }

    /// Blocks until the write slot is granted, excluding all readers and any
    /// other writer, then returns a guard that releases it on drop.
    pub fn acquire_write(&self) -> WriteGuard<'_> {
        let mut state = self.inner.state.lock();
        let ticket = state.enqueue(false);
        state.drain();
        while !state.admitted.remove(&ticket) {
            self.inner.condvar.wait(&mut state);
        }
        WriteGuard { queue: self }
    }

    fn release_read(&self) {
        let mut state = self.inner.state.lock();
        state.readers_active -= 1;
        state.drain();
        self.inner.condvar.notify_all();
    }

    fn release_write(&self) {
        let mut state = self.inner.state.lock();
        state.writer_active = false;
        state.drain();
        self.inner.condvar.notify_all();
    }
}

/// Held while a reader is admitted. Releases the read slot on drop.
pub struct ReadGuard<'a> {
    queue: &'a AdmissionQueue,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.queue.release_read();
    }
}

/// Held while the writer is admitted. Releases the write slot on drop.
pub struct WriteGuard<'a> {
    queue: &'a AdmissionQueue,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.queue.release_write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn readers_run_concurrently() {
        let queue = AdmissionQueue::new();
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        thread::scope(|scope| {
            for _ in 0..8 {
                let queue = queue.clone();
                let active = Arc::clone(&active);
                let max_seen = Arc::clone(&max_seen);
                scope.spawn(move || {
                    let _guard = queue.acquire_read();
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    active.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        assert!(max_seen.load(Ordering::SeqCst) > 1, "readers should overlap");
    }

    #[test]
    fn writer_excludes_readers() {
        let queue = AdmissionQueue::new();
        let active_readers = Arc::new(AtomicUsize::new(0));
        let writer_saw_readers = Arc::new(AtomicUsize::new(0));

        thread::scope(|scope| {
            let w_queue = queue.clone();
            let w_active = Arc::clone(&active_readers);
            let w_saw = Arc::clone(&writer_saw_readers);
            let writer = scope.spawn(move || {
                thread::sleep(Duration::from_millis(2));
                let _guard = w_queue.acquire_write();
                w_saw.store(w_active.load(Ordering::SeqCst), Ordering::SeqCst);
            });

            for _ in 0..4 {
                let queue = queue.clone();
                let active = Arc::clone(&active_readers);
                scope.spawn(move || {
                    let _guard = queue.acquire_read();
                    active.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    active.fetch_sub(1, Ordering::SeqCst);
                });
            }

            writer.join().unwrap();
        });

        assert_eq!(writer_saw_readers.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn guard_release_on_drop_unblocks_waiters() {
        let queue = AdmissionQueue::new();
        {
            let _write_guard = queue.acquire_write();
        }
        // Should not block: the write guard released above.
        let _read_guard = queue.acquire_read();
    }

    /// S5/S7: a writer that enqueues *after* a reader must never be admitted
    /// before that reader, even though the reader is still blocked behind an
    /// earlier, already-active writer. This is the exact ordering the
    /// independent-counter design used to get wrong.
    #[test]
    fn writer_cannot_overtake_an_earlier_blocked_reader() {
        let queue = AdmissionQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        thread::scope(|scope| {
            // W0 holds the write slot first.
            let w0_guard = queue.acquire_write();

            let r1_queue = queue.clone();
            let r1_order = Arc::clone(&order);
            let reader = scope.spawn(move || {
                let _guard = r1_queue.acquire_read();
                r1_order.lock().push("reader");
            });
            // Give R1 time to enqueue and block behind W0.
            thread::sleep(Duration::from_millis(20));

            let w1_queue = queue.clone();
            let w1_order = Arc::clone(&order);
            let writer = scope.spawn(move || {
                let _guard = w1_queue.acquire_write();
                w1_order.lock().push("writer");
            });
            // Give W1 time to enqueue and block behind both W0 and R1.
            thread::sleep(Duration::from_millis(20));

            drop(w0_guard);
            reader.join().unwrap();
            writer.join().unwrap();
        });

        assert_eq!(&*order.lock(), &["reader", "writer"]);
    }

    #[test]
    fn readers_coalesce_ahead_of_a_later_writer() {
        let queue = AdmissionQueue::new();
        let concurrent_readers = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        thread::scope(|scope| {
            let w0_guard = queue.acquire_write();

            let mut readers = Vec::new();
            for _ in 0..3 {
                let queue = queue.clone();
                let concurrent = Arc::clone(&concurrent_readers);
                let max_concurrent = Arc::clone(&max_concurrent);
                readers.push(scope.spawn(move || {
                    let _guard = queue.acquire_read();
                    let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                    max_concurrent.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                    concurrent.fetch_sub(1, Ordering::SeqCst);
                }));
            }
            thread::sleep(Duration::from_millis(20));

            drop(w0_guard);
            for reader in readers {
                reader.join().unwrap();
            }
        });

        assert!(
            max_concurrent.load(Ordering::SeqCst) > 1,
            "readers queued together should be admitted as one batch"
        );
    }
}
