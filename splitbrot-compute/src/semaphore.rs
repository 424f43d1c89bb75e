//! Counting semaphore on a crossbeam channel.
//!
//! Each permit is a unit message, so `post` never blocks and `wait`
//! parks the thread inside the channel until a permit arrives.

use crossbeam::channel::{unbounded, Receiver, Sender};

pub struct Semaphore {
    permits: Sender<()>,
    waiters: Receiver<()>,
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl Semaphore {
    pub fn new() -> Self {
        let (permits, waiters) = unbounded();
        Self { permits, waiters }
    }

    pub fn post(&self) {
        // both ends live in `self`, so the channel cannot be disconnected
        let _ = self.permits.send(());
    }

    pub fn post_n(&self, n: usize) {
        for _ in 0..n {
            self.post();
        }
    }

    pub fn wait(&self) {
        let _ = self.waiters.recv();
    }

    /// Discards every permit posted so far.
    pub fn drain(&self) -> usize {
        self.waiters.try_iter().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn permits_accumulate() {
        let sem = Semaphore::new();
        sem.post_n(3);
        sem.wait();
        assert_eq!(sem.drain(), 2);
        assert_eq!(sem.drain(), 0);
    }

    #[test]
    fn wait_wakes_on_post_from_another_thread() {
        let sem = Arc::new(Semaphore::new());
        let poster = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || sem.post())
        };
        sem.wait();
        poster.join().unwrap();
        assert_eq!(sem.drain(), 0);
    }
}
