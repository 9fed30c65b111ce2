use log::trace;
use std::sync::mpsc::{self, Receiver, Sender};

/// FIFO of work destined for the main update path.
///
/// Anything that touches visual state goes through here: worker threads and
/// other callers only ever hold a [`SchedulerHandle`], and the owner drains
/// the queue once per frame in the order items were scheduled.
pub struct Scheduler<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

/// Cloneable, `Send` side of a [`Scheduler`].
pub struct SchedulerHandle<T>(Sender<T>);

impl<T> Clone for SchedulerHandle<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> SchedulerHandle<T> {
    /// Returns `false` once the owning scheduler is gone.
    pub fn schedule(&self, item: T) -> bool {
        self.0.send(item).is_ok()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    pub fn handle(&self) -> SchedulerHandle<T> {
        SchedulerHandle(self.tx.clone())
    }

    #[inline(always)]
    pub fn schedule(&self, item: T) {
        // The receiver lives in `self`, so this send cannot fail.
        let _ = self.tx.send(item);
    }

    /// Takes everything queued so far. Items scheduled while the returned
    /// batch is being processed wait for the next call.
    pub fn drain(&self) -> Vec<T> {
        let batch: Vec<T> = self.rx.try_iter().collect();
        if !batch.is_empty() {
            trace!("Scheduler: running {} queued item(s)", batch.len());
        }
        batch
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Scheduler;

    #[test]
    fn drains_in_schedule_order_across_threads() {
        let scheduler = Scheduler::new();
        scheduler.schedule(0);
        let handle = scheduler.handle();
        std::thread::spawn(move || {
            for i in 1..=3 {
                assert!(handle.schedule(i));
            }
        })
        .join()
        .expect("scheduling thread panicked");
        scheduler.schedule(4);

        assert_eq!(scheduler.drain(), vec![0, 1, 2, 3, 4]);
        assert!(scheduler.drain().is_empty());
    }

    #[test]
    fn handle_reports_dropped_scheduler() {
        let scheduler = Scheduler::<u8>::new();
        let handle = scheduler.handle();
        drop(scheduler);
        assert!(!handle.schedule(1));
    }
}
