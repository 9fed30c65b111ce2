use log::warn;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag shared between the main path and a worker.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline(always)]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Runs `job` on a named worker thread. The job receives its own clone of
/// `token` and is expected to check it at its suspension points.
///
/// Returns `false` if the OS refused to spawn the thread.
pub fn spawn_cancellable<F>(name: &str, token: &CancellationToken, job: F) -> bool
where
    F: FnOnce(CancellationToken) + Send + 'static,
{
    let token = token.clone();
    match std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || job(token))
    {
        Ok(_) => true,
        Err(e) => {
            warn!("Failed to spawn worker '{name}': {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CancellationToken, spawn_cancellable};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn clones_observe_cancellation() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn worker_sees_cancel_issued_after_spawn() {
        let token = CancellationToken::new();
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<bool>();

        assert!(spawn_cancellable("test-worker", &token, move |t| {
            let _ = go_rx.recv();
            let _ = done_tx.send(t.is_cancelled());
        }));
        token.cancel();
        go_tx.send(()).expect("worker hung up early");

        let cancelled = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("worker did not report back");
        assert!(cancelled, "worker should observe the cancel");
    }
}
