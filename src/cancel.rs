use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Shared {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    shared: Arc<Shared>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            shared: Arc::default(),
            deadline: Some(deadline),
        }
    }

    // A timeout past what `Instant` can represent never fires.
    pub fn with_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::with_deadline(deadline),
            None => Self::new(),
        }
    }

    pub fn cancel(&self) {
        let mut cancelled = self
            .shared
            .cancelled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *cancelled = true;
        self.shared.signal.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return true;
        }
        *self
            .shared
            .cancelled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Blocks for up to `duration`. Returns `true` if the token was cancelled
    /// (or its deadline passed) before the full duration elapsed.
    pub fn wait(&self, duration: Duration) -> bool {
        let until = match (Instant::now().checked_add(duration), self.deadline) {
            (Some(until), Some(deadline)) => Some(until.min(deadline)),
            (until, deadline) => until.or(deadline),
        };

        let mut cancelled = self
            .shared
            .cancelled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        loop {
            if *cancelled {
                return true;
            }
            let Some(until) = until else {
                cancelled = self
                    .shared
                    .signal
                    .wait(cancelled)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                continue;
            };
            let now = Instant::now();
            if now >= until {
                break;
            }
            let (guard, _) = self
                .shared
                .signal
                .wait_timeout(cancelled, until - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            cancelled = guard;
        }
        drop(cancelled);
        self.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn wait_runs_full_duration_when_not_cancelled() {
        let token = CancelToken::new();
        let started = Instant::now();
        assert!(!token.wait(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn cancel_wakes_waiters_early() {
        let token = CancelToken::new();
        let other = token.clone();
        let handle = thread::spawn(move || {
            let started = Instant::now();
            let cancelled = other.wait(Duration::from_secs(10));
            (cancelled, started.elapsed())
        });
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        let (cancelled, elapsed) = handle.join().unwrap();
        assert!(cancelled);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn deadline_counts_as_cancelled() {
        let token = CancelToken::with_timeout(Duration::from_millis(10));
        assert!(token.wait(Duration::from_secs(5)));
        assert!(token.is_cancelled());
    }

    #[test]
    fn unrepresentable_timeout_means_no_deadline() {
        let token = CancelToken::with_timeout(Duration::from_secs(u64::MAX));
        assert!(!token.is_cancelled());
        assert!(!token.wait(Duration::from_millis(5)));

        let other = token.clone();
        let handle = thread::spawn(move || other.wait(Duration::MAX));
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert!(handle.join().unwrap());
    }
}
