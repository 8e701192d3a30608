//! Single-slot automation session.
//!
//! InDesign and Acrobat are driven through one GUI session per host, and the
//! Compare flow clicks at fixed screen coordinates. Two jobs running at once
//! would interleave keystrokes, so every job holds [`SessionGuard`] from its
//! first launch until its last retry finishes. Waiters are served in FIFO
//! order (`tokio::sync::Mutex` is fair).

use once_cell::sync::Lazy;
use std::time::Instant;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

static SESSION: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Exclusive ownership of the automation session. Released on drop.
pub struct SessionGuard {
    _guard: MutexGuard<'static, ()>,
}

/// Wait for the session to become free and claim it.
pub async fn acquire() -> SessionGuard {
    let waiting = Instant::now();
    let guard = SESSION.lock().await;
    debug!(
        waited_ms = waiting.elapsed().as_millis() as u64,
        "Automation session acquired"
    );
    SessionGuard { _guard: guard }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn jobs_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let active = active.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    let _session = acquire().await;
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
