//! Periodic ingestion loop.
//!
//! Each tick runs at most one ingestion. A tick that fires while the previous
//! iteration is still running is skipped, never queued.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::ingest::Ingestor;

/// Re-entrancy token shared between the loop and the running iteration.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<AtomicBool>);

impl InFlight {
    /// Take the token, or `None` if an iteration already holds it.
    pub fn try_acquire(&self) -> Option<InFlightGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(Arc::clone(&self.0)))
    }
}

/// Releases the token when dropped, including on panic.
#[derive(Debug)]
pub struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Scheduler {
    ingestor: Arc<Ingestor>,
    period: Duration,
    in_flight: InFlight,
}

impl Scheduler {
    pub fn new(ingestor: Ingestor, period: Duration) -> Self {
        Self {
            ingestor: Arc::new(ingestor),
            period,
            in_flight: InFlight::default(),
        }
    }

    /// Run until ctrl-c or SIGTERM.
    pub async fn run(self) {
        info!(
            path = %self.ingestor.archive_path().display(),
            interval_ms = self.period.as_millis() as u64,
            "Starting ingestion loop"
        );
        let Scheduler {
            ingestor,
            period,
            in_flight,
        } = self;

        run_loop(period, in_flight, shutdown_signal(), move || {
            let ingestor = Arc::clone(&ingestor);
            async move {
                match ingestor.run_iteration().await {
                    Ok(Some(event)) => debug!(gamestate_id = event.gamestate_id, "Iteration created gamestate"),
                    Ok(None) => debug!("Iteration found no new month"),
                    Err(e) => error!(error = %e, "Ingestion iteration failed"),
                }
            }
        })
        .await;

        info!("Ingestion loop stopped");
    }
}

/// Tick every `period`, spawning `iteration` when the token is free, until
/// `shutdown` resolves. Returns the number of iterations started.
pub async fn run_loop<F, Fut, S>(period: Duration, in_flight: InFlight, shutdown: S, iteration: F) -> usize
where
    F: Fn() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
    S: Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut started = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let Some(guard) = in_flight.try_acquire() else {
                    debug!("Previous iteration still running, skipping tick");
                    continue;
                };
                started += 1;
                let work = iteration();
                tokio::spawn(async move {
                    let _guard = guard;
                    work.await;
                });
            }
        }
    }
    started
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_token_is_exclusive() {
        let in_flight = InFlight::default();
        let guard = in_flight.try_acquire().unwrap();
        assert!(in_flight.try_acquire().is_none());
        drop(guard);
        assert!(in_flight.try_acquire().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_ticks_are_skipped() {
        let in_flight = InFlight::default();
        let finished = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&finished);
        let started = run_loop(
            Duration::from_millis(100),
            in_flight.clone(),
            tokio::time::sleep(Duration::from_millis(1050)),
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    tokio::time::sleep(Duration::from_millis(350)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        )
        .await;

        // Ticks at 0..=1000ms; each iteration holds the token for 350ms.
        assert_eq!(started, 3);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert!(in_flight.try_acquire().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_released_on_panic() {
        let in_flight = InFlight::default();
        let started = run_loop(
            Duration::from_millis(100),
            in_flight.clone(),
            tokio::time::sleep(Duration::from_millis(250)),
            || async { panic!("iteration failed"); },
        )
        .await;

        assert_eq!(started, 3);
        assert!(in_flight.try_acquire().is_some());
    }
}
