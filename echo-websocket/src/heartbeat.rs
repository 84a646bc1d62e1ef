//! Ping scheduling and pong-timeout liveness detection.
//!
//! A connection is declared dead once `interval + timeout` has elapsed since
//! the last pong (or since `start`). The ticker keeps running after that; the
//! session observes `is_alive == false`, stops the heartbeat and reconnects.

use crate::config::HeartbeatConfig;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tracing::{trace, warn};

/// Heartbeat manager for one session.
#[derive(Debug)]
pub struct HeartbeatManager {
    config: HeartbeatConfig,
    shared: Arc<Shared>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug)]
struct Shared {
    last_pong: Mutex<Instant>,
    alive: watch::Sender<bool>,
}

impl Shared {
    fn dead_deadline(&self, dead_after: Duration) -> Instant {
        *self.last_pong.lock() + dead_after
    }

    fn check(&self, dead_after: Duration) {
        let elapsed = self.last_pong.lock().elapsed();
        if elapsed >= dead_after {
            let flipped = self.alive.send_if_modified(|alive| std::mem::replace(alive, false));
            if flipped {
                warn!(
                    elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    "No pong within heartbeat timeout, connection considered dead"
                );
            }
        }
    }
}

impl HeartbeatManager {
    /// Creates a stopped heartbeat manager.
    #[must_use]
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                last_pong: Mutex::new(Instant::now()),
                alive: watch::Sender::new(true),
            }),
            ticker: Mutex::new(None),
        }
    }

    /// Returns the heartbeat settings.
    #[must_use]
    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }

    /// Starts pinging every `interval_ms`, replacing any running ticker.
    ///
    /// Does nothing when the heartbeat is disabled or the interval is zero.
    /// Each ping runs in its own task, so a stalled send never delays the
    /// pong deadline; a tick is skipped while the previous ping is pending.
    pub fn start<F, Fut>(&self, send_ping: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if !self.config.enabled {
            return;
        }
        if self.config.interval_ms == 0 {
            warn!("Heartbeat interval is zero, not starting");
            return;
        }
        self.abort_ticker();

        *self.shared.last_pong.lock() = Instant::now();
        self.shared.alive.send_if_modified(|alive| !std::mem::replace(alive, true));

        let period = self.config.interval();
        let dead_after = self.config.dead_after();
        let shared = Arc::clone(&self.shared);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut pings = JoinSet::new();

            loop {
                let deadline = shared.dead_deadline(dead_after);
                let watching = *shared.alive.borrow();

                tokio::select! {
                    _ = ticker.tick() => {
                        if pings.is_empty() {
                            trace!("Heartbeat tick, sending ping");
                            pings.spawn(send_ping());
                        } else {
                            trace!("Previous ping still pending, skipping tick");
                        }
                        shared.check(dead_after);
                    }
                    Some(_) = pings.join_next(), if !pings.is_empty() => {}
                    () = sleep_until(deadline), if watching => {
                        shared.check(dead_after);
                    }
                }
            }
        });

        *self.ticker.lock() = Some(handle);
    }

    /// Records a pong: refreshes the timestamp and marks the connection alive.
    pub fn on_pong_received(&self, payload: &[u8]) {
        *self.shared.last_pong.lock() = Instant::now();
        let revived = self
            .shared
            .alive
            .send_if_modified(|alive| !std::mem::replace(alive, true));
        trace!(size = payload.len(), revived, "Pong received");
    }

    /// Cancels the ticker and resets `is_alive` to true.
    pub fn stop(&self) {
        self.abort_ticker();
        self.shared.alive.send_if_modified(|alive| !std::mem::replace(alive, true));
    }

    /// Returns true while pongs arrive within the timeout.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        *self.shared.alive.borrow()
    }

    /// Subscribes to liveness changes.
    #[must_use]
    pub fn subscribe_alive(&self) -> watch::Receiver<bool> {
        self.shared.alive.subscribe()
    }

    /// Time since the last pong or `start`.
    #[must_use]
    pub fn since_last_pong(&self) -> Duration {
        self.shared.last_pong.lock().elapsed()
    }

    /// Returns true while a ticker task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.ticker
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn abort_ticker(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for HeartbeatManager {
    fn drop(&mut self) {
        self.abort_ticker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_ping(
        counter: &Arc<AtomicUsize>,
    ) -> impl Fn() -> std::future::Ready<()> + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_exactly_at_threshold() {
        let heartbeat = HeartbeatManager::new(HeartbeatConfig::new(30_000, 10_000));
        let pings = Arc::new(AtomicUsize::new(0));
        let mut alive = heartbeat.subscribe_alive();

        let started = Instant::now();
        heartbeat.start(counting_ping(&pings));

        alive.wait_for(|alive| !*alive).await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(40_000), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(40_001), "{elapsed:?}");
        assert_eq!(pings.load(Ordering::SeqCst), 1);
        assert!(!heartbeat.is_alive());
        assert!(heartbeat.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pongs_keep_connection_alive() {
        let heartbeat = HeartbeatManager::new(HeartbeatConfig::new(1_000, 500));
        let pings = Arc::new(AtomicUsize::new(0));
        heartbeat.start(counting_ping(&pings));

        for _ in 0..10 {
            tokio::time::sleep(Duration::from_millis(1_000)).await;
            heartbeat.on_pong_received(b"");
        }
        assert!(heartbeat.is_alive());
        assert!(pings.load(Ordering::SeqCst) >= 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_pong_revives() {
        let heartbeat = HeartbeatManager::new(HeartbeatConfig::new(100, 50));
        let mut alive = heartbeat.subscribe_alive();
        heartbeat.start(|| std::future::ready(()));

        alive.wait_for(|alive| !*alive).await.unwrap();
        heartbeat.on_pong_received(b"late");
        assert!(heartbeat.is_alive());
        assert!(heartbeat.since_last_pong() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_resets_and_cancels() {
        let heartbeat = HeartbeatManager::new(HeartbeatConfig::new(100, 50));
        let pings = Arc::new(AtomicUsize::new(0));
        let mut alive = heartbeat.subscribe_alive();
        heartbeat.start(counting_ping(&pings));

        alive.wait_for(|alive| !*alive).await.unwrap();
        heartbeat.stop();
        assert!(heartbeat.is_alive());

        let before = pings.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(pings.load(Ordering::SeqCst), before);
        assert!(!heartbeat.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_ticker() {
        let heartbeat = HeartbeatManager::new(HeartbeatConfig::new(100, 1_000));
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        heartbeat.start(counting_ping(&first));
        tokio::time::sleep(Duration::from_millis(250)).await;
        heartbeat.start(counting_ping(&second));
        let first_count = first.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(first.load(Ordering::SeqCst), first_count);
        assert!(second.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_ping_does_not_delay_dead_detection() {
        let heartbeat = HeartbeatManager::new(HeartbeatConfig::new(100, 50));
        let pings = Arc::new(AtomicUsize::new(0));
        let mut alive = heartbeat.subscribe_alive();

        let counter = Arc::clone(&pings);
        let started = Instant::now();
        heartbeat.start(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<()>()
        });

        alive.wait_for(|alive| !*alive).await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(150), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(151), "{elapsed:?}");

        // the stuck ping is never duplicated
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(pings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_not_started() {
        let heartbeat = HeartbeatManager::new(HeartbeatConfig::new(0, 100));
        let pings = Arc::new(AtomicUsize::new(0));
        heartbeat.start(counting_ping(&pings));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(pings.load(Ordering::SeqCst), 0);
        assert!(!heartbeat.is_running());
        assert!(heartbeat.is_alive());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_is_noop() {
        let heartbeat = HeartbeatManager::new(HeartbeatConfig::NONE);
        let pings = Arc::new(AtomicUsize::new(0));
        heartbeat.start(counting_ping(&pings));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(pings.load(Ordering::SeqCst), 0);
        assert!(heartbeat.is_alive());
        assert!(!heartbeat.is_running());
    }
}
