//! Scheduled callbacks with a single cancellation handle.
//!
//! # Responsibilities
//! - Run a tick callback on a fixed period
//! - Stop on handle cancel, handle drop, shutdown broadcast, or `TickControl::Stop`
//! - Give the callback one `stopped()` hook to flush state

use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// What a tick asks the timer to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

/// Work driven by a timer.
pub trait Tick: Send + 'static {
    fn tick(&mut self) -> TickControl;

    /// Called once when the timer stops for any reason.
    fn stopped(&mut self) {}
}

impl<F> Tick for F
where
    F: FnMut() -> TickControl + Send + 'static,
{
    fn tick(&mut self) -> TickControl {
        self()
    }
}

/// Owner of a running timer. Dropping it cancels the timer.
#[derive(Debug)]
pub struct TimerHandle {
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    /// Signal the timer to stop without waiting.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }

    /// Signal the timer to stop and wait until its `stopped()` hook ran.
    pub async fn stop(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Whether the timer task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Spawn `work` on a fixed period. The first tick fires immediately.
pub fn spawn_interval<T: Tick>(period: Duration, work: T) -> TimerHandle {
    spawn_inner(period, work, None)
}

/// Like [`spawn_interval`], also stopping when `shutdown` fires.
pub fn spawn_interval_until<T: Tick>(
    period: Duration,
    shutdown: broadcast::Receiver<()>,
    work: T,
) -> TimerHandle {
    spawn_inner(period, work, Some(shutdown))
}

fn spawn_inner<T: Tick>(
    period: Duration,
    mut work: T,
    mut shutdown: Option<broadcast::Receiver<()>>,
) -> TimerHandle {
    let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if work.tick() == TickControl::Stop {
                        break;
                    }
                }
                _ = &mut cancel_rx => {
                    tracing::trace!("Timer cancelled");
                    break;
                }
                _ = async {
                    match shutdown.as_mut() {
                        Some(rx) => { let _ = rx.recv().await; }
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    tracing::debug!("Timer received shutdown signal");
                    break;
                }
            }
        }
        work.stopped();
    });

    TimerHandle {
        cancel: Some(cancel_tx),
        task: Some(task),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_timer_ticks_until_stop() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let handle = spawn_interval(Duration::from_millis(5), move || {
            if c.fetch_add(1, Ordering::SeqCst) + 1 >= 3 {
                TickControl::Stop
            } else {
                TickControl::Continue
            }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_tick_stop_ends_task() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let handle = spawn_interval(Duration::from_millis(1), move || {
            c.fetch_add(1, Ordering::SeqCst);
            TickControl::Stop
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    struct Flag(Arc<AtomicU32>);

    impl Tick for Flag {
        fn tick(&mut self) -> TickControl {
            TickControl::Continue
        }

        fn stopped(&mut self) {
            self.0.store(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_stopped_hook_runs_on_cancel() {
        let flag = Arc::new(AtomicU32::new(0));
        let handle = spawn_interval(Duration::from_millis(5), Flag(flag.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.stop().await;
        assert_eq!(flag.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_timer() {
        let shutdown = crate::lifecycle::Shutdown::new();
        let flag = Arc::new(AtomicU32::new(0));
        let handle = spawn_interval_until(
            Duration::from_millis(5),
            shutdown.subscribe(),
            Flag(flag.clone()),
        );
        shutdown.trigger();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished());
        assert_eq!(flag.load(Ordering::SeqCst), 1);
    }
}
