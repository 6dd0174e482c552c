use chrono::{DateTime, Utc};
use log::info;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::console::Console;

/// Runs a full pass over every key, then waits out the interval, until cancelled.
pub struct Scheduler {
    interval: Duration,
    console: Console,
    next_run: Option<DateTime<Utc>>,
    passes: u64,
}

impl Scheduler {
    pub fn new(interval: Duration, console: Console) -> Self {
        Self {
            interval,
            console,
            next_run: None,
            passes: 0,
        }
    }

    /// When the next pass is due. `None` until the first pass has finished.
    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        self.next_run
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Loops forever: pass, countdown, pass... Returns only once `shutdown` fires.
    pub async fn run<F, Fut>(&mut self, keys: &[String], shutdown: &CancellationToken, mut process: F)
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = ()>,
    {
        while !shutdown.is_cancelled() {
            let processed = run_pass(keys, &mut process).await;
            self.passes += 1;
            self.console.separator();

            let wait = chrono::Duration::from_std(self.interval).unwrap_or_else(|_| chrono::Duration::days(1));
            let next_run = Utc::now() + wait;
            self.next_run = Some(next_run);
            info!(
                "[SCHEDULER] pass {} processed {} account(s), next run at {}",
                self.passes, processed, next_run
            );

            if !self.wait(shutdown).await {
                break;
            }
        }
    }

    /// Counts down `interval`, redrawing once per second. Returns `false` if cancelled.
    async fn wait(&self, shutdown: &CancellationToken) -> bool {
        let deadline = Instant::now() + self.interval;
        let mut ticker = interval_at(Instant::now(), Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.console.end_countdown();
                    return false;
                }
                _ = ticker.tick() => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        self.console.end_countdown();
                        return true;
                    }
                    self.console.countdown(remaining.as_secs_f64().ceil() as u64);
                }
            }
        }
    }
}

/// Processes `keys` one at a time, in order, each finishing before the next starts.
pub async fn run_pass<F, Fut>(keys: &[String], process: &mut F) -> usize
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut processed = 0;
    for key in keys.iter().filter(|k| !k.is_empty()) {
        process(key.clone()).await;
        processed += 1;
    }
    processed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn keys() -> Vec<String> {
        vec!["k1".into(), "k2".into(), "k3".into()]
    }

    #[tokio::test]
    async fn pass_visits_every_key_in_order() {
        let seen = RefCell::new(Vec::new());
        let count = run_pass(&keys(), &mut |key| {
            seen.borrow_mut().push(key);
            async {}
        })
        .await;
        assert_eq!(count, 3);
        assert_eq!(*seen.borrow(), keys());
    }

    #[tokio::test]
    async fn pass_is_strictly_sequential() {
        let in_flight = Rc::new(Cell::new(0));
        let max_in_flight = Rc::new(Cell::new(0));
        run_pass(&keys(), &mut |_key| {
            let (in_flight, max_in_flight) = (in_flight.clone(), max_in_flight.clone());
            async move {
                in_flight.set(in_flight.get() + 1);
                max_in_flight.set(max_in_flight.get().max(in_flight.get()));
                tokio::task::yield_now().await;
                in_flight.set(in_flight.get() - 1);
            }
        })
        .await;
        assert_eq!(max_in_flight.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repeats_after_interval_until_cancelled() {
        let shutdown = CancellationToken::new();
        let seen = RefCell::new(Vec::new());
        let mut scheduler = Scheduler::new(Duration::from_secs(5), Console::default());
        let started = Instant::now();

        scheduler
            .run(&keys(), &shutdown, |key| {
                seen.borrow_mut().push(key);
                if seen.borrow().len() == 6 {
                    shutdown.cancel();
                }
                async {}
            })
            .await;

        let expected: Vec<String> = keys().into_iter().chain(keys()).collect();
        assert_eq!(*seen.borrow(), expected);
        assert_eq!(scheduler.passes(), 2);
        assert!(scheduler.next_run().is_some());
        // One full wait between the two passes, none after cancellation.
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_countdown() {
        let shutdown = CancellationToken::new();
        let scheduler = Scheduler::new(Duration::from_secs(24 * 60 * 60), Console::default());
        let canceller = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        assert!(!scheduler.wait(&shutdown).await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
