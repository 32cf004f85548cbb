//! Cancellable periodic background tasks.
//!
//! A [`Scheduler`] owns every task it spawns. Each task awaits its job
//! inline, so two runs of the same job never overlap, and cancellation is
//! only observed between runs. [`Scheduler::shutdown`] cancels all tasks and
//! waits for them to exit.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Default)]
pub struct Scheduler {
    token: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` every `period`, starting one period from now.
    ///
    /// Ticks missed while a run is in progress are delayed rather than
    /// replayed in a burst.
    pub fn spawn_periodic<F, Fut>(&mut self, name: &'static str, period: Duration, job: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.token.child_token();
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        debug!(task = name, "running scheduled task");
                        job().await;
                    }
                }
            }
            debug!(task = name, "scheduled task stopped");
        });
        info!(task = name, period_secs = period.as_secs_f64(), "scheduled task started");
        self.tasks.push((name, handle));
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(name, _)| *name).collect()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel every task and wait for each to finish its current run.
    pub async fn shutdown(self) {
        self.token.cancel();
        for (name, handle) in self.tasks {
            if let Err(e) = handle.await {
                warn!(task = name, error = %e, "scheduled task ended abnormally");
            }
        }
        info!("scheduler stopped");
    }
}
