//! Fixed-interval poll loop.
//!
//! Runs one cycle, sleeps, repeats until the shutdown future resolves.
//! Shutdown is observed between cycles, never in the middle of one.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{error, info};

use crate::error::PipelineError;
use crate::pipeline::processor::QueryPipeline;
use crate::pipeline::types::CycleReport;

/// One unit of polling work.
#[async_trait]
pub trait PollCycle: Send + Sync {
    async fn run_cycle(&self) -> Result<CycleReport, PipelineError>;
}

#[async_trait]
impl PollCycle for QueryPipeline {
    async fn run_cycle(&self) -> Result<CycleReport, PipelineError> {
        self.process_unread().await
    }
}

/// Poll until `shutdown` resolves.
///
/// A failed or panicking cycle is logged and the loop carries on.
pub async fn run_poll_loop<C, F>(cycle: &C, interval: Duration, shutdown: F)
where
    C: PollCycle + ?Sized,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        info!("Checking for new emails...");
        match AssertUnwindSafe(cycle.run_cycle()).catch_unwind().await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Cycle failed: {e}"),
            Err(panic) => {
                let e = PipelineError::Panicked(panic_message(panic.as_ref()));
                error!("{e}");
            }
        }

        info!("Next check in {} seconds", interval.as_secs());
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown => {
                info!("Stopping email automation");
                return;
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::sync::Notify;
    use tokio::time::Instant;
    use uuid::Uuid;

    use super::*;
    use crate::error::MailboxError;

    enum Step {
        Ok,
        Fail,
        Panic,
    }

    /// Replays a script of cycle results and records when each ran.
    struct ScriptedCycle {
        steps: Mutex<Vec<Step>>,
        ran_at: Mutex<Vec<Instant>>,
        stop_after: usize,
        done: Arc<Notify>,
    }

    impl ScriptedCycle {
        fn new(mut steps: Vec<Step>, done: Arc<Notify>) -> Self {
            let stop_after = steps.len();
            steps.reverse();
            Self {
                steps: Mutex::new(steps),
                ran_at: Mutex::new(Vec::new()),
                stop_after,
                done,
            }
        }
    }

    #[async_trait]
    impl PollCycle for ScriptedCycle {
        async fn run_cycle(&self) -> Result<CycleReport, PipelineError> {
            let count = {
                let mut ran_at = self.ran_at.lock().unwrap();
                ran_at.push(Instant::now());
                ran_at.len()
            };
            if count == self.stop_after {
                self.done.notify_one();
            }
            let step = self.steps.lock().unwrap().pop().unwrap_or(Step::Ok);
            match step {
                Step::Ok => Ok(CycleReport::new(Uuid::new_v4())),
                Step::Fail => Err(PipelineError::Aborted(MailboxError::Connect {
                    host: "imap.test".into(),
                    reason: "refused".into(),
                })),
                Step::Panic => panic!("cycle blew up"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cycles_are_spaced_by_interval() {
        let done = Arc::new(Notify::new());
        let cycle = ScriptedCycle::new(vec![Step::Ok, Step::Ok, Step::Ok], done.clone());
        let interval = Duration::from_secs(120);

        run_poll_loop(&cycle, interval, async move { done.notified().await }).await;

        let ran_at = cycle.ran_at.lock().unwrap();
        assert_eq!(ran_at.len(), 3);
        for pair in ran_at.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= interval, "gap {gap:?} shorter than interval");
            assert!(gap < interval + Duration::from_secs(1), "gap {gap:?} too long");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn survives_failed_and_panicking_cycles() {
        let done = Arc::new(Notify::new());
        let cycle = ScriptedCycle::new(vec![Step::Fail, Step::Panic, Step::Ok], done.clone());

        run_poll_loop(&cycle, Duration::from_secs(5), async move {
            done.notified().await
        })
        .await;

        assert_eq!(cycle.ran_at.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_before_first_sleep_runs_one_cycle() {
        let cycle = ScriptedCycle::new(vec![Step::Ok], Arc::new(Notify::new()));

        run_poll_loop(&cycle, Duration::from_secs(120), std::future::ready(())).await;

        assert_eq!(cycle.ran_at.lock().unwrap().len(), 1);
    }

    #[test]
    fn panic_message_reads_str_and_string() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let s: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(s.as_ref()), "owned");
        let s: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(s.as_ref()), "unknown panic payload");
    }
}
