//! Escalation timer — delayed no-response checks.
//!
//! One scheduled task per (patient, day) cycle. The task sleeps for the
//! full reply window plus the propagation buffer and then invokes the
//! engine's timeout check. There is no cancellation on the reply path:
//! suppression happens purely through the engine's re-read of
//! conversation state. `cancel` exists as an explicit hook but nothing
//! in the shipped policy calls it.
//!
//! In-process only: a scheduled check does not survive a restart. A
//! deployment that needs that guarantee must drive `escalation_check`
//! from a durable scheduler instead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::FollowupEngine;

type CycleKey = (String, u32);

#[derive(Default)]
pub struct EscalationTimer {
    tasks: Mutex<HashMap<CycleKey, JoinHandle<()>>>,
}

impl EscalationTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule the timeout check for one cycle. Re-scheduling the same
    /// cycle replaces (and aborts) the previous task.
    pub fn schedule(
        &self,
        engine: Arc<FollowupEngine>,
        patient_key: String,
        day: u32,
        delay: Duration,
    ) {
        let key = (patient_key.clone(), day);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            engine.escalation_check(&patient_key, day).await;
            engine.timer().finish(&patient_key, day);
        });

        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(old) = tasks.insert(key, handle) {
                tracing::debug!(day, "Replacing already-scheduled escalation check");
                old.abort();
            }
        }
    }

    /// Abort a scheduled check. Returns whether one was pending.
    /// Exposed for callers that can prove the cycle is over; the engine
    /// itself relies on the re-read check instead.
    pub fn cancel(&self, patient_key: &str, day: u32) -> bool {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(handle) = tasks.remove(&(patient_key.to_string(), day)) {
                handle.abort();
                return true;
            }
        }
        false
    }

    /// Number of cycles with a check still scheduled.
    pub fn pending(&self) -> usize {
        self.tasks.lock().map(|t| t.len()).unwrap_or(0)
    }

    fn finish(&self, patient_key: &str, day: u32) {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.remove(&(patient_key.to_string(), day));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::analysis::ParameterInterpreter;
    use crate::completion::{CompletionError, CompletionService};
    use crate::config::EngineConfig;
    use crate::notify::{
        DeliveryError, EmailSender, MessageSender, NotificationDispatcher,
    };
    use crate::store::MemoryStore;

    struct Null;

    #[async_trait]
    impl MessageSender for Null {
        async fn send(&self, _: &str, _: &str) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    #[async_trait]
    impl EmailSender for Null {
        async fn send(&self, _: &str, _: &str, _: &str) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    #[async_trait]
    impl CompletionService for Null {
        async fn complete(&self, _: &str) -> Result<String, CompletionError> {
            Ok("{}".into())
        }
    }

    // Engine with an empty store: a fired check reads nothing and
    // stands down, so these tests only observe the task bookkeeping.
    fn engine() -> Arc<FollowupEngine> {
        FollowupEngine::new(
            MemoryStore::shared(),
            NotificationDispatcher::new(Arc::new(Null), Arc::new(Null), None, None),
            ParameterInterpreter::new(Arc::new(Null)),
            EngineConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn fired_check_is_removed_from_pending() {
        let engine = engine();
        engine.timer().schedule(
            Arc::clone(&engine),
            "p1".into(),
            1,
            Duration::from_secs(5),
        );
        assert_eq!(engine.timer().pending(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(engine.timer().pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_aborts_a_scheduled_check() {
        let engine = engine();
        engine.timer().schedule(
            Arc::clone(&engine),
            "p1".into(),
            1,
            Duration::from_secs(5),
        );
        assert!(engine.timer().cancel("p1", 1));
        assert_eq!(engine.timer().pending(), 0);
        // Cancelling again reports nothing pending.
        assert!(!engine.timer().cancel("p1", 1));
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_same_cycle_replaces_the_task() {
        let engine = engine();
        for _ in 0..2 {
            engine.timer().schedule(
                Arc::clone(&engine),
                "p1".into(),
                1,
                Duration::from_secs(5),
            );
        }
        assert_eq!(engine.timer().pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cycles_are_tracked_independently() {
        let engine = engine();
        engine.timer().schedule(Arc::clone(&engine), "p1".into(), 1, Duration::from_secs(5));
        engine.timer().schedule(Arc::clone(&engine), "p1".into(), 2, Duration::from_secs(5));
        engine.timer().schedule(Arc::clone(&engine), "p2".into(), 1, Duration::from_secs(5));
        assert_eq!(engine.timer().pending(), 3);
        assert!(engine.timer().cancel("p1", 2));
        assert_eq!(engine.timer().pending(), 2);
    }
}
