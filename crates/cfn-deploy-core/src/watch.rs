//! Completion polling.
//!
//! After a create or update has been accepted the watcher describes the
//! stack on a fixed interval until it lands in a success or failure status.
//! The wait is bounded by an optional timeout and can be interrupted through
//! a [`CancelToken`]; both end the watch without implying anything about the
//! operation itself, which may still be running on the engine side.

use crate::cancel::CancelToken;
use crate::engine::ProvisioningEngine;
use crate::error::Result;
use crate::locator::{locate, StackState};
use crate::types::{DeploymentOutcome, StackName, StatusClass};
use std::time::{Duration, Instant};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// WatchResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchResult {
    /// One of `Succeeded`, `Failed`, `TimedOut`, `Cancelled`.
    pub outcome: DeploymentOutcome,
    /// Last state observed; `Absent` only if the stack never appeared.
    pub last_state: StackState,
    pub polls: u32,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Watcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Watcher {
    poll_interval: Duration,
    timeout: Option<Duration>,
    cancel: CancelToken,
}

impl Default for Watcher {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, None, CancelToken::new())
    }
}

impl Watcher {
    pub fn new(poll_interval: Duration, timeout: Option<Duration>, cancel: CancelToken) -> Self {
        Self {
            poll_interval,
            timeout,
            cancel,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Block until `stack` reaches a terminal status, the timeout elapses, or
    /// the token is cancelled. Describe failures abort the watch.
    pub fn watch<E: ProvisioningEngine>(&self, engine: &E, stack: &StackName) -> Result<WatchResult> {
        let started = Instant::now();
        let deadline = self.timeout.map(|t| started + t);
        let mut polls = 0u32;
        let mut last_state = StackState::Absent;
        let mut last_label: Option<&'static str> = None;

        loop {
            if self.cancel.is_cancelled() {
                return Ok(self.finish(DeploymentOutcome::Cancelled, last_state, polls, started));
            }

            let state = locate(engine, stack)?;
            polls += 1;

            if last_label != Some(state.label()) {
                match &state {
                    StackState::Present {
                        reason: Some(reason),
                        ..
                    } => {
                        tracing::info!(stack = %stack, status = state.label(), reason = %reason, "stack status")
                    }
                    _ => tracing::info!(stack = %stack, status = state.label(), "stack status"),
                }
                last_label = Some(state.label());
            }

            let outcome = match state.status().map(|s| (s, s.class())) {
                Some((_, StatusClass::Succeeded)) => Some(DeploymentOutcome::Succeeded),
                Some((status, StatusClass::Failed)) => Some(DeploymentOutcome::Failed(status)),
                // Absent right after dispatch is read as not yet visible.
                Some((_, StatusClass::InProgress)) | None => None,
            };
            last_state = state;
            if let Some(outcome) = outcome {
                return Ok(self.finish(outcome, last_state, polls, started));
            }

            let mut pause = self.poll_interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    tracing::warn!(stack = %stack, polls, "gave up waiting for stack");
                    return Ok(self.finish(DeploymentOutcome::TimedOut, last_state, polls, started));
                }
                pause = pause.min(deadline - now);
            }

            tracing::debug!(stack = %stack, pause_ms = pause.as_millis() as u64, "waiting before next poll");
            if self.cancel.wait(pause) {
                tracing::warn!(stack = %stack, polls, "watch cancelled");
                return Ok(self.finish(DeploymentOutcome::Cancelled, last_state, polls, started));
            }
        }
    }

    fn finish(
        &self,
        outcome: DeploymentOutcome,
        last_state: StackState,
        polls: u32,
        started: Instant,
    ) -> WatchResult {
        WatchResult {
            outcome,
            last_state,
            polls,
            elapsed: started.elapsed(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, StackDescription};
    use crate::error::DeployError;
    use crate::types::{DeploymentRequest, StackStatus};
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Answers describe from a script; the last answer repeats forever.
    struct Script {
        answers: RefCell<VecDeque<std::result::Result<&'static str, EngineError>>>,
        describes: Cell<u32>,
    }

    impl Script {
        fn new(answers: Vec<std::result::Result<&'static str, EngineError>>) -> Self {
            Self {
                answers: RefCell::new(answers.into()),
                describes: Cell::new(0),
            }
        }

        fn statuses(statuses: &[&'static str]) -> Self {
            Self::new(statuses.iter().map(|s| Ok(*s)).collect())
        }
    }

    impl ProvisioningEngine for Script {
        fn describe(&self, _: &StackName) -> std::result::Result<StackDescription, EngineError> {
            self.describes.set(self.describes.get() + 1);
            let mut answers = self.answers.borrow_mut();
            let answer = if answers.len() > 1 {
                answers.pop_front().unwrap()
            } else {
                answers.front().cloned().unwrap()
            };
            answer.map(|status| StackDescription {
                stack_id: Some("stack/web/1".into()),
                status: status.into(),
                status_reason: None,
            })
        }
        fn create(&self, _: &DeploymentRequest) -> std::result::Result<String, EngineError> {
            unreachable!()
        }
        fn update(&self, _: &DeploymentRequest) -> std::result::Result<String, EngineError> {
            unreachable!()
        }
    }

    fn stack() -> StackName {
        StackName::new("web").unwrap()
    }

    fn fast() -> Watcher {
        Watcher::new(Duration::ZERO, None, CancelToken::new())
    }

    #[test]
    fn create_in_progress_then_complete_succeeds() {
        let engine = Script::statuses(&["CREATE_IN_PROGRESS", "CREATE_COMPLETE"]);
        let result = fast().watch(&engine, &stack()).unwrap();
        assert_eq!(result.outcome, DeploymentOutcome::Succeeded);
        assert_eq!(result.polls, 2);
        assert_eq!(result.last_state.status(), Some(StackStatus::CreateComplete));
    }

    #[test]
    fn keeps_polling_an_unchanged_in_progress_status() {
        let mut answers = vec!["UPDATE_IN_PROGRESS"; 50];
        answers.push("UPDATE_COMPLETE");
        let engine = Script::statuses(&answers);
        let result = fast().watch(&engine, &stack()).unwrap();
        assert_eq!(result.outcome, DeploymentOutcome::Succeeded);
        assert_eq!(engine.describes.get(), 51);
    }

    #[test]
    fn every_success_status_succeeds() {
        for status in StackStatus::all()
            .iter()
            .filter(|s| s.class() == StatusClass::Succeeded)
        {
            let engine = Script::statuses(&[status.as_str()]);
            let result = fast().watch(&engine, &stack()).unwrap();
            assert_eq!(result.outcome, DeploymentOutcome::Succeeded, "{status}");
        }
    }

    #[test]
    fn every_failure_status_fails_with_that_status() {
        for status in StackStatus::all()
            .iter()
            .filter(|s| s.class() == StatusClass::Failed)
        {
            let engine = Script::statuses(&[status.as_str()]);
            let result = fast().watch(&engine, &stack()).unwrap();
            assert_eq!(result.outcome, DeploymentOutcome::Failed(*status));
        }
    }

    #[test]
    fn rollback_in_progress_is_followed_to_its_final_status() {
        let engine = Script::statuses(&[
            "UPDATE_IN_PROGRESS",
            "UPDATE_ROLLBACK_IN_PROGRESS",
            "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS",
            "UPDATE_ROLLBACK_COMPLETE",
        ]);
        let result = fast().watch(&engine, &stack()).unwrap();
        assert_eq!(
            result.outcome,
            DeploymentOutcome::Failed(StackStatus::UpdateRollbackComplete)
        );
        assert_eq!(result.polls, 4);
    }

    #[test]
    fn not_yet_visible_stack_keeps_polling() {
        let engine = Script::new(vec![
            Err(EngineError::StackNotFound),
            Ok("CREATE_IN_PROGRESS"),
            Ok("CREATE_COMPLETE"),
        ]);
        let result = fast().watch(&engine, &stack()).unwrap();
        assert_eq!(result.outcome, DeploymentOutcome::Succeeded);
        assert_eq!(result.polls, 3);
    }

    #[test]
    fn timeout_ends_the_watch() {
        let engine = Script::statuses(&["CREATE_IN_PROGRESS"]);
        let watcher = Watcher::new(
            Duration::from_millis(5),
            Some(Duration::from_millis(30)),
            CancelToken::new(),
        );
        let result = watcher.watch(&engine, &stack()).unwrap();
        assert_eq!(result.outcome, DeploymentOutcome::TimedOut);
        assert!(result.polls >= 1);
        assert_eq!(result.last_state.status(), Some(StackStatus::CreateInProgress));
    }

    #[test]
    fn zero_timeout_polls_once() {
        let engine = Script::statuses(&["UPDATE_IN_PROGRESS"]);
        let watcher = Watcher::new(Duration::from_secs(15), Some(Duration::ZERO), CancelToken::new());
        let result = watcher.watch(&engine, &stack()).unwrap();
        assert_eq!(result.outcome, DeploymentOutcome::TimedOut);
        assert_eq!(result.polls, 1);
    }

    #[test]
    fn cancelled_before_first_poll() {
        let engine = Script::statuses(&["CREATE_COMPLETE"]);
        let token = CancelToken::new();
        token.cancel();
        let watcher = Watcher::new(Duration::ZERO, None, token);
        let result = watcher.watch(&engine, &stack()).unwrap();
        assert_eq!(result.outcome, DeploymentOutcome::Cancelled);
        assert_eq!(engine.describes.get(), 0);
    }

    #[test]
    fn cancel_interrupts_the_wait() {
        let engine = Script::statuses(&["UPDATE_IN_PROGRESS"]);
        let token = CancelToken::new();
        let handle = token.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            handle.cancel();
        });
        let watcher = Watcher::new(Duration::from_secs(3600), None, token);
        let result = watcher.watch(&engine, &stack()).unwrap();
        canceller.join().unwrap();
        assert_eq!(result.outcome, DeploymentOutcome::Cancelled);
        assert_eq!(result.polls, 1);
    }

    #[test]
    fn describe_failure_aborts() {
        let engine = Script::new(vec![
            Ok("CREATE_IN_PROGRESS"),
            Err(EngineError::Transport("throttled".into())),
        ]);
        let err = fast().watch(&engine, &stack()).unwrap_err();
        assert!(matches!(err, DeployError::Transport { .. }));
    }

    #[test]
    fn defaults() {
        let watcher = Watcher::default();
        assert_eq!(watcher.poll_interval(), Duration::from_secs(15));
        assert_eq!(watcher.timeout(), None);
    }
}
