//! The step runner: ordered execution with reverse-order compensation.

use super::report::{CleanupFailure, RunReport};
use crate::context::{StateBag, TerminalState};
use crate::core::{BuildEvent, RunOutcome, StepAction};
use crate::errors::BuildError;
use crate::events::{EventSink, NoOpEventSink};
use crate::observability::SpanTimer;
use crate::steps::Step;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

/// Drives an ordered list of steps against one state bag.
///
/// Each step runs at most once, strictly in order. When a step halts or
/// cancels, or cancellation is observed between steps, the steps whose run
/// returned `Continue` are cleaned up in reverse order. The first terminal
/// cause recorded in the state bag is the one the run reports.
pub struct StepRunner {
    steps: Vec<Box<dyn Step>>,
    events: Arc<dyn EventSink>,
}

impl StepRunner {
    /// Creates a runner for the given steps.
    #[must_use]
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            steps,
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Returns the step names, in order.
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if there are no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step, compensating on abnormal termination.
    ///
    /// The terminal marker, if any, is left in `state` for the caller.
    pub async fn run(&self, state: &mut StateBag) -> RunReport {
        let span = info_span!("build", run_id = %state.identity().run_id);
        self.drive(state).instrument(span).await
    }

    async fn drive(&self, state: &mut StateBag) -> RunReport {
        let timer = SpanTimer::start("build");
        let mut report = RunReport::new(state.identity().run_id);
        let mut ran: Vec<&dyn Step> = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            if self.cancelled_before(step.as_ref(), state, &mut report).await {
                break;
            }
            if self.run_step(step.as_ref(), state).await {
                ran.push(step.as_ref());
                report.ran.push(step.name().to_string());
            } else {
                break;
            }
        }

        if state.is_abnormal() {
            for step in ran.iter().rev() {
                self.cleanup_step(*step, state, &mut report).await;
            }
        }

        report.outcome = match state.terminal() {
            None => RunOutcome::Completed,
            Some(TerminalState::Failed(_)) => RunOutcome::Failed,
            Some(TerminalState::Cancelled(_)) => RunOutcome::Cancelled,
            Some(TerminalState::Halted) => RunOutcome::Halted,
        };
        report.duration_ms = timer.finish();

        info!(
            outcome = %report.outcome,
            steps_ran = report.ran.len(),
            steps_cleaned = report.cleaned.len(),
            duration_ms = report.duration_ms,
            "build finished"
        );
        self.events
            .emit_event(BuildEvent::build_finished(
                &report.run_id.to_string(),
                &report.outcome.to_string(),
                report.duration_ms,
            ))
            .await;
        report
    }

    /// Records cancellation if it was requested before `step` started.
    async fn cancelled_before(&self, step: &dyn Step, state: &mut StateBag, report: &mut RunReport) -> bool {
        let cancel = state.cancellation();
        if !cancel.is_cancelled() {
            return false;
        }
        let reason = cancel.reason_or_default();
        info!(step = step.name(), reason = %reason, "cancellation observed, skipping remaining steps");
        self.events
            .emit_event(BuildEvent::step_skipped(step.name(), &reason))
            .await;
        state.record(TerminalState::Cancelled(reason));
        report.skipped = Some(step.name().to_string());
        true
    }

    /// Runs one step. Returns true if the build may proceed.
    async fn run_step(&self, step: &dyn Step, state: &mut StateBag) -> bool {
        let name = step.name();
        self.events.emit_event(BuildEvent::step_started(name)).await;
        info!(step = name, "step started");

        let timer = SpanTimer::start(name);
        let outcome = AssertUnwindSafe(step.run(state)).catch_unwind().await;
        let duration_ms = timer.finish();

        let action = match outcome {
            Ok(action) => action,
            Err(payload) => {
                let message = format!("step panicked: {}", panic_message(payload.as_ref()));
                error!(step = name, duration_ms, error = %message, "step panicked");
                state.record(TerminalState::Failed(BuildError::Internal(message)));
                let recorded = state.error().map(ToString::to_string);
                self.events
                    .emit_event(BuildEvent::step_halted(name, recorded.as_deref()))
                    .await;
                return false;
            }
        };

        match action {
            StepAction::Continue if !state.is_abnormal() => {
                info!(step = name, duration_ms, "step completed");
                self.events
                    .emit_event(BuildEvent::step_completed(name, duration_ms))
                    .await;
                true
            }
            StepAction::Continue | StepAction::Halt => {
                if action == StepAction::Continue {
                    warn!(step = name, "step returned continue with a terminal state recorded; treating as halt");
                }
                if !state.is_abnormal() {
                    state.record(TerminalState::Halted);
                }
                let message = state.error().map(ToString::to_string);
                error!(step = name, duration_ms, error = ?message, "step halted");
                self.events
                    .emit_event(BuildEvent::step_halted(name, message.as_deref()))
                    .await;
                false
            }
            StepAction::Cancel => {
                if !state.is_abnormal() {
                    let reason = state.cancellation().reason_or_default();
                    state.record(TerminalState::Cancelled(reason));
                }
                let reason = match state.terminal() {
                    Some(TerminalState::Cancelled(reason)) => reason.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                info!(step = name, duration_ms, reason = %reason, "step cancelled");
                self.events
                    .emit_event(BuildEvent::step_cancelled(name, &reason))
                    .await;
                false
            }
        }
    }

    /// Invokes one cleanup. Failures and panics are reported, never raised.
    async fn cleanup_step(&self, step: &dyn Step, state: &mut StateBag, report: &mut RunReport) {
        let name = step.name();
        report.cleaned.push(name.to_string());

        let timer = SpanTimer::start(name);
        let outcome = AssertUnwindSafe(step.cleanup(state)).catch_unwind().await;
        let duration_ms = timer.finish();

        let message = match outcome {
            Ok(Ok(())) => {
                info!(step = name, duration_ms, "cleanup completed");
                self.events
                    .emit_event(BuildEvent::cleanup_completed(name, duration_ms))
                    .await;
                return;
            }
            Ok(Err(err)) => err.to_string(),
            Err(payload) => format!("cleanup panicked: {}", panic_message(payload.as_ref())),
        };

        warn!(step = name, error = %message, "cleanup failed");
        state.ui().error(&format!("Error cleaning up {name}: {message}"));
        self.events
            .emit_event(BuildEvent::cleanup_failed(name, &message))
            .await;
        report.cleanup_failures.push(CleanupFailure {
            step: name.to_string(),
            message,
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl fmt::Debug for StepRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRunner")
            .field("steps", &self.step_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::testing::{fixtures, CallLog, ScriptedStep};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_empty_runner_completes() {
        let runner = StepRunner::new(Vec::new());
        let mut state = fixtures::state_bag();

        let report = runner.run(&mut state).await;
        assert!(runner.is_empty());
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert!(report.cleaned.is_empty());
    }

    #[tokio::test]
    async fn test_halt_without_error_is_halted() {
        let log = CallLog::new();
        let runner = StepRunner::new(vec![
            Box::new(ScriptedStep::continuing("a", &log)),
            Box::new(ScriptedStep::new("b", &log, StepAction::Halt)),
        ]);
        let mut state = fixtures::state_bag();

        let report = runner.run(&mut state).await;
        assert_eq!(report.outcome, RunOutcome::Halted);
        assert!(matches!(state.terminal(), Some(TerminalState::Halted)));
        assert_eq!(log.entries(), vec!["run:a", "run:b", "cleanup:a"]);
    }

    #[tokio::test]
    async fn test_continue_with_recorded_error_is_halt() {
        let log = CallLog::new();
        let runner = StepRunner::new(vec![
            Box::new(ScriptedStep::continuing("a", &log)),
            Box::new(ScriptedStep::continuing("liar", &log).recording_error("oops")),
            Box::new(ScriptedStep::continuing("c", &log)),
        ]);
        let mut state = fixtures::state_bag();

        let report = runner.run(&mut state).await;
        assert_eq!(report.outcome, RunOutcome::Failed);
        assert_eq!(report.ran, vec!["a".to_string()]);
        assert_eq!(log.entries(), vec!["run:a", "run:liar", "cleanup:a"]);
    }

    #[tokio::test]
    async fn test_cleanup_panic_is_contained() {
        let log = CallLog::new();
        let runner = StepRunner::new(vec![
            Box::new(ScriptedStep::continuing("a", &log)),
            Box::new(ScriptedStep::continuing("b", &log).panicking_cleanup()),
            Box::new(ScriptedStep::failing("c", &log, "boom")),
        ]);
        let mut state = fixtures::state_bag();

        let report = runner.run(&mut state).await;
        assert_eq!(report.cleaned, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(report.cleanup_failures.len(), 1);
        assert!(report.cleanup_failures[0].message.contains("cleanup panicked"));
        assert_eq!(state.error().unwrap().to_string(), "Internal error: boom");
    }

    #[tokio::test]
    async fn test_run_panic_fails_build_and_compensates() {
        let log = CallLog::new();
        let sink = Arc::new(CollectingEventSink::new());
        let runner = StepRunner::new(vec![
            Box::new(ScriptedStep::continuing("a", &log)),
            Box::new(ScriptedStep::continuing("b", &log)),
            Box::new(ScriptedStep::continuing("exploding", &log).panicking_run("disk controller gone")),
            Box::new(ScriptedStep::continuing("d", &log)),
        ])
        .with_event_sink(sink.clone());
        let mut state = fixtures::state_bag();

        let report = runner.run(&mut state).await;

        assert_eq!(report.outcome, RunOutcome::Failed);
        assert_eq!(report.ran, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(report.cleaned, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(log.runs(), vec!["a", "b", "exploding"]);
        assert!(log.cleanups().iter().all(|s| s != "exploding"));
        assert_eq!(
            state.error().unwrap().to_string(),
            "Internal error: step panicked: disk controller gone"
        );
        assert_eq!(sink.steps_for("step.halted"), vec!["exploding"]);
    }

    #[tokio::test]
    async fn test_events_follow_transitions() {
        let log = CallLog::new();
        let sink = Arc::new(CollectingEventSink::new());
        let runner = StepRunner::new(vec![
            Box::new(ScriptedStep::continuing("a", &log)),
            Box::new(ScriptedStep::failing("b", &log, "bad")),
        ])
        .with_event_sink(sink.clone());
        let mut state = fixtures::state_bag();

        runner.run(&mut state).await;
        assert_eq!(
            sink.event_types(),
            vec![
                "step.started",
                "step.completed",
                "step.started",
                "step.halted",
                "cleanup.completed",
                "build.finished"
            ]
        );
        assert_eq!(sink.steps_for("cleanup.completed"), vec!["a"]);
        assert_eq!(sink.steps_for("step.halted"), vec!["b"]);
    }
}
