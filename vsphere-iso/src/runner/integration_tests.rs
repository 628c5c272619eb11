//! End-to-end tests of the runner's ordering, compensation and
//! cancellation guarantees, against scripted steps and the simulated
//! endpoint.

#[cfg(test)]
mod tests {
    use crate::config::CommunicatorConfig;
    use crate::context::TerminalState;
    use crate::core::{RunOutcome, StepAction};
    use crate::driver::{Operation, PowerState, SimulatedConnector, SimulatedDriver};
    use crate::errors::BuildError;
    use crate::provision::{MockProvisioner, Provisioner};
    use crate::runner::StepRunner;
    use crate::steps::{
        Connect, ConfigureHardware, ConvertToTemplate, CreateSnapshot, CreateVm,
        PowerOnAndWaitForAddress, ProvisionGuest, ShutdownGuest, Step,
    };
    use crate::testing::{
        assert_cleaned, assert_compensated_in_reverse, assert_no_cleanup, assert_outcome, fixtures,
        CallLog, ScriptedStep,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn scripted(log: &CallLog, actions: &[StepAction]) -> Vec<Box<dyn Step>> {
        actions
            .iter()
            .enumerate()
            .map(|(i, action)| {
                let name = format!("s{}", i + 1);
                let step = match action {
                    StepAction::Halt => ScriptedStep::failing(name, log, format!("step {} failed", i + 1)),
                    other => ScriptedStep::new(name, log, *other),
                };
                Box::new(step) as Box<dyn Step>
            })
            .collect()
    }

    fn pipeline(sim: &Arc<SimulatedDriver>, name: &str, snapshot: bool, template: bool) -> Vec<Box<dyn Step>> {
        let mut provisioner = MockProvisioner::new();
        provisioner.expect_name().return_const("mock");
        provisioner.expect_provision().returning(|_| Ok(()));
        let provisioners: Vec<Arc<dyn Provisioner>> = vec![Arc::new(provisioner)];

        vec![
            Box::new(Connect::new(
                fixtures::connect_config(),
                Arc::new(SimulatedConnector::new(sim.clone())),
            )),
            Box::new(CreateVm::new(fixtures::create_config(name))),
            Box::new(ConfigureHardware::new(crate::config::HardwareConfig {
                cpus: 2,
                ..Default::default()
            })),
            Box::new(PowerOnAndWaitForAddress::new()),
            Box::new(ProvisionGuest::new(
                CommunicatorConfig {
                    ssh_username: "root".into(),
                    ..Default::default()
                },
                provisioners,
            )),
            Box::new(ShutdownGuest::new(Duration::from_secs(5), Duration::from_millis(5))),
            Box::new(CreateSnapshot::new(snapshot, "Created by Packer")),
            Box::new(ConvertToTemplate::new(template)),
        ]
    }

    #[tokio::test]
    async fn test_all_continue_runs_no_cleanup() {
        for n in 0..6 {
            let log = CallLog::new();
            let runner = StepRunner::new(scripted(&log, &vec![StepAction::Continue; n]));
            let mut state = fixtures::state_bag();

            let report = runner.run(&mut state).await;
            assert_outcome(&report, RunOutcome::Completed);
            assert_no_cleanup(&report);
            assert_eq!(log.runs().len(), n);
            assert!(log.cleanups().is_empty());
            assert!(!state.is_abnormal());
        }
    }

    #[tokio::test]
    async fn test_compensation_is_reverse_prefix() {
        for n in 1..=6 {
            for k in 1..=n {
                for stop in [StepAction::Halt, StepAction::Cancel] {
                    let log = CallLog::new();
                    let mut actions = vec![StepAction::Continue; n];
                    actions[k - 1] = stop;
                    let runner = StepRunner::new(scripted(&log, &actions));
                    let mut state = fixtures::state_bag();

                    let report = runner.run(&mut state).await;

                    let expected: Vec<String> = (1..k).rev().map(|i| format!("s{i}")).collect();
                    assert_eq!(log.cleanups(), expected, "n={n} k={k} stop={stop}");
                    assert_eq!(log.runs().len(), k, "steps after k must not run");
                    assert_compensated_in_reverse(&report);
                    let expected_outcome = match stop {
                        StepAction::Halt => RunOutcome::Failed,
                        _ => RunOutcome::Cancelled,
                    };
                    assert_outcome(&report, expected_outcome);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_first_step_halting_cleans_nothing() {
        let log = CallLog::new();
        let runner = StepRunner::new(scripted(&log, &[StepAction::Halt, StepAction::Continue]));
        let mut state = fixtures::state_bag();

        let report = runner.run(&mut state).await;
        assert_no_cleanup(&report);
        assert_eq!(log.entries(), vec!["run:s1"]);
    }

    #[tokio::test]
    async fn test_first_terminal_cause_survives_cleanup_failure() {
        let log = CallLog::new();
        let runner = StepRunner::new(vec![
            Box::new(ScriptedStep::continuing("a", &log).failing_cleanup("cleanup a broke")),
            Box::new(ScriptedStep::continuing("b", &log).failing_cleanup("cleanup b broke")),
            Box::new(ScriptedStep::failing("c", &log, "original failure")),
        ]);
        let (mut state, ui) = fixtures::state_bag_with_ui();

        let report = runner.run(&mut state).await;

        assert_cleaned(&report, &["b", "a"]);
        assert_eq!(report.cleanup_failures.len(), 2);
        assert!(ui.contains("cleanup b broke"));
        let err = state.take_terminal().unwrap().into_error();
        assert_eq!(err.to_string(), "Internal error: original failure");
    }

    #[tokio::test]
    async fn test_cancel_after_recorded_error_keeps_error() {
        let log = CallLog::new();
        let runner = StepRunner::new(vec![
            Box::new(ScriptedStep::continuing("a", &log)),
            Box::new(ScriptedStep::cancelling("b", &log).recording_error("disk full")),
        ]);
        let mut state = fixtures::state_bag();

        let report = runner.run(&mut state).await;
        assert_outcome(&report, RunOutcome::Failed);
        assert_eq!(state.error().unwrap().to_string(), "Internal error: disk full");
    }

    #[tokio::test]
    async fn test_cancellation_before_step_skips_it() {
        let log = CallLog::new();
        let runner = StepRunner::new(vec![
            Box::new(ScriptedStep::continuing("a", &log)),
            Box::new(ScriptedStep::continuing("b", &log).cancelling_token("operator interrupt")),
            Box::new(ScriptedStep::continuing("c", &log)),
            Box::new(ScriptedStep::continuing("d", &log)),
        ]);
        let mut state = fixtures::state_bag();

        let report = runner.run(&mut state).await;

        assert_eq!(log.runs(), vec!["a", "b"]);
        assert_cleaned(&report, &["b", "a"]);
        assert_eq!(report.skipped.as_deref(), Some("c"));
        assert_outcome(&report, RunOutcome::Cancelled);
        match state.terminal() {
            Some(TerminalState::Cancelled(reason)) => assert_eq!(reason, "operator interrupt"),
            other => panic!("expected cancellation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancellation_before_first_step() {
        let log = CallLog::new();
        let runner = StepRunner::new(scripted(&log, &[StepAction::Continue; 3]));
        let mut state = fixtures::state_bag();
        state.cancellation().cancel("early");

        let report = runner.run(&mut state).await;
        assert!(log.entries().is_empty());
        assert_no_cleanup(&report);
        assert_outcome(&report, RunOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_shutdown_deadline_is_enforced_in_pipeline() {
        let sim = Arc::new(
            SimulatedDriver::new().with_guest_behavior(crate::driver::GuestBehavior::IgnoresShutdown),
        );
        let mut steps = pipeline(&sim, "stuck", false, false);
        steps[5] = Box::new(ShutdownGuest::new(Duration::from_millis(80), Duration::from_millis(10)));
        let runner = StepRunner::new(steps);
        let mut state = fixtures::state_bag();

        let report = tokio::time::timeout(Duration::from_secs(5), runner.run(&mut state))
            .await
            .unwrap();

        assert_outcome(&report, RunOutcome::Failed);
        assert!(matches!(state.error(), Some(BuildError::Timeout(_))));
        // power_on's cleanup powers the guest off so the VM can be destroyed.
        assert_cleaned(&report, &["provision", "power_on", "configure_hardware", "create_vm", "connect"]);
        assert_eq!(sim.vm_count(), 0);
    }

    #[tokio::test]
    async fn test_panicking_step_after_create_destroys_vm() {
        let sim = Arc::new(SimulatedDriver::new());
        let mut steps = pipeline(&sim, "exploded", false, false);
        let log = CallLog::new();
        steps.insert(
            2,
            Box::new(ScriptedStep::continuing("exploding", &log).panicking_run("driver bug")),
        );
        let runner = StepRunner::new(steps);
        let mut state = fixtures::state_bag();

        let report = runner.run(&mut state).await;

        assert_outcome(&report, RunOutcome::Failed);
        assert_cleaned(&report, &["create_vm", "connect"]);
        assert_eq!(sim.call_count(Operation::DestroyVm), 1);
        assert_eq!(sim.vm_count(), 0);
        assert!(state.error().unwrap().to_string().contains("step panicked: driver bug"));
    }

    #[tokio::test]
    async fn test_address_failure_destroys_vm() {
        let sim = Arc::new(SimulatedDriver::new().with_failure(Operation::WaitForIp, "no address"));
        let runner = StepRunner::new(pipeline(&sim, "no-ip", false, false));
        let (mut state, ui) = fixtures::state_bag_with_ui();

        let report = runner.run(&mut state).await;

        assert_eq!(report.ran, vec!["connect", "create_vm", "configure_hardware"]);
        assert_cleaned(&report, &["configure_hardware", "create_vm", "connect"]);
        assert_eq!(state.error().unwrap().to_string(), "wait_for_ip failed: no address");
        assert!(ui.contains("Destroying VM..."));
        assert_eq!(sim.vm_count(), 0);

        let ops = sim.operations();
        let off = ops.iter().position(|o| *o == Operation::PowerOff).unwrap();
        let destroy = ops.iter().position(|o| *o == Operation::DestroyVm).unwrap();
        assert!(off < destroy);
    }

    #[tokio::test]
    async fn test_full_pipeline_with_snapshot() {
        let sim = Arc::new(SimulatedDriver::new());
        let runner = StepRunner::new(pipeline(&sim, "golden", true, false));
        let mut state = fixtures::state_bag();

        let report = runner.run(&mut state).await;

        assert_outcome(&report, RunOutcome::Completed);
        assert_eq!(report.ran.len(), 8);
        assert_no_cleanup(&report);
        let vm = sim.vm_named("golden").unwrap();
        assert_eq!(vm.snapshots, vec!["Created by Packer".to_string()]);
        assert!(!vm.template);
        assert_eq!(vm.power, PowerState::PoweredOff);
        assert_eq!(vm.spec.cpus, 2);
        assert_eq!(sim.call_count(Operation::MarkAsTemplate), 0);
    }

    #[tokio::test]
    async fn test_cancel_after_create_destroys_vm() {
        let sim = Arc::new(SimulatedDriver::new());
        let mut steps = pipeline(&sim, "cancelled", false, false);
        let log = CallLog::new();
        // Fires the token once create_vm has returned Continue.
        steps.insert(
            2,
            Box::new(ScriptedStep::continuing("interrupt", &log).cancelling_token("operator interrupt")),
        );
        let runner = StepRunner::new(steps);
        let mut state = fixtures::state_bag();

        let report = runner.run(&mut state).await;

        assert_outcome(&report, RunOutcome::Cancelled);
        assert_eq!(report.skipped.as_deref(), Some("configure_hardware"));
        assert_eq!(sim.call_count(Operation::Reconfigure), 0);
        assert_cleaned(&report, &["interrupt", "create_vm", "connect"]);
        assert_eq!(sim.call_count(Operation::DestroyVm), 1);
        assert_eq!(sim.vm_count(), 0);

        let err = state.take_terminal().unwrap().into_error();
        assert!(err.is_cancelled());
        assert!(!matches!(err, BuildError::Halted));
    }
}
