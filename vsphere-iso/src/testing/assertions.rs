//! Test assertions for run reports.

use crate::core::RunOutcome;
use crate::runner::RunReport;

/// Asserts that the run ended with the expected outcome.
pub fn assert_outcome(report: &RunReport, expected: RunOutcome) {
    assert_eq!(
        report.outcome, expected,
        "Expected outcome {:?}, got {:?}",
        expected, report.outcome
    );
}

/// Asserts that no cleanup was invoked.
pub fn assert_no_cleanup(report: &RunReport) {
    assert!(
        report.cleaned.is_empty(),
        "Expected no cleanup, but cleaned: {:?}",
        report.cleaned
    );
}

/// Asserts that cleanup ran on exactly `expected`, in that order.
pub fn assert_cleaned(report: &RunReport, expected: &[&str]) {
    let actual: Vec<&str> = report.cleaned.iter().map(String::as_str).collect();
    assert_eq!(
        actual, expected,
        "Expected cleanup order {expected:?}, got {actual:?}"
    );
}

/// Asserts that cleanup ran on the completed steps in reverse order.
pub fn assert_compensated_in_reverse(report: &RunReport) {
    let expected: Vec<&String> = report.ran.iter().rev().collect();
    let actual: Vec<&String> = report.cleaned.iter().collect();
    assert_eq!(
        actual, expected,
        "Expected cleanup to mirror {:?} in reverse",
        report.ran
    );
}
