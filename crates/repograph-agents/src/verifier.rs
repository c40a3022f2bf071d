//! Verifier — decides whether the post-edit state is eligible for a PR

use repograph_core::{CheckOutcome, TestResults, Verification};

/// `ready_for_pr` requires a successful build and zero failed tests.
/// Lint and typecheck must not have failed, but a skipped check (tool
/// unavailable) never blocks.
pub fn verify_acceptance(
    test_results: &TestResults,
    lint: CheckOutcome,
    typecheck: CheckOutcome,
) -> Verification {
    let mandatory = test_results.build_success && test_results.tests_failed == 0;
    let lint_ok = lint != CheckOutcome::Failed;
    let typecheck_ok = typecheck != CheckOutcome::Failed;
    let ready_for_pr = mandatory && lint_ok && typecheck_ok;

    let mut lines = vec![format!(
        "Build: {} | Tests: {} passed, {} failed",
        if test_results.build_success { "ok" } else { "failed" },
        test_results.tests_passed,
        test_results.tests_failed
    )];
    lines.push(format!("Lint: {:?} | Typecheck: {:?}", lint, typecheck));
    if let Some(error) = &test_results.error {
        lines.push(format!("Test runner error: {}", error));
    }
    lines.push(if ready_for_pr {
        "Changes meet acceptance criteria and are ready for a pull request.".to_string()
    } else {
        "Changes are not ready for a pull request.".to_string()
    });

    Verification {
        ready_for_pr,
        build_success: test_results.build_success,
        tests_failed: test_results.tests_failed,
        lint,
        typecheck,
        summary: lines.join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passing_tests() -> TestResults {
        TestResults {
            tests_passed: 10,
            tests_failed: 0,
            test_output: String::new(),
            build_success: true,
            exit_code: Some(0),
            error: None,
        }
    }

    #[test]
    fn clean_run_is_ready() {
        let v = verify_acceptance(&passing_tests(), CheckOutcome::Passed, CheckOutcome::Passed);
        assert!(v.ready_for_pr);
    }

    #[test]
    fn skipped_checks_do_not_block() {
        let v = verify_acceptance(&passing_tests(), CheckOutcome::Skipped, CheckOutcome::Skipped);
        assert!(v.ready_for_pr);
    }

    #[test]
    fn failed_lint_blocks() {
        let v = verify_acceptance(&passing_tests(), CheckOutcome::Failed, CheckOutcome::Skipped);
        assert!(!v.ready_for_pr);
    }

    #[test]
    fn failed_tests_block() {
        let mut results = passing_tests();
        results.tests_failed = 1;
        let v = verify_acceptance(&results, CheckOutcome::Passed, CheckOutcome::Passed);
        assert!(!v.ready_for_pr);
    }

    #[test]
    fn failed_build_blocks() {
        let mut results = passing_tests();
        results.build_success = false;
        let v = verify_acceptance(&results, CheckOutcome::Skipped, CheckOutcome::Skipped);
        assert!(!v.ready_for_pr);
        assert!(v.summary.contains("not ready"));
    }
}
