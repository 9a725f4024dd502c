// crates/issue-workflow-core/tests/proptest_workflow.rs
// ============================================================================
// Module: Workflow and Tag Property-Based Tests
// Description: Property tests for transition legality and tag normalization.
// Purpose: Check table invariants across every workflow state and tag input.
// ============================================================================

//! Property-based tests for workflow and tag invariants.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use issue_workflow_core::IssueStatus;
use issue_workflow_core::Resolution;
use issue_workflow_core::TagError;
use issue_workflow_core::Transition;
use issue_workflow_core::WorkflowState;
use issue_workflow_core::apply_transition;
use issue_workflow_core::list_transitions;
use issue_workflow_core::normalize_tags;
use proptest::prelude::*;

fn status_strategy() -> impl Strategy<Value = IssueStatus> {
    prop::sample::select(IssueStatus::ALL.to_vec())
}

fn resolution_strategy() -> impl Strategy<Value = Option<Resolution>> {
    prop::option::of(prop::sample::select(Resolution::ALL.to_vec()))
}

fn transition_strategy() -> impl Strategy<Value = Transition> {
    prop::sample::select(Transition::ALL.to_vec())
}

/// Expected guard per transition, written independently of the table.
fn guard_allows(transition: Transition, status: IssueStatus) -> bool {
    use IssueStatus::Closed;
    use IssueStatus::Confirmed;
    use IssueStatus::Open;
    use IssueStatus::Reopened;
    use IssueStatus::Resolved;
    match transition {
        Transition::Confirm => matches!(status, Open | Reopened),
        Transition::Unconfirm => status == Confirmed,
        Transition::Resolve | Transition::FalsePositive | Transition::WontFix => {
            matches!(status, Open | Reopened | Confirmed)
        }
        Transition::Reopen => matches!(status, Resolved | Closed),
        Transition::Close => status == Resolved,
    }
}

proptest! {
    #[test]
    fn listed_transitions_match_guards(
        status in status_strategy(),
        resolution in resolution_strategy(),
    ) {
        let listed = list_transitions(WorkflowState::new(status, resolution));
        for transition in Transition::ALL {
            prop_assert_eq!(listed.contains(&transition), guard_allows(transition, status));
        }
    }

    #[test]
    fn apply_succeeds_exactly_for_listed_transitions(
        status in status_strategy(),
        resolution in resolution_strategy(),
        transition in transition_strategy(),
    ) {
        let state = WorkflowState::new(status, resolution);
        let listed = list_transitions(state).contains(&transition);
        match apply_transition(state, transition) {
            Ok(next) => {
                prop_assert!(listed);
                let offered_again = list_transitions(next);
                prop_assert!(!offered_again.is_empty());
            }
            Err(err) => {
                prop_assert!(!listed);
                prop_assert_eq!(err.transition, transition);
                prop_assert_eq!(err.status, status);
            }
        }
    }

    #[test]
    fn resolved_states_always_carry_a_resolution(
        status in status_strategy(),
        transition in transition_strategy(),
    ) {
        if let Ok(next) = apply_transition(WorkflowState::new(status, None), transition) {
            if next.status == IssueStatus::Resolved {
                prop_assert!(next.resolution.is_some());
            }
            if matches!(next.status, IssueStatus::Confirmed | IssueStatus::Reopened) {
                prop_assert!(next.resolution.is_none());
            }
        }
    }

    #[test]
    fn normalized_tags_are_lowercase_and_order_insensitive(
        tags in prop::collection::vec("[A-Za-z0-9_.-]{1,8}", 0 .. 10),
    ) {
        let forward = normalize_tags(tags.iter().map(Some), 64).unwrap();
        let backward = normalize_tags(tags.iter().rev().map(Some), 64).unwrap();
        prop_assert_eq!(&forward, &backward);
        for tag in &forward {
            prop_assert_eq!(tag, &tag.to_lowercase());
        }
        let again = normalize_tags(forward.iter().map(Some), 64).unwrap();
        prop_assert_eq!(again, forward);
    }

    #[test]
    fn tags_with_inner_whitespace_are_rejected(
        head in "[a-z]{1,5}",
        tail in "[a-z]{1,5}",
    ) {
        let token = format!("{head} {tail}");
        let result = normalize_tags([Some(token.as_str())], 64);
        prop_assert_eq!(result, Err(TagError::InvalidFormat(token)));
    }
}

#[test]
fn blank_and_missing_tags_are_dropped() {
    let normalized =
        normalize_tags([Some("security"), None, Some(""), Some("  "), Some("Convention")], 10)
            .unwrap();
    let values: Vec<_> = normalized.into_iter().collect();
    assert_eq!(values, vec!["convention", "security"]);
}

#[test]
fn too_many_tags_are_rejected_after_deduplication() {
    assert!(normalize_tags([Some("a"), Some("A"), Some("b")], 2).is_ok());
    assert_eq!(
        normalize_tags([Some("a"), Some("b"), Some("c")], 2),
        Err(TagError::TooMany {
            max: 2,
            actual: 3,
        })
    );
}

#[test]
fn transition_keys_parse_case_insensitively() {
    assert_eq!("falsePositive".parse::<Transition>().unwrap(), Transition::FalsePositive);
    assert_eq!("wontFix".parse::<Transition>().unwrap(), Transition::WontFix);
    assert!("explode".parse::<Transition>().is_err());
}
