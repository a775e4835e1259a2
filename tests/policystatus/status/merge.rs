use std::io;
use std::thread;
use std::time::Duration;

use policystatus::policystatus::api::types::{
    AncestorRef, ConditionStatus, PolicyConditionReason, PolicyConditionType, PolicyStatus,
};
use policystatus::policystatus::status::ancestor::POLICY_ACCEPTED_MESSAGE;
use policystatus::policystatus::status::{
    set_accepted_for_policy_ancestors, set_condition_for_policy_ancestor,
    set_resolve_error_for_policy_ancestor, set_resolve_error_for_policy_ancestors,
    set_translation_error_for_policy_ancestors, ConditionChange, ConditionUpdate,
    PolicyResolveError, MAX_CONDITION_MESSAGE_LENGTH, TRUNCATED_SUFFIX,
};
use policystatus::policystatus::test_support::{
    fixed_time, gateway, only_condition, OTHER_CONTROLLER, TEST_CONTROLLER,
};

#[test]
fn oversized_message_is_truncated_with_marker() {
    let long_message = "a".repeat(MAX_CONDITION_MESSAGE_LENGTH + 100);
    let expected = format!(
        "{}{}",
        &long_message[..MAX_CONDITION_MESSAGE_LENGTH],
        TRUNCATED_SUFFIX
    );
    let mut status = PolicyStatus::default();

    set_condition_for_policy_ancestor(
        &mut status,
        &AncestorRef::new("test-gateway"),
        "test-controller",
        PolicyConditionType::Accepted,
        ConditionStatus::False,
        PolicyConditionReason::Invalid,
        &long_message,
        1,
    );

    let condition = only_condition(&status);
    assert_eq!(condition.message, expected);
    assert_eq!(
        condition.message.len(),
        MAX_CONDITION_MESSAGE_LENGTH + TRUNCATED_SUFFIX.len()
    );
}

#[test]
fn short_message_is_stored_verbatim() {
    let mut status = PolicyStatus::default();

    set_condition_for_policy_ancestor(
        &mut status,
        &AncestorRef::new("test-gateway"),
        "test-controller",
        PolicyConditionType::Accepted,
        ConditionStatus::True,
        PolicyConditionReason::Accepted,
        "This is a short message",
        1,
    );

    let condition = only_condition(&status);
    assert_eq!(condition.message, "This is a short message");
    assert_eq!(condition.status, ConditionStatus::True);
    assert_eq!(condition.observed_generation, 1);
}

#[test]
fn repeated_identical_calls_do_not_duplicate_entries() {
    let mut status = PolicyStatus::default();
    let update = ConditionUpdate::accepted(7);

    for offset in 0..3 {
        status.apply_condition(&gateway("eg"), TEST_CONTROLLER, &update, fixed_time(offset));
    }

    let condition = only_condition(&status);
    assert_eq!(condition.observed_generation, 7);
    assert_eq!(
        condition.last_transition_time,
        fixed_time(0)
    );
}

#[test]
fn transition_time_follows_status_changes_only() {
    let mut status = PolicyStatus::default();
    let eg = gateway("eg");
    let accepted = ConditionUpdate::accepted(1);
    let rejected =
        ConditionUpdate::rejected(PolicyConditionReason::Invalid, "port out of range", 2);

    assert_eq!(
        status.apply_condition(&eg, TEST_CONTROLLER, &accepted, fixed_time(0)),
        ConditionChange::Added
    );
    assert_eq!(
        status.apply_condition(&eg, TEST_CONTROLLER, &rejected, fixed_time(10)),
        ConditionChange::Transitioned
    );
    let flipped = only_condition(&status).last_transition_time;
    assert_eq!(flipped, fixed_time(10));

    let still_rejected =
        ConditionUpdate::rejected(PolicyConditionReason::Conflicted, "conflicts with edge", 3);
    assert_eq!(
        status.apply_condition(&eg, TEST_CONTROLLER, &still_rejected, fixed_time(20)),
        ConditionChange::Refreshed
    );

    let condition = only_condition(&status);
    assert_eq!(condition.last_transition_time, flipped);
    assert_eq!(condition.reason, PolicyConditionReason::Conflicted);
    assert_eq!(condition.message, "conflicts with edge");
    assert_eq!(condition.observed_generation, 3);
}

fn record_accepted(status: &mut PolicyStatus, condition_status: ConditionStatus, message: &str) {
    let reason = match condition_status {
        ConditionStatus::True => PolicyConditionReason::Accepted,
        _ => PolicyConditionReason::Invalid,
    };
    set_condition_for_policy_ancestor(
        status,
        &gateway("eg"),
        TEST_CONTROLLER,
        PolicyConditionType::Accepted,
        condition_status,
        reason,
        message,
        1,
    );
}

#[test]
fn wall_clock_entry_point_bumps_transition_time_on_flip_only() {
    let mut status = PolicyStatus::default();

    record_accepted(&mut status, ConditionStatus::True, "accepted");
    let accepted_at = only_condition(&status).last_transition_time;

    // Back-to-back calls land in the same wall-clock second.
    thread::sleep(Duration::from_millis(2));
    record_accepted(&mut status, ConditionStatus::False, "invalid listener");
    let rejected_at = only_condition(&status).last_transition_time;
    assert!(
        rejected_at > accepted_at,
        "status flipped but lastTransitionTime stayed at {accepted_at}"
    );

    thread::sleep(Duration::from_millis(2));
    record_accepted(&mut status, ConditionStatus::False, "invalid listener port");
    let condition = only_condition(&status);
    assert_eq!(condition.last_transition_time, rejected_at);
    assert_eq!(condition.message, "invalid listener port");
}

#[test]
fn new_condition_type_appends_without_disturbing_existing() {
    let mut status = PolicyStatus::default();
    let eg = gateway("eg");
    status.apply_condition(&eg, TEST_CONTROLLER, &ConditionUpdate::accepted(1), fixed_time(0));
    let overridden = ConditionUpdate::new(
        PolicyConditionType::Overridden,
        ConditionStatus::True,
        PolicyConditionReason::Overridden,
        "route-level policy takes precedence",
        1,
    );
    status.apply_condition(&eg, TEST_CONTROLLER, &overridden, fixed_time(5));

    assert_eq!(status.ancestors.len(), 1);
    let conditions = &status.ancestors[0].conditions;
    assert_eq!(conditions.len(), 2);
    assert_eq!(conditions[0].condition_type, PolicyConditionType::Accepted);
    assert_eq!(conditions[0].message, POLICY_ACCEPTED_MESSAGE);
    assert_eq!(
        conditions[0].last_transition_time,
        fixed_time(0)
    );
    assert_eq!(conditions[1].condition_type, PolicyConditionType::Overridden);
}

#[test]
fn ancestor_and_controller_form_the_entry_key() {
    let mut status = PolicyStatus::default();
    let update = ConditionUpdate::accepted(1);

    status.apply_condition(&gateway("eg"), TEST_CONTROLLER, &update, fixed_time(0));
    status.apply_condition(&gateway("internal"), TEST_CONTROLLER, &update, fixed_time(0));
    status.apply_condition(&gateway("eg"), OTHER_CONTROLLER, &update, fixed_time(0));
    status.apply_condition(
        &gateway("eg").with_section_name("https"),
        TEST_CONTROLLER,
        &update,
        fixed_time(0),
    );
    status.apply_condition(&gateway("eg"), TEST_CONTROLLER, &update, fixed_time(0));

    let keys: Vec<(String, &str)> = status
        .ancestors
        .iter()
        .map(|ancestor| {
            (
                ancestor.ancestor_ref.to_string(),
                ancestor.controller_name.as_str(),
            )
        })
        .collect();
    assert_eq!(
        keys,
        vec![
            ("Gateway/default/eg".to_string(), TEST_CONTROLLER),
            ("Gateway/default/internal".to_string(), TEST_CONTROLLER),
            ("Gateway/default/eg".to_string(), OTHER_CONTROLLER),
            ("Gateway/default/eg#https".to_string(), TEST_CONTROLLER),
        ]
    );
    assert!(status
        .ancestors
        .iter()
        .all(|ancestor| ancestor.conditions.len() == 1));
}

#[test]
fn bare_and_qualified_refs_are_distinct_ancestors() {
    let mut status = PolicyStatus::default();
    let update = ConditionUpdate::accepted(1);
    let bare = AncestorRef {
        namespace: Some("default".to_string()),
        ..AncestorRef::new("eg")
    };

    status.apply_condition(&bare, TEST_CONTROLLER, &update, fixed_time(0));
    status.apply_condition(&gateway("eg"), TEST_CONTROLLER, &update, fixed_time(0));

    assert_eq!(status.ancestors.len(), 2);
}

#[test]
fn accepted_helper_marks_every_ancestor() {
    let mut status = PolicyStatus::default();
    let ancestors = [gateway("eg"), gateway("internal")];

    set_accepted_for_policy_ancestors(&mut status, &ancestors, TEST_CONTROLLER, 4);

    assert_eq!(status.ancestors.len(), 2);
    for ancestor_ref in &ancestors {
        let condition = status
            .ancestor(ancestor_ref, TEST_CONTROLLER)
            .and_then(|ancestor| ancestor.condition(PolicyConditionType::Accepted))
            .expect("accepted condition");
        assert_eq!(condition.status, ConditionStatus::True);
        assert_eq!(condition.reason, PolicyConditionReason::Accepted);
        assert_eq!(condition.message, POLICY_ACCEPTED_MESSAGE);
        assert_eq!(condition.observed_generation, 4);
    }
}

#[test]
fn translation_error_rejects_with_invalid_reason() {
    let mut status = PolicyStatus::default();
    let ancestors = [gateway("eg")];
    set_accepted_for_policy_ancestors(&mut status, &ancestors, TEST_CONTROLLER, 1);

    let error = io::Error::new(io::ErrorKind::InvalidInput, "timeout must be positive");
    set_translation_error_for_policy_ancestors(&mut status, &ancestors, TEST_CONTROLLER, 2, &error);

    let condition = only_condition(&status);
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.reason, PolicyConditionReason::Invalid);
    assert_eq!(condition.message, "timeout must be positive");
    assert_eq!(condition.observed_generation, 2);
}

#[test]
fn resolve_error_carries_its_reason() {
    let mut status = PolicyStatus::default();
    let error = PolicyResolveError::target_not_found("Gateway default/eg not found");

    set_resolve_error_for_policy_ancestor(&mut status, &gateway("eg"), TEST_CONTROLLER, 3, &error);

    let condition = only_condition(&status);
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.reason, PolicyConditionReason::TargetNotFound);
    assert_eq!(condition.message, error.to_string());

    let conflict = PolicyResolveError::conflicted("another policy already targets this gateway");
    set_resolve_error_for_policy_ancestors(
        &mut status,
        &[gateway("eg"), gateway("internal")],
        TEST_CONTROLLER,
        4,
        &conflict,
    );
    assert_eq!(status.ancestors.len(), 2);
    for ancestor in &status.ancestors {
        let condition = ancestor
            .condition(PolicyConditionType::Accepted)
            .expect("accepted condition");
        assert_eq!(condition.reason, PolicyConditionReason::Conflicted);
        assert_eq!(condition.observed_generation, 4);
    }
}
