/*
 * Copyright (C) 2024 The Nanocloud Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use crate::policystatus::api::types::{
    AncestorRef, ConditionStatus, PolicyAncestorStatus, PolicyCondition, PolicyConditionReason,
    PolicyConditionType, PolicyStatus,
};
use crate::policystatus::status::error::PolicyResolveError;
use crate::policystatus::status::message::truncate_condition_message;
use chrono::{DateTime, Utc};
use std::error::Error;

pub const POLICY_ACCEPTED_MESSAGE: &str = "Policy has been accepted.";

/// Values reported for one condition on one ancestor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionUpdate {
    pub condition_type: PolicyConditionType,
    pub status: ConditionStatus,
    pub reason: PolicyConditionReason,
    pub message: String,
    pub observed_generation: i64,
}

impl ConditionUpdate {
    pub fn new(
        condition_type: PolicyConditionType,
        status: ConditionStatus,
        reason: PolicyConditionReason,
        message: impl Into<String>,
        observed_generation: i64,
    ) -> Self {
        Self {
            condition_type,
            status,
            reason,
            message: message.into(),
            observed_generation,
        }
    }

    pub fn accepted(observed_generation: i64) -> Self {
        Self::new(
            PolicyConditionType::Accepted,
            ConditionStatus::True,
            PolicyConditionReason::Accepted,
            POLICY_ACCEPTED_MESSAGE,
            observed_generation,
        )
    }

    pub fn rejected(
        reason: PolicyConditionReason,
        message: impl Into<String>,
        observed_generation: i64,
    ) -> Self {
        Self::new(
            PolicyConditionType::Accepted,
            ConditionStatus::False,
            reason,
            message,
            observed_generation,
        )
    }
}

/// Outcome of merging a [`ConditionUpdate`] into a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionChange {
    /// No condition of this type existed for the ancestor.
    Added,
    /// Status value flipped; the transition time was bumped.
    Transitioned,
    /// Reason, message or generation changed while the status held.
    Refreshed,
    Unchanged,
}

impl ConditionChange {
    pub fn is_changed(self) -> bool {
        !matches!(self, ConditionChange::Unchanged)
    }
}

impl PolicyStatus {
    /// Upserts `update` under (`ancestor_ref`, `controller_name`).
    ///
    /// New ancestors and new condition types are appended, so existing
    /// entries keep their position. `lastTransitionTime` is only set to `now`
    /// when the condition is created or its status value changes.
    pub fn apply_condition(
        &mut self,
        ancestor_ref: &AncestorRef,
        controller_name: &str,
        update: &ConditionUpdate,
        now: DateTime<Utc>,
    ) -> ConditionChange {
        let message = truncate_condition_message(&update.message);
        let ancestor = self.ancestor_entry(ancestor_ref, controller_name);

        match ancestor
            .conditions
            .iter_mut()
            .find(|condition| condition.condition_type == update.condition_type)
        {
            Some(existing) => merge_condition(existing, update, &message, now),
            None => {
                ancestor.conditions.push(PolicyCondition {
                    condition_type: update.condition_type,
                    status: update.status,
                    reason: update.reason,
                    message: message.into_owned(),
                    observed_generation: update.observed_generation,
                    last_transition_time: now,
                });
                ConditionChange::Added
            }
        }
    }

    /// Consuming form of [`PolicyStatus::apply_condition`].
    pub fn with_condition(
        mut self,
        ancestor_ref: &AncestorRef,
        controller_name: &str,
        update: &ConditionUpdate,
        now: DateTime<Utc>,
    ) -> Self {
        self.apply_condition(ancestor_ref, controller_name, update, now);
        self
    }

    /// Drops entries owned by `controller_name` whose ancestor is not in
    /// `attached`. Entries reported by other controllers are left alone.
    /// Returns the number of removed entries.
    pub fn retain_controller_ancestors(
        &mut self,
        controller_name: &str,
        attached: &[AncestorRef],
    ) -> usize {
        let before = self.ancestors.len();
        self.ancestors.retain(|ancestor| {
            ancestor.controller_name != controller_name
                || attached.contains(&ancestor.ancestor_ref)
        });
        before - self.ancestors.len()
    }

    fn ancestor_entry(
        &mut self,
        ancestor_ref: &AncestorRef,
        controller_name: &str,
    ) -> &mut PolicyAncestorStatus {
        let index = match self
            .ancestors
            .iter()
            .position(|ancestor| ancestor.matches(ancestor_ref, controller_name))
        {
            Some(index) => index,
            None => {
                self.ancestors.push(PolicyAncestorStatus::new(
                    ancestor_ref.clone(),
                    controller_name,
                ));
                self.ancestors.len() - 1
            }
        };
        &mut self.ancestors[index]
    }
}

fn merge_condition(
    existing: &mut PolicyCondition,
    update: &ConditionUpdate,
    message: &str,
    now: DateTime<Utc>,
) -> ConditionChange {
    if existing.status != update.status {
        existing.status = update.status;
        existing.reason = update.reason;
        existing.message = message.to_string();
        existing.observed_generation = update.observed_generation;
        existing.last_transition_time = now;
        return ConditionChange::Transitioned;
    }

    if existing.reason == update.reason
        && existing.message == message
        && existing.observed_generation == update.observed_generation
    {
        return ConditionChange::Unchanged;
    }

    existing.reason = update.reason;
    existing.message = message.to_string();
    existing.observed_generation = update.observed_generation;
    ConditionChange::Refreshed
}

/// Records a single condition decision for one ancestor using the current
/// wall-clock time.
#[allow(clippy::too_many_arguments)]
pub fn set_condition_for_policy_ancestor(
    policy_status: &mut PolicyStatus,
    ancestor_ref: &AncestorRef,
    controller_name: &str,
    condition_type: PolicyConditionType,
    status: ConditionStatus,
    reason: PolicyConditionReason,
    message: &str,
    generation: i64,
) {
    let update = ConditionUpdate::new(condition_type, status, reason, message, generation);
    policy_status.apply_condition(ancestor_ref, controller_name, &update, Utc::now());
}

pub fn set_condition_for_policy_ancestors(
    policy_status: &mut PolicyStatus,
    ancestor_refs: &[AncestorRef],
    controller_name: &str,
    update: &ConditionUpdate,
) {
    let now = Utc::now();
    for ancestor_ref in ancestor_refs {
        policy_status.apply_condition(ancestor_ref, controller_name, update, now);
    }
}

pub fn set_accepted_for_policy_ancestors(
    policy_status: &mut PolicyStatus,
    ancestor_refs: &[AncestorRef],
    controller_name: &str,
    generation: i64,
) {
    set_condition_for_policy_ancestors(
        policy_status,
        ancestor_refs,
        controller_name,
        &ConditionUpdate::accepted(generation),
    );
}

pub fn set_translation_error_for_policy_ancestors(
    policy_status: &mut PolicyStatus,
    ancestor_refs: &[AncestorRef],
    controller_name: &str,
    generation: i64,
    error: &(dyn Error + '_),
) {
    let update = ConditionUpdate::rejected(
        PolicyConditionReason::Invalid,
        error.to_string(),
        generation,
    );
    set_condition_for_policy_ancestors(policy_status, ancestor_refs, controller_name, &update);
}

pub fn set_resolve_error_for_policy_ancestor(
    policy_status: &mut PolicyStatus,
    ancestor_ref: &AncestorRef,
    controller_name: &str,
    generation: i64,
    error: &PolicyResolveError,
) {
    set_resolve_error_for_policy_ancestors(
        policy_status,
        std::slice::from_ref(ancestor_ref),
        controller_name,
        generation,
        error,
    );
}

pub fn set_resolve_error_for_policy_ancestors(
    policy_status: &mut PolicyStatus,
    ancestor_refs: &[AncestorRef],
    controller_name: &str,
    generation: i64,
    error: &PolicyResolveError,
) {
    let update = ConditionUpdate::rejected(error.reason, error.message.clone(), generation);
    set_condition_for_policy_ancestors(policy_status, ancestor_refs, controller_name, &update);
}
