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
    AncestorRef, ConditionStatus, PolicyConditionReason, PolicyConditionType, PolicyStatus,
};
use crate::policystatus::status::ancestor::ConditionUpdate;
use chrono::{DateTime, Utc};

/// Maximum number of ancestor entries the status subresource accepts.
pub const MAX_POLICY_ANCESTORS: usize = 16;

pub fn aggregated_message() -> String {
    format!(
        "Ancestors have been aggregated because the number of policy ancestors exceeds {}.",
        MAX_POLICY_ANCESTORS
    )
}

/// Trims the ancestor list to [`MAX_POLICY_ANCESTORS`] entries.
///
/// Entries past the bound are dropped in reverse insertion order and every
/// retained entry owned by `controller_name` gets an `Aggregated` condition
/// so readers can tell the list is incomplete. Returns how many entries were
/// removed.
///
/// A list below the bound cannot be missing entries, so any `Aggregated`
/// condition left on this controller's entries by an earlier pass is
/// dropped. A list exactly at the bound keeps its marker.
pub fn truncate_policy_ancestors(
    policy_status: &mut PolicyStatus,
    controller_name: &str,
    generation: i64,
    now: DateTime<Utc>,
) -> usize {
    if policy_status.ancestors.len() < MAX_POLICY_ANCESTORS {
        clear_aggregated(policy_status, controller_name);
        return 0;
    }
    if policy_status.ancestors.len() == MAX_POLICY_ANCESTORS {
        return 0;
    }

    let removed = policy_status.ancestors.len() - MAX_POLICY_ANCESTORS;
    policy_status.ancestors.truncate(MAX_POLICY_ANCESTORS);

    let update = ConditionUpdate::new(
        PolicyConditionType::Aggregated,
        ConditionStatus::True,
        PolicyConditionReason::Aggregated,
        aggregated_message(),
        generation,
    );
    let owned: Vec<AncestorRef> = policy_status
        .ancestors
        .iter()
        .filter(|ancestor| ancestor.controller_name == controller_name)
        .map(|ancestor| ancestor.ancestor_ref.clone())
        .collect();
    for ancestor_ref in &owned {
        policy_status.apply_condition(ancestor_ref, controller_name, &update, now);
    }

    removed
}

fn clear_aggregated(policy_status: &mut PolicyStatus, controller_name: &str) {
    for ancestor in policy_status
        .ancestors
        .iter_mut()
        .filter(|ancestor| ancestor.controller_name == controller_name)
    {
        ancestor
            .conditions
            .retain(|condition| condition.condition_type != PolicyConditionType::Aggregated);
    }
}
