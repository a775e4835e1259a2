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

use crate::policystatus::api::types::{PolicyAncestorStatus, PolicyCondition, PolicyStatus};

/// Compares two statuses ignoring `lastTransitionTime`. Ordering matters:
/// a reordered list is reported as different.
pub fn policy_status_equal(left: &PolicyStatus, right: &PolicyStatus) -> bool {
    left.ancestors.len() == right.ancestors.len()
        && left
            .ancestors
            .iter()
            .zip(right.ancestors.iter())
            .all(|(a, b)| ancestor_equal(a, b))
}

fn ancestor_equal(left: &PolicyAncestorStatus, right: &PolicyAncestorStatus) -> bool {
    left.ancestor_ref == right.ancestor_ref
        && left.controller_name == right.controller_name
        && left.conditions.len() == right.conditions.len()
        && left
            .conditions
            .iter()
            .zip(right.conditions.iter())
            .all(|(a, b)| condition_equal(a, b))
}

fn condition_equal(left: &PolicyCondition, right: &PolicyCondition) -> bool {
    left.condition_type == right.condition_type
        && left.status == right.status
        && left.reason == right.reason
        && left.message == right.message
        && left.observed_generation == right.observed_generation
}
