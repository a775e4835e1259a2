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

//! In-memory maintenance of per-ancestor policy conditions.
//!
//! Both the ancestor list and each condition list behave as ordered maps:
//! entries are located by key ((ancestor, controller) and condition type
//! respectively), updated in place when present and appended otherwise.

pub mod ancestor;
pub mod equality;
pub mod error;
pub mod message;
pub mod truncate;

pub use ancestor::{
    set_accepted_for_policy_ancestors, set_condition_for_policy_ancestor,
    set_condition_for_policy_ancestors, set_resolve_error_for_policy_ancestor,
    set_resolve_error_for_policy_ancestors, set_translation_error_for_policy_ancestors,
    ConditionChange, ConditionUpdate,
};
pub use equality::policy_status_equal;
pub use error::PolicyResolveError;
pub use message::{
    sanitize_message, truncate_condition_message, MAX_CONDITION_MESSAGE_LENGTH, TRUNCATED_SUFFIX,
};
pub use truncate::{truncate_policy_ancestors, MAX_POLICY_ANCESTORS};
