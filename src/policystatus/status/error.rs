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

use crate::policystatus::api::types::PolicyConditionReason;
use std::error::Error;
use std::fmt;

/// Failure to resolve the target of a policy against one of its ancestors.
/// Carries the reason code that is surfaced on the `Accepted` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyResolveError {
    pub reason: PolicyConditionReason,
    pub message: String,
}

impl PolicyResolveError {
    pub fn new(reason: PolicyConditionReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn target_not_found(message: impl Into<String>) -> Self {
        Self::new(PolicyConditionReason::TargetNotFound, message)
    }

    pub fn conflicted(message: impl Into<String>) -> Self {
        Self::new(PolicyConditionReason::Conflicted, message)
    }
}

impl fmt::Display for PolicyResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for PolicyResolveError {}
