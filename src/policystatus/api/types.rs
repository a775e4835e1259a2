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

//! Policy status resources as reported on the status subresource of
//! gateway extension policies. Field names follow the upstream Gateway API
//! `PolicyStatus` schema so serialized values can be written back verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const GATEWAY_API_GROUP: &str = "gateway.networking.k8s.io";
pub const GATEWAY_KIND: &str = "Gateway";

/// Reference to the resource a policy is attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AncestorRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    #[serde(rename = "sectionName", skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
}

impl AncestorRef {
    /// Bare reference carrying only a name; group/kind are left to the
    /// reader's defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn gateway(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: Some(GATEWAY_API_GROUP.to_string()),
            kind: Some(GATEWAY_KIND.to_string()),
            namespace: Some(namespace.into()),
            name: name.into(),
            section_name: None,
            port: None,
        }
    }

    pub fn with_section_name(mut self, section_name: impl Into<String>) -> Self {
        self.section_name = Some(section_name.into());
        self
    }
}

impl Display for AncestorRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let kind = self.kind.as_deref().unwrap_or(GATEWAY_KIND);
        match self.namespace.as_deref() {
            Some(namespace) => write!(f, "{}/{}/{}", kind, namespace, self.name)?,
            None => write!(f, "{}/{}", kind, self.name)?,
        }
        if let Some(section) = self.section_name.as_deref() {
            write!(f, "#{}", section)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        }
    }
}

impl Display for ConditionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum PolicyConditionType {
    /// The policy is syntactically and semantically valid for the ancestor.
    Accepted,
    /// Another policy with higher precedence overrides this one.
    Overridden,
    /// The policy was merged with another policy targeting the same ancestor.
    Merged,
    /// Ancestors beyond the platform bound were folded into this entry.
    Aggregated,
}

impl PolicyConditionType {
    pub const fn as_str(self) -> &'static str {
        match self {
            PolicyConditionType::Accepted => "Accepted",
            PolicyConditionType::Overridden => "Overridden",
            PolicyConditionType::Merged => "Merged",
            PolicyConditionType::Aggregated => "Aggregated",
        }
    }
}

impl Display for PolicyConditionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable reasons emitted with each policy condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum PolicyConditionReason {
    Accepted,
    Conflicted,
    Invalid,
    TargetNotFound,
    Overridden,
    Merged,
    Aggregated,
}

impl PolicyConditionReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            PolicyConditionReason::Accepted => "Accepted",
            PolicyConditionReason::Conflicted => "Conflicted",
            PolicyConditionReason::Invalid => "Invalid",
            PolicyConditionReason::TargetNotFound => "TargetNotFound",
            PolicyConditionReason::Overridden => "Overridden",
            PolicyConditionReason::Merged => "Merged",
            PolicyConditionReason::Aggregated => "Aggregated",
        }
    }
}

impl Display for PolicyConditionReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PolicyCondition {
    #[serde(rename = "type")]
    pub condition_type: PolicyConditionType,
    pub status: ConditionStatus,
    pub reason: PolicyConditionReason,
    /// Human readable context, bounded by `MAX_CONDITION_MESSAGE_LENGTH`.
    pub message: String,
    #[serde(rename = "observedGeneration")]
    pub observed_generation: i64,
    /// Time of the last status change, serialized as RFC3339.
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PolicyAncestorStatus {
    #[serde(rename = "ancestorRef")]
    pub ancestor_ref: AncestorRef,
    #[serde(rename = "controllerName")]
    pub controller_name: String,
    #[serde(default)]
    pub conditions: Vec<PolicyCondition>,
}

impl PolicyAncestorStatus {
    pub fn new(ancestor_ref: AncestorRef, controller_name: impl Into<String>) -> Self {
        Self {
            ancestor_ref,
            controller_name: controller_name.into(),
            conditions: Vec::new(),
        }
    }

    pub fn matches(&self, ancestor_ref: &AncestorRef, controller_name: &str) -> bool {
        self.controller_name == controller_name && &self.ancestor_ref == ancestor_ref
    }

    pub fn condition(&self, condition_type: PolicyConditionType) -> Option<&PolicyCondition> {
        self.conditions
            .iter()
            .find(|condition| condition.condition_type == condition_type)
    }
}

/// Ordered per-ancestor status; entries are unique by
/// (ancestor reference, controller name) and keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PolicyStatus {
    #[serde(default)]
    pub ancestors: Vec<PolicyAncestorStatus>,
}

impl PolicyStatus {
    pub fn ancestor(
        &self,
        ancestor_ref: &AncestorRef,
        controller_name: &str,
    ) -> Option<&PolicyAncestorStatus> {
        self.ancestors
            .iter()
            .find(|ancestor| ancestor.matches(ancestor_ref, controller_name))
    }

    pub fn is_empty(&self) -> bool {
        self.ancestors.is_empty()
    }
}
