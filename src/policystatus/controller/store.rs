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

use crate::policystatus::api::types::PolicyStatus;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard};

/// Identifies a policy object whose status is being written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyKey {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl PolicyKey {
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl Display for PolicyKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedStatus {
    pub status: PolicyStatus,
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { version: u64 },
    /// The stored version moved since it was read.
    Conflict,
    /// The policy object no longer exists.
    NotFound,
}

/// Persistence seam for policy status. Writes use optimistic concurrency:
/// `expected_version` must match the stored version for the write to land.
pub trait StatusStore: Send + Sync {
    fn load(&self, key: &PolicyKey)
        -> Result<Option<VersionedStatus>, Box<dyn Error + Send + Sync>>;

    fn write(
        &self,
        key: &PolicyKey,
        status: &PolicyStatus,
        expected_version: u64,
    ) -> Result<WriteOutcome, Box<dyn Error + Send + Sync>>;
}

/// Process-local [`StatusStore`]; every successful write bumps the version.
#[derive(Debug, Default)]
pub struct InMemoryStatusStore {
    entries: Mutex<HashMap<PolicyKey, VersionedStatus>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PolicyKey, VersionedStatus>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes `key` known with an empty status. Existing entries are kept.
    pub fn register(&self, key: PolicyKey) {
        self.entries().entry(key).or_insert_with(|| VersionedStatus {
            status: PolicyStatus::default(),
            version: 1,
        });
    }

    pub fn remove(&self, key: &PolicyKey) -> Option<VersionedStatus> {
        self.entries().remove(key)
    }

    pub fn get(&self, key: &PolicyKey) -> Option<VersionedStatus> {
        self.entries().get(key).cloned()
    }

    /// Overwrites the status regardless of version, as a competing writer
    /// would. Returns the new version, or `None` when `key` is unknown.
    pub fn replace(&self, key: &PolicyKey, status: PolicyStatus) -> Option<u64> {
        let mut entries = self.entries();
        let entry = entries.get_mut(key)?;
        entry.status = status;
        entry.version += 1;
        Some(entry.version)
    }
}

impl StatusStore for InMemoryStatusStore {
    fn load(
        &self,
        key: &PolicyKey,
    ) -> Result<Option<VersionedStatus>, Box<dyn Error + Send + Sync>> {
        Ok(self.get(key))
    }

    fn write(
        &self,
        key: &PolicyKey,
        status: &PolicyStatus,
        expected_version: u64,
    ) -> Result<WriteOutcome, Box<dyn Error + Send + Sync>> {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return Ok(WriteOutcome::NotFound);
        };
        if entry.version != expected_version {
            return Ok(WriteOutcome::Conflict);
        }
        entry.status = status.clone();
        entry.version += 1;
        Ok(WriteOutcome::Written {
            version: entry.version,
        })
    }
}
