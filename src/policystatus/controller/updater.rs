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

//! Serialized write-back of policy status.
//!
//! Reconcilers describe a status change as a transform over the current
//! [`PolicyStatus`] and queue it here. The updater owns every write: it reads
//! the stored status, applies the transform, enforces the ancestor bound and
//! writes only when something other than transition times changed. Version
//! conflicts rerun the whole read/transform/write cycle so a transform is
//! always applied to the latest stored value.

use crate::policystatus::api::types::PolicyStatus;
use crate::policystatus::config::{self, UpdaterSettings};
use crate::policystatus::controller::store::{PolicyKey, StatusStore, WriteOutcome};
use crate::policystatus::logger::{log_debug, log_error, log_info, log_warn, set_log_format};
use crate::policystatus::observability::metrics::{self, StatusUpdateResult};
use crate::policystatus::observability::tracing;
use crate::policystatus::status::{policy_status_equal, truncate_policy_ancestors};
use crate::policystatus::util::error::{new_error, with_context};

use chrono::Utc;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const COMPONENT: &str = "status-updater";

pub type StatusMutator = Box<dyn Fn(PolicyStatus) -> PolicyStatus + Send + Sync>;

/// A queued status change for one policy object.
pub struct StatusUpdate {
    pub key: PolicyKey,
    /// Generation of the policy the transform was computed from.
    pub generation: i64,
    mutator: StatusMutator,
}

impl StatusUpdate {
    pub fn new<F>(key: PolicyKey, generation: i64, mutator: F) -> Self
    where
        F: Fn(PolicyStatus) -> PolicyStatus + Send + Sync + 'static,
    {
        Self {
            key,
            generation,
            mutator: Box::new(mutator),
        }
    }
}

impl fmt::Debug for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusUpdate")
            .field("key", &self.key)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct StatusUpdateSender {
    sender: mpsc::Sender<StatusUpdate>,
}

impl StatusUpdateSender {
    pub async fn send(&self, update: StatusUpdate) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.sender.send(update).await.map_err(|err| {
            with_context(
                new_error("status updater has stopped"),
                format!("queueing status update for {}", err.0.key),
            )
        })
    }
}

/// Counts of processed updates, returned when the updater loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdaterSummary {
    pub written: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateOutcome {
    Written {
        version: u64,
        conflicts: usize,
        aggregated: usize,
    },
    Unchanged,
    Skipped,
}

/// Starts the updater loop. The loop drains queued updates in order and
/// exits once every [`StatusUpdateSender`] has been dropped.
pub fn spawn(
    store: Arc<dyn StatusStore>,
    controller_name: impl Into<String>,
    settings: UpdaterSettings,
) -> (StatusUpdateSender, JoinHandle<UpdaterSummary>) {
    let (sender, receiver) = mpsc::channel(settings.queue_size.max(1));
    let controller_name: Arc<str> = Arc::from(controller_name.into());
    let handle = tokio::spawn(run(
        store,
        controller_name,
        settings.max_conflict_retries,
        receiver,
    ));
    (StatusUpdateSender { sender }, handle)
}

/// Starts the updater with settings, controller identity and log format
/// taken from the environment, installing the tracing subscriber first.
pub fn spawn_from_env(
    store: Arc<dyn StatusStore>,
) -> Result<(StatusUpdateSender, JoinHandle<UpdaterSummary>), Box<dyn Error + Send + Sync>> {
    tracing::init();
    set_log_format(config::log_format()?);
    let settings = UpdaterSettings::from_env()?;
    let controller_name = config::controller_name();

    let queue_size = settings.queue_size.to_string();
    let retries = settings.max_conflict_retries.to_string();
    log_info(
        COMPONENT,
        "Starting policy status updater",
        &[
            ("controller", controller_name.as_str()),
            ("queue_size", queue_size.as_str()),
            ("conflict_retries", retries.as_str()),
        ],
    );
    Ok(spawn(store, controller_name, settings))
}

async fn run(
    store: Arc<dyn StatusStore>,
    controller_name: Arc<str>,
    max_conflict_retries: usize,
    mut receiver: mpsc::Receiver<StatusUpdate>,
) -> UpdaterSummary {
    let mut summary = UpdaterSummary::default();
    while let Some(update) = receiver.recv().await {
        let span_name = format!("update:{}", update.key);
        let store = Arc::clone(&store);
        let controller_name = Arc::clone(&controller_name);
        let result = tracing::with_span("controller.status", span_name, async move {
            process(store, controller_name, max_conflict_retries, update).await
        })
        .await;
        match result {
            StatusUpdateResult::Written => summary.written += 1,
            StatusUpdateResult::Unchanged => summary.unchanged += 1,
            StatusUpdateResult::Skipped => summary.skipped += 1,
            StatusUpdateResult::Error => summary.failed += 1,
        }
    }
    summary
}

async fn process(
    store: Arc<dyn StatusStore>,
    controller_name: Arc<str>,
    max_conflict_retries: usize,
    update: StatusUpdate,
) -> StatusUpdateResult {
    let key = update.key.to_string();
    let kind = update.key.kind.clone();
    let joined = tokio::task::spawn_blocking(move || {
        apply_update(
            store.as_ref(),
            &controller_name,
            max_conflict_retries,
            &update,
        )
    })
    .await;

    let result = match joined {
        Ok(Ok(UpdateOutcome::Written {
            version,
            conflicts,
            aggregated,
        })) => {
            if aggregated > 0 {
                let removed = aggregated.to_string();
                log_warn(
                    COMPONENT,
                    "Policy ancestors exceeded the status bound",
                    &[("policy", key.as_str()), ("removed", removed.as_str())],
                );
                metrics::record_ancestors_aggregated(&kind, aggregated);
            }
            let version = version.to_string();
            let conflicts = conflicts.to_string();
            log_debug(
                COMPONENT,
                "Policy status written",
                &[
                    ("policy", key.as_str()),
                    ("version", version.as_str()),
                    ("conflicts", conflicts.as_str()),
                ],
            );
            StatusUpdateResult::Written
        }
        Ok(Ok(UpdateOutcome::Unchanged)) => StatusUpdateResult::Unchanged,
        Ok(Ok(UpdateOutcome::Skipped)) => {
            log_debug(
                COMPONENT,
                "Policy no longer exists; dropping status update",
                &[("policy", key.as_str())],
            );
            StatusUpdateResult::Skipped
        }
        Ok(Err(err)) => {
            let message = err.to_string();
            log_error(
                COMPONENT,
                "Policy status update failed",
                &[("policy", key.as_str()), ("error", message.as_str())],
            );
            StatusUpdateResult::Error
        }
        Err(join_err) => {
            let message = join_err.to_string();
            log_error(
                COMPONENT,
                "Policy status update panicked",
                &[("policy", key.as_str()), ("error", message.as_str())],
            );
            StatusUpdateResult::Error
        }
    };
    metrics::record_status_update(&kind, result);
    result
}

fn apply_update(
    store: &dyn StatusStore,
    controller_name: &str,
    max_conflict_retries: usize,
    update: &StatusUpdate,
) -> Result<UpdateOutcome, Box<dyn Error + Send + Sync>> {
    let mut conflicts = 0;
    loop {
        let Some(current) = store
            .load(&update.key)
            .map_err(|err| with_context(err, format!("loading status for {}", update.key)))?
        else {
            return Ok(UpdateOutcome::Skipped);
        };

        let mut next = (update.mutator)(current.status.clone());
        let aggregated =
            truncate_policy_ancestors(&mut next, controller_name, update.generation, Utc::now());
        if policy_status_equal(&current.status, &next) {
            return Ok(UpdateOutcome::Unchanged);
        }

        let outcome = store
            .write(&update.key, &next, current.version)
            .map_err(|err| with_context(err, format!("writing status for {}", update.key)))?;
        match outcome {
            WriteOutcome::Written { version } => {
                return Ok(UpdateOutcome::Written {
                    version,
                    conflicts,
                    aggregated,
                })
            }
            WriteOutcome::NotFound => return Ok(UpdateOutcome::Skipped),
            WriteOutcome::Conflict => {
                conflicts += 1;
                metrics::record_status_conflict(&update.key.kind);
                if conflicts > max_conflict_retries {
                    return Err(new_error(format!(
                        "status for {} still conflicting after {} attempts",
                        update.key, conflicts
                    )));
                }
                let attempt = conflicts.to_string();
                log_warn(
                    COMPONENT,
                    "Policy status version conflict; retrying",
                    &[
                        ("policy", update.key.to_string().as_str()),
                        ("attempt", attempt.as_str()),
                    ],
                );
            }
        }
    }
}
