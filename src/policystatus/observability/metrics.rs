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

use std::error::Error;
use std::sync::OnceLock;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static STATUS_UPDATES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static STATUS_CONFLICTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static ANCESTORS_AGGREGATED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| {
        Registry::new_custom(Some("policystatus".to_string()), None)
            .expect("failed to initialise policystatus metrics registry")
    })
}

fn register_collector<C>(collector: C) -> C
where
    C: Clone + Collector + Send + Sync + 'static,
{
    registry()
        .register(Box::new(collector.clone()))
        .expect("failed to register policystatus metric collector");
    collector
}

fn counter_vec(
    cell: &'static OnceLock<IntCounterVec>,
    name: &str,
    help: &str,
    labels: &[&str],
) -> &'static IntCounterVec {
    cell.get_or_init(|| {
        let counter = IntCounterVec::new(Opts::new(name, help), labels)
            .expect("failed to build policystatus counter");
        register_collector(counter)
    })
}

fn status_updates_total() -> &'static IntCounterVec {
    counter_vec(
        &STATUS_UPDATES_TOTAL,
        "status_updates_total",
        "Policy status updates processed grouped by policy kind and result",
        &["kind", "result"],
    )
}

fn status_conflicts_total() -> &'static IntCounterVec {
    counter_vec(
        &STATUS_CONFLICTS_TOTAL,
        "status_conflicts_total",
        "Optimistic concurrency conflicts hit while writing policy status",
        &["kind"],
    )
}

fn ancestors_aggregated_total() -> &'static IntCounterVec {
    counter_vec(
        &ANCESTORS_AGGREGATED_TOTAL,
        "ancestors_aggregated_total",
        "Ancestor entries dropped because a policy exceeded the ancestor bound",
        &["kind"],
    )
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StatusUpdateResult {
    Written,
    Unchanged,
    Skipped,
    Error,
}

impl StatusUpdateResult {
    fn as_label(self) -> &'static str {
        match self {
            StatusUpdateResult::Written => "written",
            StatusUpdateResult::Unchanged => "unchanged",
            StatusUpdateResult::Skipped => "skipped",
            StatusUpdateResult::Error => "error",
        }
    }
}

pub fn record_status_update(kind: &str, result: StatusUpdateResult) {
    status_updates_total()
        .with_label_values(&[kind, result.as_label()])
        .inc();
}

pub fn record_status_conflict(kind: &str) {
    status_conflicts_total().with_label_values(&[kind]).inc();
}

pub fn record_ancestors_aggregated(kind: &str, removed: usize) {
    ancestors_aggregated_total()
        .with_label_values(&[kind])
        .inc_by(removed as u64);
}

pub fn gather() -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> {
    let metric_families = registry().gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|err| Box::new(err) as Box<dyn Error + Send + Sync>)?;
    Ok(buffer)
}
