#![allow(dead_code)]

//! Fixtures shared by unit and integration tests.

use crate::policystatus::api::types::{AncestorRef, PolicyCondition, PolicyStatus};
use chrono::{DateTime, TimeZone, Utc};

pub const TEST_CONTROLLER: &str = "gateway.envoyproxy.io/gatewayclass-controller";
pub const OTHER_CONTROLLER: &str = "example.io/other-controller";

/// 2024-05-01T10:00:00Z
const FIXTURE_EPOCH_SECONDS: i64 = 1_714_557_600;

/// Deterministic timestamp `offset_secs` after the fixture epoch.
pub fn fixed_time(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(FIXTURE_EPOCH_SECONDS + offset_secs, 0)
        .single()
        .expect("fixture timestamp in range")
}

pub fn gateway(name: &str) -> AncestorRef {
    AncestorRef::gateway("default", name)
}

/// The sole condition of the sole ancestor, failing the test when the
/// status holds anything else.
pub fn only_condition(status: &PolicyStatus) -> &PolicyCondition {
    assert_eq!(status.ancestors.len(), 1, "expected exactly one ancestor");
    let conditions = &status.ancestors[0].conditions;
    assert_eq!(conditions.len(), 1, "expected exactly one condition");
    &conditions[0]
}
