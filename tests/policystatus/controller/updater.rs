use std::env;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use policystatus::policystatus::api::types::{PolicyConditionType, PolicyStatus};
use policystatus::policystatus::config::UpdaterSettings;
use policystatus::policystatus::controller::store::{
    InMemoryStatusStore, PolicyKey, StatusStore, VersionedStatus, WriteOutcome,
};
use policystatus::policystatus::controller::updater::{
    spawn, spawn_from_env, StatusUpdate, UpdaterSummary,
};
use policystatus::policystatus::status::{ConditionUpdate, MAX_POLICY_ANCESTORS};
use policystatus::policystatus::test_support::{
    fixed_time, gateway, OTHER_CONTROLLER, TEST_CONTROLLER,
};
use serial_test::serial;

fn policy_key() -> PolicyKey {
    PolicyKey::new("BackendTrafficPolicy", "default", "retries")
}

fn accept(ancestor: &str, generation: i64) -> StatusUpdate {
    let ancestor_ref = gateway(ancestor);
    StatusUpdate::new(policy_key(), generation, move |status: PolicyStatus| {
        status.with_condition(
            &ancestor_ref,
            TEST_CONTROLLER,
            &ConditionUpdate::accepted(generation),
            fixed_time(0),
        )
    })
}

async fn run_updates(
    store: Arc<dyn StatusStore>,
    settings: UpdaterSettings,
    updates: Vec<StatusUpdate>,
) -> UpdaterSummary {
    let (sender, handle) = spawn(store, TEST_CONTROLLER, settings);
    for update in updates {
        sender.send(update).await.expect("queue update");
    }
    drop(sender);
    handle.await.expect("updater task")
}

#[tokio::test]
async fn writes_then_skips_identical_updates() {
    let store = Arc::new(InMemoryStatusStore::new());
    store.register(policy_key());

    let summary = run_updates(
        store.clone(),
        UpdaterSettings::default(),
        vec![accept("eg", 1), accept("eg", 1)],
    )
    .await;

    assert_eq!(
        summary,
        UpdaterSummary {
            written: 1,
            unchanged: 1,
            skipped: 0,
            failed: 0,
        }
    );
    let stored = store.get(&policy_key()).expect("policy present");
    assert_eq!(stored.version, 2);
    assert_eq!(stored.status.ancestors.len(), 1);
}

#[tokio::test]
async fn updates_for_missing_policies_are_dropped() {
    let store = Arc::new(InMemoryStatusStore::new());

    let summary =
        run_updates(store.clone(), UpdaterSettings::default(), vec![accept("eg", 1)]).await;

    assert_eq!(summary.skipped, 1);
    assert!(store.get(&policy_key()).is_none());
}

/// Lets a competing writer land between every load and write until the
/// configured number of interleavings has been used up.
struct CompetingWriterStore {
    inner: InMemoryStatusStore,
    interleavings: AtomicUsize,
}

impl StatusStore for CompetingWriterStore {
    fn load(
        &self,
        key: &PolicyKey,
    ) -> Result<Option<VersionedStatus>, Box<dyn Error + Send + Sync>> {
        self.inner.load(key)
    }

    fn write(
        &self,
        key: &PolicyKey,
        status: &PolicyStatus,
        expected_version: u64,
    ) -> Result<WriteOutcome, Box<dyn Error + Send + Sync>> {
        let remaining = self.interleavings.load(Ordering::SeqCst);
        if remaining > 0 {
            self.interleavings.store(remaining - 1, Ordering::SeqCst);
            let current = self
                .inner
                .get(key)
                .map(|stored| stored.status)
                .unwrap_or_default();
            let competing = current.with_condition(
                &gateway(&format!("other-{remaining}")),
                OTHER_CONTROLLER,
                &ConditionUpdate::accepted(1),
                fixed_time(0),
            );
            self.inner.replace(key, competing);
        }
        self.inner.write(key, status, expected_version)
    }
}

#[tokio::test]
async fn conflicts_reapply_the_transform_on_fresh_status() {
    let store = Arc::new(CompetingWriterStore {
        inner: InMemoryStatusStore::new(),
        interleavings: AtomicUsize::new(2),
    });
    store.inner.register(policy_key());

    let summary =
        run_updates(store.clone(), UpdaterSettings::default(), vec![accept("eg", 1)]).await;

    assert_eq!(summary.written, 1);
    let stored = store.inner.get(&policy_key()).expect("policy present");
    let controllers: Vec<&str> = stored
        .status
        .ancestors
        .iter()
        .map(|ancestor| ancestor.controller_name.as_str())
        .collect();
    assert_eq!(
        controllers,
        vec![OTHER_CONTROLLER, OTHER_CONTROLLER, TEST_CONTROLLER]
    );
}

#[tokio::test]
async fn persistent_conflicts_fail_after_retry_budget() {
    let store = Arc::new(CompetingWriterStore {
        inner: InMemoryStatusStore::new(),
        interleavings: AtomicUsize::new(usize::MAX),
    });
    store.inner.register(policy_key());
    let settings = UpdaterSettings {
        queue_size: 4,
        max_conflict_retries: 2,
    };

    let summary = run_updates(store.clone(), settings, vec![accept("eg", 1)]).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.written, 0);
    let stored = store.inner.get(&policy_key()).expect("policy present");
    assert!(stored
        .status
        .ancestors
        .iter()
        .all(|ancestor| ancestor.controller_name == OTHER_CONTROLLER));
}

#[tokio::test]
async fn oversized_ancestor_lists_are_aggregated_before_writing() {
    let store = Arc::new(InMemoryStatusStore::new());
    store.register(policy_key());
    let update = StatusUpdate::new(policy_key(), 3, |mut status: PolicyStatus| {
        for index in 0..MAX_POLICY_ANCESTORS + 2 {
            status.apply_condition(
                &gateway(&format!("gw-{index}")),
                TEST_CONTROLLER,
                &ConditionUpdate::accepted(3),
                fixed_time(0),
            );
        }
        status
    });

    let summary = run_updates(store.clone(), UpdaterSettings::default(), vec![update]).await;

    assert_eq!(summary.written, 1);
    let stored = store.get(&policy_key()).expect("policy present");
    assert_eq!(stored.status.ancestors.len(), MAX_POLICY_ANCESTORS);
    assert!(stored.status.ancestors.iter().all(|ancestor| ancestor
        .condition(PolicyConditionType::Aggregated)
        .is_some()));
}

#[tokio::test]
#[serial]
async fn environment_settings_drive_the_updater() {
    env::set_var("POLICYSTATUS_CONTROLLER_NAME", TEST_CONTROLLER);
    env::set_var("POLICYSTATUS_UPDATE_QUEUE", "2");
    env::remove_var("POLICYSTATUS_LOG_FORMAT");
    env::remove_var("POLICYSTATUS_CONFLICT_RETRIES");
    let store = Arc::new(InMemoryStatusStore::new());
    store.register(policy_key());
    let update = StatusUpdate::new(policy_key(), 1, |mut status: PolicyStatus| {
        for index in 0..MAX_POLICY_ANCESTORS + 1 {
            status.apply_condition(
                &gateway(&format!("gw-{index}")),
                TEST_CONTROLLER,
                &ConditionUpdate::accepted(1),
                fixed_time(0),
            );
        }
        status
    });

    let (sender, handle) = spawn_from_env(store.clone()).expect("updater from env");
    sender.send(update).await.expect("queue update");
    drop(sender);
    let summary = handle.await.expect("updater task");
    env::remove_var("POLICYSTATUS_CONTROLLER_NAME");
    env::remove_var("POLICYSTATUS_UPDATE_QUEUE");

    assert_eq!(summary.written, 1);
    let stored = store.get(&policy_key()).expect("policy present");
    assert!(stored.status.ancestors.iter().all(|ancestor| ancestor
        .condition(PolicyConditionType::Aggregated)
        .is_some()));
}

#[tokio::test]
#[serial]
async fn invalid_environment_is_rejected_before_spawning() {
    env::set_var("POLICYSTATUS_UPDATE_QUEUE", "none");
    let result = spawn_from_env(Arc::new(InMemoryStatusStore::new()));
    env::remove_var("POLICYSTATUS_UPDATE_QUEUE");

    let err = result.err().expect("invalid queue size rejected");
    assert!(err.to_string().contains("POLICYSTATUS_UPDATE_QUEUE"));
}
