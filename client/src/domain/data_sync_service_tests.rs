//! Tests for the data synchronisation service.

use super::*;
use crate::domain::game_data::{IAP, ITEM, OPTION, STAGE, StageProgress};
use crate::domain::ports::MockRemoteService;
use crate::domain::remote_call::RemoteOperation;
use crate::domain::{Identity, RemoteCallQueue, RowId};
use crate::outbound::memory::InMemoryRemoteService;
use crate::test_support::StaticIdentity;
use rstest::{fixture, rstest};
use serde_json::{Value, json};

const TICKS: usize = 64;

fn owner() -> RecordId {
    RecordId::new("row-owner").expect("valid id")
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

struct Harness {
    remote: Arc<InMemoryRemoteService>,
    queue: Arc<RemoteCallQueue>,
    sync: DataSyncService,
}

fn harness_with(remote: Arc<InMemoryRemoteService>, identity: Option<Identity>) -> Harness {
    let queue = Arc::new(RemoteCallQueue::new(remote.clone()));
    let sync = DataSyncService::new(
        QueuedRemote::new(Arc::clone(&queue)),
        Arc::new(StaticIdentity::new(identity)),
    );
    Harness {
        remote,
        queue,
        sync,
    }
}

#[fixture]
fn harness() -> Harness {
    harness_with(
        Arc::new(InMemoryRemoteService::new()),
        Some(Identity::new(owner(), None)),
    )
}

fn mock_harness(service: MockRemoteService) -> (Arc<RemoteCallQueue>, DataSyncService) {
    let queue = Arc::new(RemoteCallQueue::new(Arc::new(service)));
    let sync = DataSyncService::new(
        QueuedRemote::new(Arc::clone(&queue)),
        Arc::new(StaticIdentity::new(Some(Identity::new(owner(), None)))),
    );
    (queue, sync)
}

#[rstest]
fn empty_category_is_materialised_with_default(harness: Harness) {
    let stage = harness
        .queue
        .drive(harness.sync.load_category(&STAGE), TICKS)
        .expect("completes")
        .expect("loads");

    assert_eq!(stage, StageProgress { stage: 1 });
    assert_eq!(harness.remote.call_count(RemoteOperation::InsertRecord), 1);
    assert_eq!(harness.remote.call_count(RemoteOperation::FetchRecord), 2);
}

#[rstest]
fn second_load_observes_the_materialised_record(harness: Harness) {
    for _ in 0..2 {
        harness
            .queue
            .drive(harness.sync.load_category(&STAGE), TICKS)
            .expect("completes")
            .expect("loads");
    }

    assert_eq!(harness.remote.call_count(RemoteOperation::InsertRecord), 1);
    assert_eq!(harness.remote.rows(&owner(), "stage").len(), 1);
}

#[rstest]
fn existing_row_is_decoded_without_insert(harness: Harness) {
    harness
        .remote
        .seed_row(&owner(), "stage", record(json!({ "stagedata": 4 })));

    let stage = harness
        .queue
        .drive(harness.sync.load_category(&STAGE), TICKS)
        .expect("completes")
        .expect("loads");

    assert_eq!(stage.stage, 4);
    assert_eq!(harness.remote.call_count(RemoteOperation::InsertRecord), 0);
}

#[rstest]
fn non_missing_failures_are_returned_unchanged(harness: Harness) {
    harness.remote.fail_next(
        RemoteOperation::FetchRecord,
        RemoteError::classify(503, "maintenance"),
    );

    let err = harness
        .queue
        .drive(harness.sync.load_category(&STAGE), TICKS)
        .expect("completes")
        .expect_err("fails");

    assert_eq!(err.kind(), RemoteErrorKind::NetworkFailure);
    assert_eq!(err.status_code(), 503);
    assert_eq!(harness.remote.call_count(RemoteOperation::InsertRecord), 0);
}

#[rstest]
fn missing_identity_fails_without_remote_calls() {
    let harness = harness_with(Arc::new(InMemoryRemoteService::new()), None);

    let err = harness
        .queue
        .drive(harness.sync.load_category(&STAGE), TICKS)
        .expect("completes")
        .expect_err("unauthenticated");

    assert_eq!(err.kind(), RemoteErrorKind::Unauthenticated);
    assert_eq!(harness.remote.total_calls(), 0);
}

#[test]
fn not_found_fetch_triggers_materialisation() {
    let mut service = MockRemoteService::new();
    let mut seq = mockall::Sequence::new();
    service
        .expect_fetch_record()
        .times(1)
        .in_sequence(&mut seq)
        .return_once(|_, _, _| Err(RemoteError::classify(404, "table not found")));
    service
        .expect_insert_record()
        .times(1)
        .in_sequence(&mut seq)
        .return_once(|_, _, _| Ok(RowId::new("r1")));
    service
        .expect_fetch_record()
        .times(1)
        .in_sequence(&mut seq)
        .return_once(|_, _, _| {
            Ok(vec![RemoteRow {
                row_id: RowId::new("r1"),
                fields: record(json!({ "ItemList": [0] })),
            }])
        });
    let (queue, sync) = mock_harness(service);

    let items = queue
        .drive(sync.load_category(&ITEM), TICKS)
        .expect("completes")
        .expect("loads");

    assert_eq!(items.item_list, vec![0]);
}

#[test]
fn retry_that_is_still_empty_fails_without_looping() {
    let mut service = MockRemoteService::new();
    service
        .expect_fetch_record()
        .times(2)
        .returning(|_, _, _| Ok(Vec::new()));
    service
        .expect_insert_record()
        .times(1)
        .return_once(|_, _, _| Ok(RowId::new("r1")));
    let (queue, sync) = mock_harness(service);

    let err = queue
        .drive(sync.load_category(&STAGE), TICKS)
        .expect("completes")
        .expect_err("still empty");

    assert_eq!(err.kind(), RemoteErrorKind::RecordNotFound);
}

#[test]
fn failed_retry_fetch_carries_the_underlying_error() {
    let mut service = MockRemoteService::new();
    let mut seq = mockall::Sequence::new();
    service
        .expect_fetch_record()
        .times(1)
        .in_sequence(&mut seq)
        .return_once(|_, _, _| Ok(Vec::new()));
    service
        .expect_insert_record()
        .times(1)
        .in_sequence(&mut seq)
        .return_once(|_, _, _| Ok(RowId::new("r1")));
    service
        .expect_fetch_record()
        .times(1)
        .in_sequence(&mut seq)
        .return_once(|_, _, _| Err(RemoteError::network("connection reset")));
    let (queue, sync) = mock_harness(service);

    let err = queue
        .drive(sync.load_category(&STAGE), TICKS)
        .expect("completes")
        .expect_err("retry failed");

    assert_eq!(err.kind(), RemoteErrorKind::NetworkFailure);
    assert_eq!(err.message(), "connection reset");
}

#[rstest]
fn insert_failure_is_returned(harness: Harness) {
    harness.remote.fail_next(
        RemoteOperation::InsertRecord,
        RemoteError::classify(400, "schema mismatch"),
    );

    let err = harness
        .queue
        .drive(harness.sync.load_category(&OPTION), TICKS)
        .expect("completes")
        .expect_err("insert rejected");

    assert_eq!(err.kind(), RemoteErrorKind::ValidationFailure);
    assert_eq!(harness.remote.call_count(RemoteOperation::FetchRecord), 1);
}

#[rstest]
fn undecodable_row_surfaces_as_unknown(harness: Harness) {
    harness
        .remote
        .seed_row(&owner(), "stage", record(json!({ "stagedata": "first" })));

    let err = harness
        .queue
        .drive(harness.sync.load_category(&STAGE), TICKS)
        .expect("completes")
        .expect_err("decode fails");

    assert_eq!(err.kind(), RemoteErrorKind::Unknown);
}

#[rstest]
fn one_failing_category_does_not_block_the_others(harness: Harness) {
    harness.remote.fail_category(
        RemoteOperation::FetchRecord,
        "option",
        RemoteError::network("unreachable"),
    );
    let categories: [&dyn CategoryDescriptor; 4] = [&STAGE, &ITEM, &OPTION, &IAP];

    let outcomes = harness
        .queue
        .drive(harness.sync.load_all(&categories), TICKS * 4)
        .expect("completes");

    let names: Vec<_> = outcomes.iter().map(|outcome| outcome.name).collect();
    assert_eq!(names, ["stage", "item", "option", "iap"]);
    let loaded = LoadedCategories::from(outcomes);
    assert_eq!(loaded.failed().collect::<Vec<_>>(), ["option"]);
    assert_eq!(
        loaded.get(&STAGE).map(|result| result.map(|stage| stage.stage)),
        Some(Ok(1))
    );
    assert!(loaded.get(&ITEM).is_some_and(|result| result.is_ok()));
    assert!(loaded.get(&IAP).is_some_and(|result| result.is_ok()));
}

#[rstest]
fn load_all_multiplexes_through_a_slow_queue() {
    let harness = harness_with(
        Arc::new(InMemoryRemoteService::new().with_latency(3)),
        Some(Identity::new(owner(), None)),
    );
    let categories: [&dyn CategoryDescriptor; 2] = [&STAGE, &ITEM];

    let outcomes = harness
        .queue
        .drive(harness.sync.load_all(&categories), TICKS * 4)
        .expect("completes");

    assert!(outcomes.iter().all(|outcome| outcome.result.is_ok()));
    assert_eq!(harness.remote.call_count(RemoteOperation::InsertRecord), 2);
}

#[rstest]
fn save_inserts_then_updates(harness: Harness) {
    harness
        .queue
        .drive(
            harness.sync.save_category(&STAGE, &StageProgress { stage: 2 }),
            TICKS,
        )
        .expect("completes")
        .expect("inserted");
    harness
        .queue
        .drive(
            harness.sync.save_category(&STAGE, &StageProgress { stage: 5 }),
            TICKS,
        )
        .expect("completes")
        .expect("updated");

    let rows = harness.remote.rows(&owner(), "stage");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].fields, record(json!({ "stagedata": 5 })));
    assert_eq!(harness.remote.call_count(RemoteOperation::InsertRecord), 1);
    assert_eq!(harness.remote.call_count(RemoteOperation::UpdateRecord), 1);
}

#[rstest]
fn loaded_categories_report_unloaded_as_none() {
    let loaded = LoadedCategories::default();
    assert!(loaded.get(&STAGE).is_none());
    assert!(loaded.all_loaded());
}

#[rstest]
fn overlapping_loads_materialise_one_row() {
    let harness = harness_with(
        Arc::new(InMemoryRemoteService::new().with_latency(2)),
        Some(Identity::new(owner(), None)),
    );

    let (first, second) = harness
        .queue
        .drive(
            futures_util::future::join(
                harness.sync.load_category(&STAGE),
                harness.sync.load_category(&STAGE),
            ),
            TICKS * 2,
        )
        .expect("completes");

    assert_eq!(first, Ok(StageProgress { stage: 1 }));
    assert_eq!(second, Ok(StageProgress { stage: 1 }));
    assert_eq!(harness.remote.rows(&owner(), "stage").len(), 1);
    assert_eq!(harness.remote.call_count(RemoteOperation::InsertRecord), 1);
}

#[rstest]
fn save_overlapping_a_load_updates_the_materialised_row() {
    let harness = harness_with(
        Arc::new(InMemoryRemoteService::new().with_latency(2)),
        Some(Identity::new(owner(), None)),
    );

    let (loaded, saved) = harness
        .queue
        .drive(
            futures_util::future::join(
                harness.sync.load_category(&STAGE),
                harness
                    .sync
                    .save_category(&STAGE, &StageProgress { stage: 4 }),
            ),
            TICKS * 2,
        )
        .expect("completes");

    assert_eq!(loaded, Ok(StageProgress { stage: 1 }));
    assert_eq!(saved, Ok(()));
    let rows = harness.remote.rows(&owner(), "stage");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].fields, record(json!({ "stagedata": 4 })));
    assert_eq!(harness.remote.call_count(RemoteOperation::UpdateRecord), 1);
}

#[rstest]
fn different_categories_are_not_serialised_against_each_other() {
    let harness = harness_with(
        Arc::new(InMemoryRemoteService::new().with_latency(2)),
        Some(Identity::new(owner(), None)),
    );
    let categories: [&dyn CategoryDescriptor; 2] = [&STAGE, &ITEM];

    let outcomes = harness
        .queue
        .drive(harness.sync.load_all(&categories), TICKS * 2)
        .expect("completes");

    assert!(outcomes.iter().all(|outcome| outcome.result.is_ok()));
    assert_eq!(harness.remote.rows(&owner(), "stage").len(), 1);
    assert_eq!(harness.remote.rows(&owner(), "item").len(), 1);
}
