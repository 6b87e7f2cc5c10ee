//! Persistence gateway behavior across both backends

mod common;

use common::Harness;
use plansync::SyncError;
use plansync_model::{
    ProjectId, ProjectMetadata, Residency, SyncState, UserId, ValidationError,
    DEFAULT_PROJECT_NAME,
};
use plansync_remote::{MockRemoteBackend, RemoteError};
use plansync_test_utils::{sample_document, sample_document_value, sample_metadata, RemoteCall};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn create_then_load_round_trips_when_signed_in() {
    let h = Harness::new();
    h.identity.set_user("u1");

    let metadata = ProjectMetadata::new("  Roadmap  ")
        .with_description("Q3")
        .with_tags(["Plan", "plan", " ops ", ""]);
    let id = h
        .gateway
        .create(sample_document_value(3), metadata)
        .await
        .unwrap();
    assert!(!id.is_client_generated());

    let record = h.gateway.load(&id).await.unwrap();
    assert_eq!(record.payload.to_value().unwrap(), sample_document_value(3));
    assert_eq!(record.name, "Roadmap");
    assert_eq!(record.description, "Q3");
    assert_eq!(record.tags, vec!["Plan".to_string(), "ops".to_string()]);
    assert_eq!(record.owner_id, UserId::new("u1"));
    assert_eq!(record.sync_state, SyncState::Synced);

    // the mirror is written on create
    let mirror = h.local.project(&id).await.unwrap().unwrap();
    assert_eq!(mirror.sync_state, SyncState::Synced);
}

#[tokio::test]
async fn payload_fields_survive_unchanged_on_both_paths() {
    let raw = json!({
        "tasks": [{ "id": "t1", "points": 3 }],
        "camera": { "x": 10, "y": 20, "zoom": 1, "rotation": 45 },
        "theme": "dark"
    });

    let h = Harness::new();
    let local_id = h
        .gateway
        .create(raw.clone(), sample_metadata("Local"))
        .await
        .unwrap();
    let loaded = h.gateway.load(&local_id).await.unwrap();
    assert_eq!(loaded.payload.to_value().unwrap(), raw);

    h.identity.set_user("u1");
    let remote_id = h
        .gateway
        .create(raw.clone(), sample_metadata("Remote"))
        .await
        .unwrap();
    assert_eq!(h.remote.project(&remote_id).unwrap().project_data, Some(raw.clone()));
    let loaded = h.gateway.load(&remote_id).await.unwrap();
    assert_eq!(loaded.payload.to_value().unwrap(), raw);
}

#[tokio::test]
async fn create_then_load_round_trips_when_anonymous() {
    let h = Harness::new();

    let id = h
        .gateway
        .create(json!({ "tasks": [] }), ProjectMetadata::new("   "))
        .await
        .unwrap();
    assert!(id.is_client_generated());
    assert_eq!(h.remote.calls(RemoteCall::Create), 0);

    let record = h.gateway.load(&id).await.unwrap();
    assert_eq!(record.name, DEFAULT_PROJECT_NAME);
    assert!(record.owner_id.is_anonymous());
    assert_eq!(record.sync_state, SyncState::LocalOnly);
}

#[tokio::test]
async fn validation_errors_never_reach_a_backend() {
    let h = Harness::new();
    h.identity.set_user("u1");

    let err = h
        .gateway
        .create(json!(null), sample_metadata("x"))
        .await
        .unwrap_err();
    assert_eq!(err, SyncError::Validation(ValidationError::EmptyPayload));

    let err = h
        .gateway
        .create(json!({ "swimlanes": [] }), sample_metadata("x"))
        .await
        .unwrap_err();
    assert_eq!(err, SyncError::Validation(ValidationError::MissingField("tasks")));

    let too_many: Vec<String> = (0..11).map(|i| format!("tag{i}")).collect();
    let err = h
        .gateway
        .create(
            sample_document_value(1),
            ProjectMetadata::new("x").with_tags(too_many),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Validation(ValidationError::TooManyTags { count: 11, max: 10 })
    ));

    assert_eq!(h.remote.calls(RemoteCall::Create), 0);
    assert!(h.local.projects().await.unwrap().is_empty());
}

#[tokio::test]
async fn create_falls_back_to_local_when_remote_unreachable() {
    let h = Harness::new();
    h.identity.set_user("u1");
    h.remote.set_offline(true);

    let id = h
        .gateway
        .create(sample_document_value(2), sample_metadata("Offline"))
        .await
        .unwrap();
    assert!(id.is_client_generated());
    assert_eq!(h.remote.calls(RemoteCall::Create), 1);

    let record = h.gateway.load(&id).await.unwrap();
    assert_eq!(record.name, "Offline");
    assert_eq!(record.owner_id, UserId::new("u1"));
    assert_eq!(record.sync_state, SyncState::LocalOnly);
}

#[tokio::test]
async fn server_errors_count_as_transport_failures() {
    let h = Harness::new();
    h.identity.set_user("u1");
    h.remote.fail_with(Some(RemoteError::Rejected {
        status: 503,
        message: "maintenance".to_string(),
    }));

    let id = h
        .gateway
        .create(sample_document_value(1), sample_metadata("x"))
        .await
        .unwrap();
    assert!(h.local.project(&id).await.unwrap().is_some());
}

#[tokio::test]
async fn update_by_other_user_is_rejected_and_record_unchanged() {
    let h = Harness::new();
    h.identity.set_user("owner");
    let id = h
        .gateway
        .create(sample_document_value(1), sample_metadata("Mine"))
        .await
        .unwrap();

    h.identity.set_user("intruder");
    let err = h
        .gateway
        .update(&id, sample_document_value(5), sample_metadata("Stolen"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Permission(_)));
    let err = h.gateway.delete(&id).await.unwrap_err();
    assert!(matches!(err, SyncError::Permission(_)));

    let remote = h.remote.project(&id).unwrap();
    assert_eq!(remote.name, "Mine");
    let local = h.local.project(&id).await.unwrap().unwrap();
    assert_eq!(local.name, "Mine");
    assert_eq!(local.payload.task_count(), 1);
}

#[tokio::test]
async fn local_ownership_is_enforced_while_offline() {
    let h = Harness::new();
    h.identity.set_user("owner");
    h.remote.set_offline(true);
    let id = h
        .gateway
        .create(sample_document_value(1), sample_metadata("Mine"))
        .await
        .unwrap();

    h.identity.set_user("intruder");
    let err = h
        .gateway
        .update(&id, sample_document_value(2), sample_metadata("Stolen"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Permission(_)));
    assert!(matches!(
        h.gateway.delete(&id).await,
        Err(SyncError::Permission(_))
    ));
    assert_eq!(h.local.project(&id).await.unwrap().unwrap().name, "Mine");
}

#[tokio::test]
async fn anonymous_records_can_be_modified_by_anyone() {
    let h = Harness::new();
    let id = h
        .gateway
        .create(sample_document_value(1), sample_metadata("Shared draft"))
        .await
        .unwrap();

    h.identity.set_user("u1");
    h.remote.set_offline(true);
    h.gateway
        .update(&id, sample_document_value(4), sample_metadata("Claimed"))
        .await
        .unwrap();
    let record = h.local.project(&id).await.unwrap().unwrap();
    assert_eq!(record.payload.task_count(), 4);
    assert!(record.owner_id.is_anonymous());
}

#[tokio::test]
async fn offline_update_of_local_only_record_succeeds() {
    let h = Harness::new();
    let id = h
        .gateway
        .create(sample_document_value(1), sample_metadata("Local"))
        .await
        .unwrap();

    h.identity.set_user("u1");
    h.remote.set_offline(true);
    h.gateway
        .update(&id, sample_document_value(2), sample_metadata("Local v2"))
        .await
        .unwrap();

    let record = h.gateway.load(&id).await.unwrap();
    assert_eq!(record.name, "Local v2");
    assert_eq!(record.sync_state, SyncState::LocalOnly);
    assert!(record.updated_at >= record.created_at);
}

#[tokio::test]
async fn offline_update_of_synced_record_is_tagged_pending() {
    let h = Harness::new();
    h.identity.set_user("u1");
    let id = h
        .gateway
        .create(sample_document_value(1), sample_metadata("Synced"))
        .await
        .unwrap();

    h.remote.set_offline(true);
    h.gateway
        .update(&id, sample_document_value(3), sample_metadata("Edited offline"))
        .await
        .unwrap();
    let record = h.local.project(&id).await.unwrap().unwrap();
    assert_eq!(record.sync_state, SyncState::PendingPush);

    // Back online, the newer local edit wins over the stale remote copy
    h.remote.set_offline(false);
    let loaded = h.gateway.load(&id).await.unwrap();
    assert_eq!(loaded.name, "Edited offline");
    assert_eq!(loaded.payload.task_count(), 3);
}

#[tokio::test]
async fn listing_shows_pending_edit_as_local_and_agrees_with_load() {
    let h = Harness::new();
    h.identity.set_user("u1");
    let id = h
        .gateway
        .create(sample_document_value(1), sample_metadata("Synced"))
        .await
        .unwrap();

    h.remote.set_offline(true);
    h.gateway
        .update(&id, sample_document_value(2), sample_metadata("Edited offline"))
        .await
        .unwrap();
    h.remote.set_offline(false);

    let listed = h.gateway.list_for_user().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
    assert_eq!(listed[0].name, "Edited offline");
    assert_eq!(listed[0].residency, Residency::Local);
    assert_eq!(h.gateway.load(&id).await.unwrap().name, listed[0].name);
}

#[tokio::test]
async fn offline_update_of_unknown_record_keeps_it_pending() {
    let h = Harness::new();
    h.identity.set_user("u1");
    h.remote.set_offline(true);

    let id = ProjectId::new("srv-remote-only");
    h.gateway
        .update(&id, sample_document_value(1), sample_metadata("Blind write"))
        .await
        .unwrap();
    let record = h.local.project(&id).await.unwrap().unwrap();
    assert_eq!(record.sync_state, SyncState::PendingPush);
    assert_eq!(record.owner_id, UserId::new("u1"));
}

#[tokio::test]
async fn update_of_unknown_record_is_not_found() {
    let h = Harness::new();
    let err = h
        .gateway
        .update(
            &ProjectId::new("missing-id"),
            sample_document_value(1),
            sample_metadata("x"),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    h.identity.set_user("u1");
    let err = h
        .gateway
        .update(
            &ProjectId::new("missing-id"),
            sample_document_value(1),
            sample_metadata("x"),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn remote_not_found_on_load_reads_local_copy() {
    let h = Harness::new();
    let id = h
        .gateway
        .create(sample_document_value(2), sample_metadata("Local"))
        .await
        .unwrap();

    h.identity.set_user("u1");
    let record = h.gateway.load(&id).await.unwrap();
    assert_eq!(record.id, id);
    assert_eq!(h.remote.calls(RemoteCall::Load), 1);
}

#[tokio::test]
async fn private_remote_project_of_someone_else_is_forbidden() {
    let h = Harness::new();
    h.remote
        .insert("p-private", &UserId::new("owner"), false, &sample_document(1));
    h.identity.set_user("u1");

    let err = h.gateway.load(&ProjectId::new("p-private")).await.unwrap_err();
    assert!(matches!(err, SyncError::Permission(_)));
}

#[tokio::test]
async fn anonymous_load_can_read_remote_public_project() {
    let h = Harness::new();
    h.remote
        .insert("p-public", &UserId::new("owner"), true, &sample_document(2));
    h.remote
        .insert("p-private", &UserId::new("owner"), false, &sample_document(2));

    let record = h.gateway.load(&ProjectId::new("p-public")).await.unwrap();
    assert_eq!(record.payload.task_count(), 2);
    // read-only access leaves no local copy behind
    assert!(h.local.projects().await.unwrap().is_empty());

    let err = h.gateway.load(&ProjectId::new("p-private")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn delete_removes_both_copies_and_current_pointer() {
    let h = Harness::new();
    h.identity.set_user("u1");
    let id = h
        .gateway
        .create(sample_document_value(1), sample_metadata("Doomed"))
        .await
        .unwrap();
    h.gateway.set_current_project(Some(&id)).await.unwrap();

    h.gateway.delete(&id).await.unwrap();
    assert!(h.remote.project(&id).is_none());
    assert!(h.local.project(&id).await.unwrap().is_none());
    assert_eq!(h.gateway.current_project().await.unwrap(), None);

    assert!(h.gateway.delete(&id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn offline_delete_only_succeeds_for_local_only_records() {
    let h = Harness::new();
    h.identity.set_user("u1");
    let synced = h
        .gateway
        .create(sample_document_value(1), sample_metadata("Synced"))
        .await
        .unwrap();

    h.remote.set_offline(true);
    let local = h
        .gateway
        .create(sample_document_value(1), sample_metadata("Local"))
        .await
        .unwrap();

    h.gateway.delete(&local).await.unwrap();
    assert!(h.local.project(&local).await.unwrap().is_none());

    let err = h.gateway.delete(&synced).await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
    assert!(h.local.project(&synced).await.unwrap().is_some());

    let err = h
        .gateway
        .delete(&ProjectId::new("nowhere"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
}

#[tokio::test]
async fn signed_in_list_merges_remote_and_local_only_projects() {
    let h = Harness::new();
    let draft = h
        .gateway
        .create(sample_document_value(1), sample_metadata("Draft"))
        .await
        .unwrap();

    h.identity.set_user("u1");
    let shared = h
        .gateway
        .create(sample_document_value(1), sample_metadata("Shared"))
        .await
        .unwrap();

    let list = h.gateway.list_for_user().await.unwrap();
    assert_eq!(list.len(), 2);
    let residency_of = |id: &ProjectId| list.iter().find(|s| s.id == *id).map(|s| s.residency);
    assert_eq!(residency_of(&shared), Some(Residency::Remote));
    assert_eq!(residency_of(&draft), Some(Residency::Local));
}

#[tokio::test]
async fn signed_in_list_falls_back_to_local_view() {
    let h = Harness::new();
    h.identity.set_user("u1");
    h.gateway
        .create(sample_document_value(1), sample_metadata("Shared"))
        .await
        .unwrap();
    h.remote.set_offline(true);
    h.gateway
        .create(sample_document_value(1), sample_metadata("Offline"))
        .await
        .unwrap();

    let list = h.gateway.list_for_user().await.unwrap();
    let names: Vec<&str> = list.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(list.len(), 2);
    assert!(names.contains(&"Shared") && names.contains(&"Offline"));
}

#[tokio::test]
async fn anonymous_list_shows_anonymous_and_public_records() {
    let h = Harness::new();
    h.gateway
        .create(sample_document_value(1), sample_metadata("Mine"))
        .await
        .unwrap();

    h.identity.set_user("u1");
    h.remote.set_offline(true);
    h.gateway
        .create(sample_document_value(1), sample_metadata("Private"))
        .await
        .unwrap();
    h.gateway
        .create(
            sample_document_value(1),
            sample_metadata("Public").with_public(true),
        )
        .await
        .unwrap();

    h.identity.clear_user();
    let mut names: Vec<String> = h
        .gateway
        .list_for_user()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["Mine".to_string(), "Public".to_string()]);
}

#[tokio::test]
async fn public_list_prefers_remote() {
    let h = Harness::new();
    h.remote
        .insert("p-public", &UserId::new("someone"), true, &sample_document(1));
    let list = h.gateway.list_public().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].residency, Residency::Remote);

    h.remote.set_offline(true);
    assert!(h.gateway.list_public().await.unwrap().is_empty());
}

#[tokio::test]
async fn quota_failure_after_remote_create_reports_remote_id() {
    let h = Harness::with_quota(64);
    h.identity.set_user("u1");

    let err = h
        .gateway
        .create(sample_document_value(20), sample_metadata("Big"))
        .await
        .unwrap_err();
    let id = match &err {
        SyncError::QuotaExceeded {
            remote_id: Some(id),
            ..
        } => id.clone(),
        other => panic!("expected quota error with remote id, got {other:?}"),
    };
    assert!(h.remote.project(&id).is_some());
    assert!(h.local.projects().await.unwrap().is_empty());
}

#[tokio::test]
async fn quota_failure_when_anonymous_leaves_store_untouched() {
    let h = Harness::with_quota(64);
    let err = h
        .gateway
        .create(sample_document_value(20), sample_metadata("Big"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::QuotaExceeded { remote_id: None, .. }));
    assert!(err.user_message().contains("Local storage is full"));
    assert!(h.local.projects().await.unwrap().is_empty());
}

#[tokio::test]
async fn unusable_base_url_is_surfaced_not_absorbed() {
    let mut mock = MockRemoteBackend::new();
    mock.expect_create()
        .times(1)
        .returning(|_| Err(RemoteError::InvalidBaseUrl("ftp://nowhere".to_string())));

    let identity = plansync::IdentityContext::default();
    identity.set_user("u1");
    let local = Arc::new(plansync_store::LocalRecords::in_memory());
    let gateway = plansync::PersistenceGateway::new(identity, Arc::new(mock), Arc::clone(&local));

    let err = gateway
        .create(sample_document_value(1), sample_metadata("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));
    assert!(local.projects().await.unwrap().is_empty());
}

#[tokio::test]
async fn update_request_carries_caller_identity() {
    let mut mock = MockRemoteBackend::new();
    mock.expect_update()
        .withf(|id, request| id.as_str() == "srv-9" && request.user_id.as_str() == "u1")
        .times(1)
        .returning(|_, _| Ok(()));

    let identity = plansync::IdentityContext::default();
    identity.set_user("u1");
    let local = Arc::new(plansync_store::LocalRecords::in_memory());
    let gateway = plansync::PersistenceGateway::new(identity, Arc::new(mock), Arc::clone(&local));

    gateway
        .update(
            &ProjectId::new("srv-9"),
            sample_document_value(1),
            sample_metadata("Renamed"),
        )
        .await
        .unwrap();
    let mirror = local.project(&ProjectId::new("srv-9")).await.unwrap().unwrap();
    assert_eq!(mirror.sync_state, SyncState::Synced);
    assert_eq!(mirror.name, "Renamed");
}
