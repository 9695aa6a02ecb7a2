mod common;

use common::{Harness, broken_record_path, harness, harness_with, mark_migrated, quest, seed_legacy};
use quest_ledger::storage::QuestBackend;
use quest_ledger::storage::kv::KeyValueStore;
use quest_ledger::{QuestStorageError, StorageConfig, StoreError};

/// One harness per backend so every property is checked on both.
fn both_backends() -> Vec<Harness> {
    let legacy = harness();
    let record = harness();
    mark_migrated(&record.kv);
    vec![legacy, record]
}

#[tokio::test]
async fn added_quest_loads_back_identical() {
    for h in both_backends() {
        let q = quest("alpha");
        h.storage.add(quest("beta")).await.unwrap();
        let returned = h.storage.add(q.clone()).await.unwrap();
        let loaded = h.storage.load().await;

        assert_eq!(returned, loaded);
        let matching: Vec<_> = loaded.iter().filter(|x| x.id == q.id).collect();
        assert_eq!(matching, vec![&q], "backend {}", h.storage.active_backend().name());
    }
}

#[tokio::test]
async fn toggle_completion_is_its_own_inverse() {
    for h in both_backends() {
        h.storage.add(quest("alpha")).await.unwrap();

        let once = h.storage.toggle_completion("alpha").await.unwrap();
        assert!(once[0].completed);
        assert!(once[0].completed_at.is_some());
        assert_eq!(once[0].sub_tasks, quest("alpha").sub_tasks);

        let twice = h.storage.toggle_completion("alpha").await.unwrap();
        assert_eq!(twice, vec![quest("alpha")]);
    }
}

#[tokio::test]
async fn toggle_subtask_touches_only_that_subtask() {
    for h in both_backends() {
        h.storage.add(quest("alpha")).await.unwrap();
        h.storage.add(quest("beta")).await.unwrap();

        let after = h.storage.toggle_subtask("alpha", "s1").await.unwrap();
        let mut expected = quest("alpha");
        expected.sub_tasks[0].completed = true;
        assert_eq!(after, vec![expected, quest("beta")]);
    }
}

#[tokio::test]
async fn unresolved_ids_are_silent_no_ops() {
    for h in both_backends() {
        h.storage.add(quest("alpha")).await.unwrap();
        let before = h.storage.load().await;

        assert_eq!(h.storage.toggle_subtask("alpha", "nope").await.unwrap(), before);
        assert_eq!(h.storage.toggle_subtask("nope", "s1").await.unwrap(), before);
        assert_eq!(h.storage.toggle_completion("nope").await.unwrap(), before);
        assert_eq!(h.storage.delete("nope").await.unwrap(), before);

        let mut stranger = quest("stranger");
        stranger.title = "Never stored".into();
        assert_eq!(h.storage.update(stranger).await.unwrap(), before);
    }
}

#[tokio::test]
async fn delete_removes_only_the_target() {
    for h in both_backends() {
        h.storage.add(quest("alpha")).await.unwrap();
        h.storage.add(quest("beta")).await.unwrap();

        let remaining = h.storage.delete("alpha").await.unwrap();
        assert_eq!(remaining, vec![quest("beta")]);
        assert!(h.storage.load().await.iter().all(|q| q.id != "alpha"));
    }
}

#[tokio::test]
async fn update_replaces_in_place() {
    for h in both_backends() {
        h.storage.add(quest("alpha")).await.unwrap();
        h.storage.add(quest("beta")).await.unwrap();

        let mut edited = quest("alpha");
        edited.title = "The Trial Rewritten".into();
        edited.due_date = None;
        let after = h.storage.update(edited.clone()).await.unwrap();
        assert_eq!(after, vec![edited, quest("beta")]);
    }
}

#[tokio::test]
async fn save_replaces_whole_collection() {
    for h in both_backends() {
        h.storage.add(quest("alpha")).await.unwrap();
        h.storage.save(&[quest("gamma"), quest("delta")]).await.unwrap();
        let ids: Vec<_> = h.storage.load().await.into_iter().map(|q| q.id).collect();
        assert_eq!(ids, ["gamma", "delta"]);
    }
}

#[tokio::test]
async fn writes_go_to_the_record_database_after_migration() {
    let h = harness();
    seed_legacy(&h.kv, &[quest("old")]);
    assert_eq!(h.storage.active_backend().name(), "legacy");

    assert!(h.storage.migrate_if_needed().await.migrated());
    assert_eq!(h.storage.active_backend().name(), "record");

    h.storage.add(quest("new")).await.unwrap();
    let legacy = h.storage.legacy().load_all().await.unwrap();
    assert_eq!(legacy, vec![quest("old")]);
    let record = h.storage.record().unwrap().load_all().await.unwrap();
    assert_eq!(record, vec![quest("old"), quest("new")]);
}

#[tokio::test]
async fn load_falls_back_to_legacy_when_record_open_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::new(dir.path())
        .with_record_database(Some(broken_record_path(dir.path())));
    let h = harness_with(dir, config);
    seed_legacy(&h.kv, &[quest("alpha"), quest("beta")]);
    mark_migrated(&h.kv);

    assert_eq!(h.storage.active_backend().name(), "record");
    assert_eq!(h.storage.load().await, vec![quest("alpha"), quest("beta")]);
}

#[tokio::test]
async fn save_falls_back_to_legacy_when_record_open_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::new(dir.path())
        .with_record_database(Some(broken_record_path(dir.path())));
    let h = harness_with(dir, config);
    mark_migrated(&h.kv);

    h.storage.save(&[quest("alpha")]).await.unwrap();
    assert_eq!(h.storage.legacy().load_all().await.unwrap(), vec![quest("alpha")]);
}

#[tokio::test]
async fn mutations_surface_wrapped_errors() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::new(dir.path())
        .with_record_database(Some(broken_record_path(dir.path())));
    let h = harness_with(dir, config);
    mark_migrated(&h.kv);

    let err = h.storage.add(quest("alpha")).await.unwrap_err();
    assert!(matches!(err, QuestStorageError::Add { ref id, .. } if id == "alpha"));
    let err = h.storage.toggle_subtask("alpha", "s1").await.unwrap_err();
    assert!(matches!(err, QuestStorageError::ToggleSubtask { .. }));
    assert!(err.to_string().contains("subtask s1"));
}

#[tokio::test]
async fn total_load_failure_yields_empty_collection() {
    let h = harness();
    h.kv.set_item("todo-quest-data", "[{\"id\":").unwrap();
    assert!(h.storage.load().await.is_empty());
    assert!(h.storage.add(quest("alpha")).await.is_err());
}

#[tokio::test]
async fn duplicate_id_is_refused_on_both_backends() {
    for h in both_backends() {
        h.storage.add(quest("alpha")).await.unwrap();
        let mut twin = quest("alpha");
        twin.title = "Impostor".into();

        let err = h.storage.add(twin).await.unwrap_err();
        assert!(matches!(
            err,
            QuestStorageError::Add { source: StoreError::DuplicateId(ref id), .. } if id == "alpha"
        ));
        assert_eq!(h.storage.load().await, vec![quest("alpha")]);
    }
}

#[tokio::test]
async fn migration_keeps_ids_unique() {
    let h = harness();
    h.storage.add(quest("alpha")).await.unwrap();
    assert!(h.storage.add(quest("alpha")).await.is_err());
    assert!(h.storage.migrate_if_needed().await.migrated());
    assert_eq!(h.storage.load().await, vec![quest("alpha")]);
}
