//! Attendance Manager behavior against the in-memory repository.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use proptest::prelude::*;
use rally_core::{
    AttendanceManager, EventPatch, JoinOutcome, LeaveOutcome, RepositoryError, ServiceError,
    UserId,
};
use rally_testing::{fixtures, test_clock, InMemoryEventRepository};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (Arc<InMemoryEventRepository>, AttendanceManager) {
    let repository = Arc::new(InMemoryEventRepository::new());
    let manager = AttendanceManager::new(repository.clone(), Arc::new(test_clock()));
    (repository, manager)
}

#[tokio::test]
async fn test_join_twice_is_joined_then_already_joined() {
    let (_, manager) = setup();
    let event = manager
        .create(&fixtures::identity(), fixtures::launch_party())
        .await
        .unwrap();
    let user = UserId::new();

    let first = manager.join(event.id, user).await.unwrap();
    let second = manager.join(event.id, user).await.unwrap();

    assert!(matches!(first, JoinOutcome::Joined(_)));
    assert!(matches!(second, JoinOutcome::AlreadyJoined(_)));
    assert_eq!(second.event().attendees.len(), 1);
}

#[tokio::test]
async fn test_leave_after_join_then_not_attending() {
    let (_, manager) = setup();
    let event = manager
        .create(&fixtures::identity(), fixtures::launch_party())
        .await
        .unwrap();
    let user = UserId::new();
    manager.join(event.id, user).await.unwrap();

    let first = manager.leave(event.id, user).await.unwrap();
    let second = manager.leave(event.id, user).await.unwrap();

    assert!(matches!(first, LeaveOutcome::Left(_)));
    assert!(matches!(second, LeaveOutcome::NotAttending(_)));
    assert!(!second.event().is_attending(&user));
}

#[tokio::test]
async fn test_join_unknown_event_is_not_found() {
    let (_, manager) = setup();
    let id = rally_core::EventId::new();

    let err = manager.join(id, UserId::new()).await.unwrap_err();
    assert_eq!(err, ServiceError::NotFound(id));
}

#[tokio::test]
async fn test_non_owner_mutate_is_forbidden_and_event_unchanged() {
    let (repository, manager) = setup();
    let event = manager
        .create(&fixtures::identity(), fixtures::launch_party())
        .await
        .unwrap();

    let err = manager
        .mutate(event.id, &fixtures::identity(), fixtures::rename("Hijacked"))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Forbidden(_)));
    assert_eq!(repository.get(event.id).unwrap(), event);
    assert_eq!(repository.calls("replace_fields"), 0);
}

#[tokio::test]
async fn test_owner_mutate_changes_exactly_supplied_fields() {
    let (_, manager) = setup();
    let owner = fixtures::identity();
    let event = manager.create(&owner, fixtures::launch_party()).await.unwrap();
    let guest = UserId::new();
    manager.join(event.id, guest).await.unwrap();

    let patch = EventPatch {
        location: Some("Rooftop".to_string()),
        category: Some("conference".to_string()),
        ..EventPatch::default()
    };
    let updated = manager.mutate(event.id, &owner, patch).await.unwrap();

    assert_eq!(updated.location, "Rooftop");
    assert_eq!(updated.category, "conference");
    assert_eq!(updated.name, event.name);
    assert_eq!(updated.description, event.description);
    assert_eq!(updated.date, event.date);
    assert_eq!(updated.owner, owner.user_id);
    assert!(updated.is_attending(&guest));
}

#[tokio::test]
async fn test_empty_patch_is_validation_error() {
    let (_, manager) = setup();
    let owner = fixtures::identity();
    let event = manager.create(&owner, fixtures::launch_party()).await.unwrap();

    let err = manager
        .mutate(event.id, &owner, EventPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn test_remove_requires_owner() {
    let (repository, manager) = setup();
    let owner = fixtures::identity();
    let event = manager.create(&owner, fixtures::launch_party()).await.unwrap();

    let err = manager.remove(event.id, &fixtures::identity()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
    assert!(repository.get(event.id).is_some());

    manager.remove(event.id, &owner).await.unwrap();
    assert!(repository.get(event.id).is_none());
    assert_eq!(
        manager.remove(event.id, &owner).await.unwrap_err(),
        ServiceError::NotFound(event.id)
    );
}

#[tokio::test]
async fn test_create_rejects_blank_fields() {
    let (repository, manager) = setup();
    let mut input = fixtures::launch_party();
    input.location = "   ".to_string();

    let err = manager.create(&fixtures::identity(), input).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert!(repository.is_empty());
}

#[tokio::test]
async fn test_concurrent_joins_yield_exactly_one_joined() {
    let (_, manager) = setup();
    let event = manager
        .create(&fixtures::identity(), fixtures::launch_party())
        .await
        .unwrap();
    let user = UserId::new();

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.join(event.id, user).await })
        })
        .collect();

    let mut joined = 0;
    let mut already = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            JoinOutcome::Joined(_) => joined += 1,
            JoinOutcome::AlreadyJoined(_) => already += 1,
        }
    }

    assert_eq!(joined, 1);
    assert_eq!(already, 31);
    assert_eq!(manager.get(event.id).await.unwrap().attendees.len(), 1);
}

#[tokio::test]
async fn test_concurrent_distinct_joins_lose_nobody() {
    let (_, manager) = setup();
    let event = manager
        .create(&fixtures::identity(), fixtures::launch_party())
        .await
        .unwrap();
    let users: Vec<UserId> = (0..20).map(|_| UserId::new()).collect();

    let handles: Vec<_> = users
        .iter()
        .map(|user| {
            let manager = manager.clone();
            let user = *user;
            tokio::spawn(async move { manager.join(event.id, user).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let event = manager.get(event.id).await.unwrap();
    assert!(users.iter().all(|user| event.is_attending(user)));
}

#[tokio::test(start_paused = true)]
async fn test_slow_repository_times_out_as_unavailable() {
    let repository = Arc::new(InMemoryEventRepository::new());
    let manager = AttendanceManager::new(repository.clone(), Arc::new(test_clock()))
        .with_timeout(Duration::from_millis(100));
    repository.set_latency(Duration::from_secs(10));

    let err = manager.get(rally_core::EventId::new()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));
}

#[tokio::test]
async fn test_repository_failures_map_into_service_errors() {
    let (repository, manager) = setup();
    repository.fail_next(RepositoryError::Database("constraint".into()));

    let err = manager
        .create(&fixtures::identity(), fixtures::launch_party())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Storage(_)));
}

proptest! {
    #[test]
    fn prop_membership_matches_set_model(ops in prop::collection::vec((0usize..3, any::<bool>()), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let (_, manager) = setup();
            let event = manager
                .create(&fixtures::identity(), fixtures::launch_party())
                .await
                .unwrap();
            let users: Vec<UserId> = (0..3).map(|_| UserId::new()).collect();
            let mut model: HashSet<UserId> = HashSet::new();

            for (idx, join) in ops {
                let user = users[idx];
                if join {
                    let outcome = manager.join(event.id, user).await.unwrap();
                    prop_assert_eq!(outcome.changed(), model.insert(user));
                } else {
                    let outcome = manager.leave(event.id, user).await.unwrap();
                    prop_assert_eq!(outcome.changed(), model.remove(&user));
                }
            }

            let stored = manager.get(event.id).await.unwrap();
            prop_assert_eq!(stored.attendees.len(), model.len());
            prop_assert!(model.iter().all(|user| stored.is_attending(user)));
            Ok(())
        })?;
    }
}
