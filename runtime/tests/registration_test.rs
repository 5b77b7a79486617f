//! Registration engine: seats, attendance sets and wishlists.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use conference_core::error::ConferenceError;
use conference_core::key::{EntityKey, EntityKind, KeyId};
use conference_core::model::{Conference, Entity};
use conference_core::store::EntityStore;
use conference_testing::{TestBackend, caller, conference_form, fast_retry_policy, session_form};
use proptest::prelude::*;

async fn conference(backend: &TestBackend, seats: i32) -> Conference {
    backend
        .service
        .create_conference(&caller("organizer"), conference_form("RustConf", seats))
        .await
        .unwrap()
}

async fn reload(backend: &TestBackend, conf: &Conference) -> Conference {
    backend
        .service
        .get_conference(&conf.key.to_urlsafe())
        .await
        .unwrap()
}

#[tokio::test]
async fn register_takes_a_seat_and_records_attendance() {
    let backend = TestBackend::new();
    let conf = conference(&backend, 3).await;
    let alice = caller("alice");

    let registered = backend
        .service
        .register_for_conference(&alice, &conf.key.to_urlsafe())
        .await
        .unwrap();

    assert!(registered);
    assert_eq!(reload(&backend, &conf).await.seats_available, 2);
    let profile = backend.service.get_profile(&alice).await.unwrap();
    assert_eq!(profile.conference_keys_to_attend, vec![conf.key.clone()]);
}

#[tokio::test]
async fn registering_twice_is_a_conflict() {
    let backend = TestBackend::new();
    let conf = conference(&backend, 3).await;
    let alice = caller("alice");
    let key = conf.key.to_urlsafe();

    backend.service.register_for_conference(&alice, &key).await.unwrap();
    let err = backend
        .service
        .register_for_conference(&alice, &key)
        .await
        .unwrap_err();

    assert!(matches!(err, ConferenceError::Conflict(_)));
    assert_eq!(reload(&backend, &conf).await.seats_available, 2);
}

#[tokio::test]
async fn sold_out_conference_refuses_registration() {
    let backend = TestBackend::new();
    let conf = conference(&backend, 0).await;
    let bob = caller("bob");

    let err = backend
        .service
        .register_for_conference(&bob, &conf.key.to_urlsafe())
        .await
        .unwrap_err();

    assert_eq!(err, ConferenceError::conflict("There are no seats available."));
    assert_eq!(reload(&backend, &conf).await.seats_available, 0);
    assert!(
        backend.store.version_of(&bob.profile_key()).is_none(),
        "a refused registration writes nothing"
    );
}

#[tokio::test]
async fn unknown_or_mistyped_conference_keys_are_not_found() {
    let backend = TestBackend::new();
    let alice = caller("alice");
    let missing = EntityKey::profile("organizer").child(EntityKind::Conference, KeyId::Id(404));

    let err = backend
        .service
        .register_for_conference(&alice, &missing.to_urlsafe())
        .await
        .unwrap_err();
    assert!(matches!(err, ConferenceError::NotFound { resource: "conference", .. }));

    let err = backend
        .service
        .register_for_conference(&alice, "definitely-not-a-key")
        .await
        .unwrap_err();
    assert!(matches!(err, ConferenceError::NotFound { .. }));
}

#[tokio::test]
async fn unregister_without_registration_changes_nothing() {
    let backend = TestBackend::new();
    let conf = conference(&backend, 3).await;
    let carol = caller("carol");
    let before = backend.store.version_of(&conf.key);

    let released = backend
        .service
        .unregister_from_conference(&carol, &conf.key.to_urlsafe())
        .await
        .unwrap();

    assert!(!released);
    assert_eq!(backend.store.version_of(&conf.key), before);
    assert!(backend.store.version_of(&carol.profile_key()).is_none());
}

#[tokio::test]
async fn unregister_gives_the_seat_back() {
    let backend = TestBackend::new();
    let conf = conference(&backend, 3).await;
    let alice = caller("alice");
    let key = conf.key.to_urlsafe();

    backend.service.register_for_conference(&alice, &key).await.unwrap();
    assert!(backend.service.unregister_from_conference(&alice, &key).await.unwrap());

    assert_eq!(reload(&backend, &conf).await.seats_available, 3);
    let profile = backend.service.get_profile(&alice).await.unwrap();
    assert!(profile.conference_keys_to_attend.is_empty());
}

#[tokio::test]
async fn unregister_is_not_clamped_at_capacity() {
    let backend = TestBackend::new();
    let conf = conference(&backend, 2).await;
    let alice = caller("alice");
    let key = conf.key.to_urlsafe();
    backend.service.register_for_conference(&alice, &key).await.unwrap();

    // Seats drifted back to capacity while alice still holds one.
    let mut drifted = reload(&backend, &conf).await;
    drifted.seats_available = drifted.max_attendees;
    backend.store.put(Entity::Conference(drifted)).await.unwrap();

    assert!(backend.service.unregister_from_conference(&alice, &key).await.unwrap());
    assert_eq!(reload(&backend, &conf).await.seats_available, 3);
}

#[tokio::test]
async fn conflicting_commits_are_retried_without_duplicate_effects() {
    let backend = TestBackend::new();
    let conf = conference(&backend, 5).await;
    let alice = caller("alice");
    let commits_before = backend.store.commit_count();
    backend.store.fail_next_commits(3);

    let registered = backend
        .service
        .register_for_conference(&alice, &conf.key.to_urlsafe())
        .await
        .unwrap();

    assert!(registered);
    assert_eq!(reload(&backend, &conf).await.seats_available, 4);
    assert_eq!(backend.store.commit_count(), commits_before + 1);
    let profile = backend.service.get_profile(&alice).await.unwrap();
    assert_eq!(profile.conference_keys_to_attend.len(), 1);
}

#[tokio::test]
async fn exhausted_retries_surface_as_internal_and_write_nothing() {
    let backend = TestBackend::with_retry_policy(fast_retry_policy(2));
    let conf = conference(&backend, 5).await;
    let alice = caller("alice");
    backend.store.fail_next_commits(3);

    let err = backend
        .service
        .register_for_conference(&alice, &conf.key.to_urlsafe())
        .await
        .unwrap_err();

    assert!(matches!(err, ConferenceError::Internal(_)));
    assert_eq!(reload(&backend, &conf).await.seats_available, 5);
    assert!(backend.store.version_of(&alice.profile_key()).is_none());
}

#[tokio::test]
async fn wishlist_add_and_remove() {
    let backend = TestBackend::new();
    let organizer = caller("organizer");
    let conf = conference(&backend, 5).await;
    let session = backend
        .service
        .create_session(&organizer, &conf.key.to_urlsafe(), session_form("Ownership", Some("Ada")))
        .await
        .unwrap();
    let alice = caller("alice");
    let key = session.key.to_urlsafe();

    assert!(backend.service.add_session_to_wishlist(&alice, &key).await.unwrap());
    let err = backend
        .service
        .add_session_to_wishlist(&alice, &key)
        .await
        .unwrap_err();
    assert!(matches!(err, ConferenceError::Conflict(_)));

    let wished = backend.service.sessions_in_wishlist(&alice).await.unwrap();
    assert_eq!(wished, vec![session.clone()]);

    assert!(backend.service.remove_session_from_wishlist(&alice, &key).await.unwrap());
    assert!(!backend.service.remove_session_from_wishlist(&alice, &key).await.unwrap());
    assert!(backend.service.sessions_in_wishlist(&alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn wishlist_rejects_unknown_sessions() {
    let backend = TestBackend::new();
    let conf = conference(&backend, 5).await;
    let alice = caller("alice");

    // A conference key is not a session key.
    let err = backend
        .service
        .add_session_to_wishlist(&alice, &conf.key.to_urlsafe())
        .await
        .unwrap_err();
    assert!(matches!(err, ConferenceError::NotFound { resource: "session", .. }));

    let missing = conf.key.child(EntityKind::Session, KeyId::Id(999));
    let err = backend
        .service
        .remove_session_from_wishlist(&alice, &missing.to_urlsafe())
        .await
        .unwrap_err();
    assert!(matches!(err, ConferenceError::NotFound { .. }));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn unregister_register_unregister_restores_seats(
        (max, start) in (1_i32..200).prop_flat_map(|max| (Just(max), 0..=max))
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let backend = TestBackend::new();
            let conf = conference(&backend, max).await;
            let mut partial = reload(&backend, &conf).await;
            partial.seats_available = start;
            backend.store.put(Entity::Conference(partial)).await.unwrap();
            let alice = caller("alice");
            let key = conf.key.to_urlsafe();

            let first = backend.service.unregister_from_conference(&alice, &key).await.unwrap();
            let registered = backend.service.register_for_conference(&alice, &key).await;
            let second = backend.service.unregister_from_conference(&alice, &key).await.unwrap();

            assert!(!first);
            if start == 0 {
                assert!(matches!(registered, Err(ConferenceError::Conflict(_))));
                assert!(!second);
            } else {
                assert!(registered.unwrap());
                assert!(second);
            }
            assert_eq!(reload(&backend, &conf).await.seats_available, start);
            let profile = backend.service.get_profile(&alice).await.unwrap();
            assert!(!profile.is_attending(&conf.key));
        });
    }
}
