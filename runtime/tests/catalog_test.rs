//! Conference and session lifecycle, catalog queries and profiles.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{NaiveDate, NaiveTime};
use conference_core::error::ConferenceError;
use conference_core::filter::FilterClause;
use conference_core::job::Job;
use conference_core::model::{ConferenceForm, ProfileForm, SessionForm, TeeShirtSize};
use conference_testing::{TestBackend, caller, conference_form, session_form};

#[tokio::test]
async fn create_conference_applies_defaults_and_enqueues_confirmation() {
    let backend = TestBackend::new();
    let alice = caller("alice");

    let conf = backend
        .service
        .create_conference(
            &alice,
            ConferenceForm {
                name: Some("RustConf".to_string()),
                start_date: Some("2026-09-10T00:00:00".to_string()),
                ..ConferenceForm::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(conf.city, "Default City");
    assert_eq!(conf.topics, vec!["Default", "Topic"]);
    assert_eq!(conf.max_attendees, 0);
    assert_eq!(conf.seats_available, 0);
    assert_eq!(conf.month, 9);
    assert_eq!(conf.start_date, NaiveDate::from_ymd_opt(2026, 9, 10));
    assert_eq!(conf.key.parent(), Some(alice.profile_key()));

    let jobs = backend.queue.enqueued();
    assert_eq!(jobs.len(), 1);
    assert!(matches!(
        &jobs[0],
        Job::SendConfirmationEmail { email, conference_info }
            if email == "alice@example.com" && conference_info.starts_with("RustConf")
    ));
}

#[tokio::test]
async fn seats_start_at_capacity() {
    let backend = TestBackend::new();
    let conf = backend
        .service
        .create_conference(&caller("alice"), conference_form("Big", 250))
        .await
        .unwrap();

    assert_eq!(conf.seats_available, 250);
    assert_eq!(conf.month, 0);
}

#[tokio::test]
async fn create_conference_validates_input() {
    let backend = TestBackend::new();
    let alice = caller("alice");

    let err = backend
        .service
        .create_conference(&alice, ConferenceForm::default())
        .await
        .unwrap_err();
    assert_eq!(err, ConferenceError::invalid("Conference 'name' field required"));

    let err = backend
        .service
        .create_conference(
            &alice,
            ConferenceForm {
                name: Some("Bad Dates".to_string()),
                end_date: Some("next tuesday".to_string()),
                ..ConferenceForm::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ConferenceError::InvalidArgument(_)));
    assert!(backend.store.is_empty());
}

#[tokio::test]
async fn confirmation_enqueue_failure_does_not_fail_creation() {
    let backend = TestBackend::new();
    backend.queue.refuse_enqueue(true);

    let conf = backend
        .service
        .create_conference(&caller("alice"), conference_form("Quiet", 5))
        .await
        .unwrap();

    assert!(backend.service.get_conference(&conf.key.to_urlsafe()).await.is_ok());
    assert!(backend.queue.enqueued().is_empty());
}

#[tokio::test]
async fn only_the_organizer_updates_a_conference() {
    let backend = TestBackend::new();
    let alice = caller("alice");
    let conf = backend
        .service
        .create_conference(&alice, conference_form("RustConf", 10))
        .await
        .unwrap();
    let key = conf.key.to_urlsafe();

    let err = backend
        .service
        .update_conference(&caller("mallory"), &key, ConferenceForm {
            city: Some("Nowhere".to_string()),
            ..ConferenceForm::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ConferenceError::PermissionDenied(_)));

    let updated = backend
        .service
        .update_conference(&alice, &key, ConferenceForm {
            city: Some("Berlin".to_string()),
            start_date: Some("2026-05-01".to_string()),
            max_attendees: Some(20),
            ..ConferenceForm::default()
        })
        .await
        .unwrap();

    assert_eq!(updated.city, "Berlin");
    assert_eq!(updated.month, 5);
    assert_eq!(updated.max_attendees, 20);
    assert_eq!(updated.seats_available, 10, "seat inventory is not recomputed");
    assert_eq!(updated.name, "RustConf");
}

#[tokio::test]
async fn created_and_attending_lists() {
    let backend = TestBackend::new();
    let alice = caller("alice");
    let bob = caller("bob");
    let first = backend
        .service
        .create_conference(&alice, conference_form("First", 10))
        .await
        .unwrap();
    let second = backend
        .service
        .create_conference(&alice, conference_form("Second", 10))
        .await
        .unwrap();
    backend
        .service
        .create_conference(&bob, conference_form("Bob's", 10))
        .await
        .unwrap();

    let created = backend.service.conferences_created(&alice).await.unwrap();
    assert_eq!(created, vec![first.clone(), second.clone()]);

    backend
        .service
        .register_for_conference(&bob, &second.key.to_urlsafe())
        .await
        .unwrap();
    let attending = backend.service.conferences_to_attend(&bob).await.unwrap();
    assert_eq!(attending.len(), 1);
    assert_eq!(attending[0].key, second.key);
}

#[tokio::test]
async fn query_conferences_compiles_filters() {
    let backend = TestBackend::new();
    let alice = caller("alice");
    for (name, city, topics, max) in [
        ("Zeta Health", "London", vec!["Medical Innovations"], 100),
        ("Alpha Med", "London", vec!["Medical Innovations", "Web"], 50),
        ("Beta Med", "Paris", vec!["Medical Innovations"], 10),
        ("Gamma", "London", vec!["Programming Languages"], 10),
    ] {
        backend
            .service
            .create_conference(&alice, ConferenceForm {
                name: Some(name.to_string()),
                city: Some(city.to_string()),
                topics: Some(topics.into_iter().map(String::from).collect()),
                max_attendees: Some(max),
                ..ConferenceForm::default()
            })
            .await
            .unwrap();
    }

    let found = backend
        .service
        .query_conferences(&[
            FilterClause::new("CITY", "EQ", "London"),
            FilterClause::new("TOPIC", "EQ", "Medical Innovations"),
        ])
        .await
        .unwrap();
    let names: Vec<_> = found.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha Med", "Zeta Health"]);

    let found = backend
        .service
        .query_conferences(&[
            FilterClause::new("maxAttendees", ">", "5"),
            FilterClause::new("maxAttendees", "<", "100"),
        ])
        .await
        .unwrap();
    let names: Vec<_> = found.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Beta Med", "Gamma", "Alpha Med"]);

    let err = backend
        .service
        .query_conferences(&[
            FilterClause::new("month", ">", "3"),
            FilterClause::new("maxAttendees", "<", "100"),
        ])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ConferenceError::invalid("Inequality filter is allowed on only one field")
    );
}

#[tokio::test]
async fn sessions_are_owner_only_and_queryable() {
    let backend = TestBackend::new();
    let alice = caller("alice");
    let conf = backend
        .service
        .create_conference(&alice, conference_form("RustConf", 10))
        .await
        .unwrap();
    let key = conf.key.to_urlsafe();

    let err = backend
        .service
        .create_session(&caller("bob"), &key, session_form("Intruder", None))
        .await
        .unwrap_err();
    assert!(matches!(err, ConferenceError::PermissionDenied(_)));

    let err = backend
        .service
        .create_session(&alice, &key, SessionForm::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ConferenceError::InvalidArgument(_)));

    let err = backend
        .service
        .create_session(&alice, &key, SessionForm {
            name: Some("Late".to_string()),
            start_time: Some("25:99".to_string()),
            ..SessionForm::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ConferenceError::InvalidArgument(_)));

    let workshop = backend
        .service
        .create_session(&alice, &key, SessionForm {
            name: Some("Async Workshop".to_string()),
            speaker: Some("Ada".to_string()),
            duration: Some(90),
            type_of_session: Some("Workshop".to_string()),
            date: Some("2026-09-11".to_string()),
            start_time: Some("09:30:00".to_string()),
            ..SessionForm::default()
        })
        .await
        .unwrap();
    let talk = backend
        .service
        .create_session(&alice, &key, SessionForm {
            name: Some("Borrowing".to_string()),
            speaker: Some("Grace".to_string()),
            duration: Some(30),
            type_of_session: Some("Talk".to_string()),
            start_time: Some("14:00".to_string()),
            ..SessionForm::default()
        })
        .await
        .unwrap();

    assert_eq!(workshop.start_time, NaiveTime::from_hms_opt(9, 30, 0));
    assert_eq!(workshop.conference_key(), Some(conf.key.clone()));

    let all = backend.service.conference_sessions(&key).await.unwrap();
    assert_eq!(all, vec![workshop.clone(), talk.clone()]);
    assert_eq!(
        backend.service.conference_sessions_by_type(&key, "Talk").await.unwrap(),
        vec![talk.clone()]
    );
    assert_eq!(
        backend.service.sessions_by_speaker("Ada").await.unwrap(),
        vec![workshop.clone()]
    );
    assert_eq!(
        backend.service.sessions_by_duration(30).await.unwrap(),
        vec![talk.clone()]
    );
    assert_eq!(
        backend.service.sessions_by_start_time("09:30").await.unwrap(),
        vec![workshop]
    );
    assert!(matches!(
        backend.service.sessions_by_start_time("noon").await,
        Err(ConferenceError::InvalidArgument(_))
    ));

    let speaker_jobs: Vec<_> = backend
        .queue
        .enqueued()
        .into_iter()
        .filter(|j| matches!(j, Job::SetFeaturedSpeaker { .. }))
        .collect();
    assert_eq!(speaker_jobs.len(), 2);
}

#[tokio::test]
async fn session_queries_on_missing_conference_are_not_found() {
    let backend = TestBackend::new();
    let alice = caller("alice");
    let conf = backend
        .service
        .create_conference(&alice, conference_form("RustConf", 10))
        .await
        .unwrap();
    let ghost = conf
        .key
        .parent()
        .unwrap()
        .child(conf.key.kind(), conference_core::key::KeyId::Id(12_345));

    assert!(matches!(
        backend.service.conference_sessions(&ghost.to_urlsafe()).await,
        Err(ConferenceError::NotFound { .. })
    ));
    assert!(matches!(
        backend
            .service
            .create_session(&alice, &ghost.to_urlsafe(), session_form("x", None))
            .await,
        Err(ConferenceError::NotFound { .. })
    ));
    assert!(backend.service.sessions_by_speaker("Nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn profile_is_created_on_first_access_and_updated_selectively() {
    let backend = TestBackend::new();
    let alice = caller("alice");

    let profile = backend.service.get_profile(&alice).await.unwrap();
    assert_eq!(profile.display_name, "alice");
    assert_eq!(profile.main_email, "alice@example.com");
    assert_eq!(profile.tee_shirt_size, TeeShirtSize::NotSpecified);

    let saved = backend
        .service
        .save_profile(&alice, ProfileForm {
            display_name: Some(String::new()),
            tee_shirt_size: Some(TeeShirtSize::MW),
        })
        .await
        .unwrap();
    assert_eq!(saved.display_name, "alice");
    assert_eq!(saved.tee_shirt_size, TeeShirtSize::MW);
    assert_eq!(backend.service.get_profile(&alice).await.unwrap(), saved);
}
