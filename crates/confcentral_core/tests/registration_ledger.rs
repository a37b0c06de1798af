mod common;

use common::{conference_draft, Harness};
use confcentral_core::repo::conference_repo::{ConferenceRepository, SqliteConferenceRepository};
use confcentral_core::repo::profile_repo::{ProfileRepository, SqliteProfileRepository};
use confcentral_core::{ConferenceError, ConferenceResult, Database, RepoError};
use std::thread;
use uuid::Uuid;

fn roster_matches_seats(db: &Database, conference_id: Uuid) -> (u32, u32, u32) {
    db.with_conn(|conn| -> ConferenceResult<_> {
        let conference = SqliteConferenceRepository::new(conn)
            .get_conference(conference_id)?
            .unwrap();
        let roster = SqliteProfileRepository::new(conn).count_registrations(conference_id)?;
        Ok((conference.max_attendees, conference.seats_available, roster))
    })
    .unwrap()
}

#[test]
fn register_takes_a_seat_and_unregister_returns_it() {
    let harness = Harness::in_memory("organizer");
    let conference = harness
        .service
        .create_conference(&conference_draft("RustConf", 3))
        .unwrap();
    let key = conference.id.to_string();
    let attendee = harness.as_user("attendee");

    attendee.register(&key).unwrap();
    assert_eq!(attendee.conference(&key).unwrap().seats_available, 2);
    assert_eq!(
        attendee.profile().unwrap().conference_keys_to_attend.len(),
        1
    );
    let attending = attendee.conferences_to_attend().unwrap();
    assert_eq!(attending[0].id, conference.id);

    assert!(attendee.unregister(&key).unwrap());
    assert_eq!(attendee.conference(&key).unwrap().seats_available, 3);
    assert!(attendee.conferences_to_attend().unwrap().is_empty());
}

#[test]
fn double_register_is_conflict() {
    let harness = Harness::in_memory("organizer");
    let key = harness
        .service
        .create_conference(&conference_draft("RustConf", 10))
        .unwrap()
        .id
        .to_string();

    harness.service.register(&key).unwrap();
    let err = harness.service.register(&key).unwrap_err();
    assert!(matches!(err, ConferenceError::Conflict(_)), "{err}");
    assert_eq!(harness.service.conference(&key).unwrap().seats_available, 9);
}

#[test]
fn unregister_without_registration_returns_false() {
    let harness = Harness::in_memory("organizer");
    let key = harness
        .service
        .create_conference(&conference_draft("RustConf", 10))
        .unwrap()
        .id
        .to_string();

    assert!(!harness.service.unregister(&key).unwrap());
    assert_eq!(harness.service.conference(&key).unwrap().seats_available, 10);
}

#[test]
fn full_conference_is_conflict() {
    let harness = Harness::in_memory("organizer");
    let key = harness
        .service
        .create_conference(&conference_draft("Tiny", 1))
        .unwrap()
        .id
        .to_string();

    harness.as_user("first").register(&key).unwrap();
    let err = harness.as_user("second").register(&key).unwrap_err();
    assert!(matches!(err, ConferenceError::Conflict(_)), "{err}");
}

#[test]
fn unknown_or_malformed_conference_is_not_found() {
    let harness = Harness::in_memory("organizer");
    for key in [Uuid::new_v4().to_string(), "not-a-key".to_string()] {
        let err = harness.service.register(&key).unwrap_err();
        assert!(matches!(err, ConferenceError::NotFound(_)), "{err}");
    }
}

#[test]
fn shrinking_capacity_keeps_roster_invariant() {
    let harness = Harness::in_memory("organizer");
    let key = harness
        .service
        .create_conference(&conference_draft("RustConf", 10))
        .unwrap()
        .id
        .to_string();
    for user in ["a", "b", "c"] {
        harness.as_user(user).register(&key).unwrap();
    }

    let update = confcentral_core::ConferenceUpdate {
        max_attendees: Some(4),
        ..Default::default()
    };
    let conference = harness.service.update_conference(&key, &update).unwrap();
    assert_eq!(conference.seats_available, 1);

    let too_small = confcentral_core::ConferenceUpdate {
        max_attendees: Some(2),
        ..Default::default()
    };
    let err = harness.service.update_conference(&key, &too_small).unwrap_err();
    assert!(matches!(err, ConferenceError::Conflict(_)), "{err}");
}

#[test]
fn concurrent_registrations_never_oversell() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("concurrent.db");
    let organizer = Harness::with_db(Database::open(&path).unwrap(), "organizer");
    let conference = organizer
        .service
        .create_conference(&conference_draft("Popular", 5))
        .unwrap();
    let key = conference.id.to_string();

    let workers: Vec<_> = (0..12)
        .map(|worker| {
            let path = path.clone();
            let key = key.clone();
            thread::spawn(move || {
                let db = Database::open(&path).unwrap().with_transaction_attempts(10);
                let harness = Harness::with_db(db, &format!("user-{worker}"));
                for round in 0..4 {
                    let outcome = if round % 2 == 0 {
                        harness.service.register(&key)
                    } else {
                        harness.service.unregister(&key).map(|_| ())
                    };
                    match outcome {
                        Ok(()) | Err(ConferenceError::Conflict(_) | ConferenceError::Transient(_)) => {}
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let (max_attendees, seats_available, roster) = roster_matches_seats(&organizer.db, conference.id);
    assert_eq!(max_attendees, 5);
    assert!(seats_available <= max_attendees);
    assert_eq!(max_attendees - seats_available, roster);
}

#[test]
fn unregister_reports_drifted_seat_counter() {
    let harness = Harness::in_memory("organizer");
    let conference = harness
        .service
        .create_conference(&conference_draft("RustConf", 4))
        .unwrap();
    let key = conference.id.to_string();
    harness.service.register(&key).unwrap();

    harness
        .db
        .with_conn(|conn| -> ConferenceResult<_> {
            Ok(SqliteConferenceRepository::new(conn).set_seats_available(conference.id, 4)?)
        })
        .unwrap();

    let err = harness.service.unregister(&key).unwrap_err();
    assert!(
        matches!(err, ConferenceError::Store(RepoError::InvalidData(_))),
        "{err}"
    );
    let (_, seats_available, roster) = roster_matches_seats(&harness.db, conference.id);
    assert_eq!(seats_available, 4);
    assert_eq!(roster, 1);
}
