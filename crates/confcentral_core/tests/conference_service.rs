mod common;

use chrono::NaiveTime;
use common::{conference_draft, session_draft, Harness};
use confcentral_core::{
    ConferenceError, ConferenceService, ConferenceUpdate, ProfileUpdate, SessionDraft,
    StaticIdentity, Task, TeeShirtSize,
};
use std::sync::Arc;

fn anonymous(harness: &Harness) -> ConferenceService {
    harness
        .service
        .with_identity(Arc::new(StaticIdentity::anonymous()))
}

#[test]
fn profile_is_created_lazily_from_identity() {
    let harness = Harness::in_memory("ada");
    let profile = harness.service.profile().unwrap();

    assert_eq!(profile.user_id, "ada");
    assert_eq!(profile.display_name, "ada");
    assert_eq!(profile.main_email, "ada@example.com");
    assert_eq!(profile.tee_shirt_size, TeeShirtSize::NotSpecified);
    assert_eq!(harness.service.profile().unwrap(), profile);
}

#[test]
fn save_profile_ignores_blank_fields() {
    let harness = Harness::in_memory("ada");
    harness
        .service
        .save_profile(&ProfileUpdate {
            display_name: Some("Ada Lovelace".to_string()),
            tee_shirt_size: Some(TeeShirtSize::MW),
        })
        .unwrap();
    let profile = harness
        .service
        .save_profile(&ProfileUpdate {
            display_name: Some("   ".to_string()),
            tee_shirt_size: None,
        })
        .unwrap();

    assert_eq!(profile.display_name, "Ada Lovelace");
    assert_eq!(profile.tee_shirt_size, TeeShirtSize::MW);
    assert_eq!(harness.service.profile().unwrap(), profile);
}

#[test]
fn writes_require_a_current_user() {
    let harness = Harness::in_memory("organizer");
    let key = harness
        .service
        .create_conference(&conference_draft("RustConf", 10))
        .unwrap()
        .id
        .to_string();
    let anonymous = anonymous(&harness);

    let errors = [
        anonymous.profile().map(|_| ()),
        anonymous
            .create_conference(&conference_draft("Other", 1))
            .map(|_| ()),
        anonymous.register(&key).map(|_| ()),
        anonymous.conferences_created().map(|_| ()),
    ];
    for result in errors {
        assert!(matches!(
            result,
            Err(ConferenceError::AuthenticationRequired)
        ));
    }

    assert_eq!(anonymous.conference(&key).unwrap().name, "RustConf");
}

#[test]
fn create_conference_applies_defaults_and_queues_confirmation() {
    let harness = Harness::in_memory("organizer");
    let mut draft = conference_draft("  Rust   Conf ", 40);
    draft.start_date = Some("2026-06-10".to_string());
    let conference = harness.service.create_conference(&draft).unwrap();

    assert_eq!(conference.name, "Rust Conf");
    assert_eq!(conference.city, "Default City");
    assert_eq!(conference.topics, vec!["Default", "Topic"]);
    assert_eq!(conference.month, 6);
    assert_eq!(conference.seats_available, 40);
    assert_eq!(
        harness.service.conference(&conference.id.to_string()).unwrap(),
        conference
    );
    assert!(harness.queue.snapshot().iter().any(|task| matches!(
        task,
        Task::SendConfirmationEmail { conference_id, email, .. }
            if *conference_id == conference.id && email == "organizer@example.com"
    )));
}

#[test]
fn missing_name_and_bad_dates_are_validation_errors() {
    let harness = Harness::in_memory("organizer");
    let err = harness
        .service
        .create_conference(&conference_draft("", 1))
        .unwrap_err();
    assert!(matches!(err, ConferenceError::Validation(_)), "{err}");

    let mut draft = conference_draft("RustConf", 1);
    draft.start_date = Some("June 10".to_string());
    let err = harness.service.create_conference(&draft).unwrap_err();
    assert!(matches!(err, ConferenceError::Validation(_)), "{err}");
}

#[test]
fn only_the_organizer_updates_or_adds_sessions() {
    let harness = Harness::in_memory("organizer");
    let key = harness
        .service
        .create_conference(&conference_draft("RustConf", 10))
        .unwrap()
        .id
        .to_string();
    let stranger = harness.as_user("stranger");

    let update = ConferenceUpdate {
        city: Some("Berlin".to_string()),
        ..ConferenceUpdate::default()
    };
    let err = stranger.update_conference(&key, &update).unwrap_err();
    assert!(matches!(err, ConferenceError::Authorization(_)), "{err}");
    let err = stranger
        .create_session(&key, &session_draft("Talk", "Ada"))
        .unwrap_err();
    assert!(matches!(err, ConferenceError::Authorization(_)), "{err}");

    let updated = harness.service.update_conference(&key, &update).unwrap();
    assert_eq!(updated.city, "Berlin");
    assert_eq!(updated.name, "RustConf");
}

#[test]
fn update_start_date_recomputes_month() {
    let harness = Harness::in_memory("organizer");
    let key = harness
        .service
        .create_conference(&conference_draft("RustConf", 10))
        .unwrap()
        .id
        .to_string();
    let update = ConferenceUpdate {
        start_date: Some("2026-11-02".to_string()),
        topics: Some(vec!["Rust".to_string(), "rust ".to_string()]),
        ..ConferenceUpdate::default()
    };

    let updated = harness.service.update_conference(&key, &update).unwrap();
    assert_eq!(updated.month, 11);
    assert_eq!(updated.topics, vec!["Rust", "rust"]);
}

#[test]
fn conferences_created_lists_only_own_conferences() {
    let harness = Harness::in_memory("organizer");
    harness
        .service
        .create_conference(&conference_draft("Beta", 1))
        .unwrap();
    harness
        .service
        .create_conference(&conference_draft("Alpha", 1))
        .unwrap();
    harness
        .as_user("other")
        .create_conference(&conference_draft("Gamma", 1))
        .unwrap();

    let names: Vec<String> = harness
        .service
        .conferences_created()
        .unwrap()
        .into_iter()
        .map(|conference| conference.name)
        .collect();
    assert_eq!(names, vec!["Alpha", "Beta"]);
}

#[test]
fn duplicate_session_name_is_conflict() {
    let harness = Harness::in_memory("organizer");
    let key = harness
        .service
        .create_conference(&conference_draft("RustConf", 10))
        .unwrap()
        .id
        .to_string();
    harness
        .service
        .create_session(&key, &session_draft("Keynote", "Ada"))
        .unwrap();

    let err = harness
        .service
        .create_session(&key, &session_draft(" Keynote ", "Grace"))
        .unwrap_err();
    assert!(matches!(err, ConferenceError::Conflict(_)), "{err}");
}

#[test]
fn session_queries_filter_and_order() {
    let harness = Harness::in_memory("organizer");
    let mut draft = conference_draft("RustConf", 10);
    draft.start_date = Some("2026-06-10".to_string());
    let conference = harness.service.create_conference(&draft).unwrap();
    let key = conference.id.to_string();

    let sessions = [
        ("Evening Social", "Ada", "Social", Some("2026-06-10"), "19:30"),
        ("Hands-on Async", "Grace", "Workshop", Some("2026-06-10"), "10:00"),
        ("Keynote", "Ada", "Talk", Some("2026-06-10"), "09:00"),
        ("Closing", "Linus", "Talk", Some("2026-06-11"), "08:30"),
    ];
    for (name, speaker, session_type, date, start_time) in sessions {
        let draft = SessionDraft {
            name: name.to_string(),
            speaker: Some(speaker.to_string()),
            session_type: Some(session_type.to_string()),
            date: date.map(str::to_string),
            start_time: Some(start_time.to_string()),
            ..SessionDraft::default()
        };
        harness.service.create_session(&key, &draft).unwrap();
    }
    let names = |sessions: Vec<confcentral_core::Session>| -> Vec<String> {
        sessions.into_iter().map(|session| session.name).collect()
    };

    assert_eq!(
        names(harness.service.conference_sessions(&key).unwrap()),
        vec!["Closing", "Evening Social", "Hands-on Async", "Keynote"]
    );
    assert_eq!(
        names(harness.service.conference_sessions_by_type(&key, "Talk").unwrap()),
        vec!["Closing", "Keynote"]
    );
    assert_eq!(
        names(harness.service.conference_sessions_by_date(&key).unwrap()),
        vec!["Keynote", "Hands-on Async", "Evening Social", "Closing"]
    );
    assert_eq!(
        names(harness.service.sessions_by_speaker("Ada").unwrap()),
        vec!["Evening Social", "Keynote"]
    );
    let cutoff = NaiveTime::from_hms_opt(19, 0, 0).unwrap();
    assert_eq!(
        names(harness.service.non_workshop_sessions_before(&key, cutoff).unwrap()),
        vec!["Keynote", "Closing"]
    );
}

#[test]
fn session_date_defaults_to_conference_start() {
    let harness = Harness::in_memory("organizer");
    let mut draft = conference_draft("RustConf", 10);
    draft.start_date = Some("2026-06-10".to_string());
    let conference = harness.service.create_conference(&draft).unwrap();

    let session = harness
        .service
        .create_session(&conference.id.to_string(), &session_draft("Keynote", "Ada"))
        .unwrap();
    assert_eq!(session.date, conference.start_date);
    assert_eq!(session.duration_minutes, 15);
    assert!(harness
        .queue
        .snapshot()
        .contains(&Task::RecomputeFeaturedSpeakers(conference.id)));
}
