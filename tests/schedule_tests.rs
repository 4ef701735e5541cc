// tests/schedule_tests.rs

mod common;

use chrono::{Duration, Utc};
use common::{Fixture, add_pilot, add_user, answers, approve, fixture, quiz_request};
use prism_backend::{
    error::AppError,
    models::{
        schedule::{CreateScheduleRequest, NewSchedule, ScheduleStatus},
        user::ROLE_OWNER,
    },
    services::{
        attempts::create_attempt,
        scheduling::{
            FINALIZED_ACKNOWLEDGEMENT, accept_schedule, create_schedule, finalize_schedule_via_email,
            list_schedules,
        },
    },
    store::PortalStore,
};

/// Enrolls the learner and records one attempt, passing or not.
async fn prepare_learner(fx: &Fixture, pass: bool) {
    approve(&fx.store, fx.pilot.id, fx.learner.id).await;
    let quiz = fx
        .store
        .create_quiz(fx.pilot.id, &quiz_request(&[10], 100))
        .await
        .unwrap();
    create_attempt(&fx.store, quiz.info.id, fx.learner.id, &answers(&quiz, &[pass]))
        .await
        .unwrap();
}

fn request(fx: &Fixture, days_ahead: i64) -> CreateScheduleRequest {
    CreateScheduleRequest {
        pilot_id: fx.pilot.id,
        scheduled_date_time: (Utc::now() + Duration::days(days_ahead)).to_rfc3339(),
        message: Some("Can we go over the <b>landing</b> checklist?".to_string()),
    }
}

#[tokio::test]
async fn test_create_schedule_notifies_owner() {
    let fx = fixture().await;
    prepare_learner(&fx, true).await;

    let outcome = create_schedule(&fx.store, &fx.notifier, fx.learner.id, &request(&fx, 3), Utc::now())
        .await
        .unwrap();

    assert_eq!(outcome.schedule.status, ScheduleStatus::Pending);
    assert_eq!(outcome.schedule.owner_id, fx.owner.id);
    assert!(outcome.notification_sent);

    let sent = fx.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, fx.owner.email);
    assert!(!sent[0].html.contains("<b>landing</b>"));
}

#[tokio::test]
async fn test_second_pending_request_conflicts() {
    let fx = fixture().await;
    prepare_learner(&fx, true).await;

    let first = create_schedule(&fx.store, &fx.notifier, fx.learner.id, &request(&fx, 3), Utc::now())
        .await
        .unwrap();
    let err = create_schedule(&fx.store, &fx.notifier, fx.learner.id, &request(&fx, 5), Utc::now())
        .await
        .unwrap_err();

    match err {
        AppError::PendingScheduleExists(at) => assert_eq!(at, first.schedule.scheduled_date_time),
        other => panic!("expected PendingScheduleExists, got {:?}", other),
    }
    assert_eq!(fx.store.row_counts().await.schedules, 1);
}

#[tokio::test]
async fn test_past_time_rejected() {
    let fx = fixture().await;
    prepare_learner(&fx, true).await;

    let err = create_schedule(&fx.store, &fx.notifier, fx.learner.id, &request(&fx, -1), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(fx.store.row_counts().await.schedules, 0);
}

#[tokio::test]
async fn test_requires_approved_enrollment() {
    let fx = fixture().await;
    // Requested but never approved.
    fx.store
        .request_enrollment(fx.pilot.id, fx.learner.id)
        .await
        .unwrap();

    let err = create_schedule(&fx.store, &fx.notifier, fx.learner.id, &request(&fx, 3), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(fx.store.row_counts().await.schedules, 0);
}

#[tokio::test]
async fn test_requires_passing_attempt() {
    let fx = fixture().await;
    prepare_learner(&fx, false).await;

    let err = create_schedule(&fx.store, &fx.notifier, fx.learner.id, &request(&fx, 3), Utc::now())
        .await
        .unwrap_err();

    match err {
        AppError::BadRequest(message) => assert!(message.contains("must pass the pilot quiz")),
        other => panic!("expected BadRequest, got {:?}", other),
    }
    assert_eq!(fx.store.row_counts().await.schedules, 0);
    assert!(fx.mailer.sent().await.is_empty());
}

#[tokio::test]
async fn test_only_owner_can_accept() {
    let fx = fixture().await;
    prepare_learner(&fx, true).await;
    let outcome = create_schedule(&fx.store, &fx.notifier, fx.learner.id, &request(&fx, 3), Utc::now())
        .await
        .unwrap();
    let stranger = add_user(&fx.store, "other-owner@example.com", ROLE_OWNER).await;

    let err = accept_schedule(&fx.store, &fx.notifier, outcome.schedule.id, stranger.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = accept_schedule(&fx.store, &fx.notifier, outcome.schedule.id, fx.learner.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let row = fx.store.find_schedule(outcome.schedule.id).await.unwrap().unwrap();
    assert_eq!(row.status, ScheduleStatus::Pending);
}

#[tokio::test]
async fn test_accept_notifies_learner() {
    let fx = fixture().await;
    prepare_learner(&fx, true).await;
    let created = create_schedule(&fx.store, &fx.notifier, fx.learner.id, &request(&fx, 3), Utc::now())
        .await
        .unwrap();

    let accepted = accept_schedule(&fx.store, &fx.notifier, created.schedule.id, fx.owner.id)
        .await
        .unwrap();

    assert_eq!(accepted.schedule.status, ScheduleStatus::Accepted);
    assert_eq!(accepted.schedule.final_message, None);
    assert!(accepted.notification_sent);
    let sent = fx.mailer.sent().await;
    assert_eq!(sent.last().map(|e| e.to.as_str()), Some(fx.learner.email.as_str()));
}

#[tokio::test]
async fn test_terminal_states_do_not_move() {
    let fx = fixture().await;
    prepare_learner(&fx, true).await;
    let created = create_schedule(&fx.store, &fx.notifier, fx.learner.id, &request(&fx, 3), Utc::now())
        .await
        .unwrap();
    let accepted = accept_schedule(&fx.store, &fx.notifier, created.schedule.id, fx.owner.id)
        .await
        .unwrap();

    let err = accept_schedule(&fx.store, &fx.notifier, created.schedule.id, fx.owner.id)
        .await
        .unwrap_err();
    match err {
        AppError::InvalidState(message) => assert!(message.contains("ACCEPTED")),
        other => panic!("expected InvalidState, got {:?}", other),
    }

    let err = finalize_schedule_via_email(&fx.store, &fx.notifier, created.schedule.id, fx.owner.id, "See you")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let row = fx.store.find_schedule(created.schedule.id).await.unwrap().unwrap();
    assert_eq!(row.status, ScheduleStatus::Accepted);
    assert_eq!(row.updated_at, accepted.schedule.updated_at);
    assert_eq!(row.final_message, None);
}

#[tokio::test]
async fn test_finalized_schedule_does_not_move() {
    let fx = fixture().await;
    prepare_learner(&fx, true).await;
    let created = create_schedule(&fx.store, &fx.notifier, fx.learner.id, &request(&fx, 3), Utc::now())
        .await
        .unwrap();

    let finalized = finalize_schedule_via_email(
        &fx.store,
        &fx.notifier,
        created.schedule.id,
        fx.owner.id,
        "<p>I'll email you a <b>Friday</b> slot</p>",
    )
    .await
    .unwrap();

    assert_eq!(finalized.schedule.status, ScheduleStatus::FinalizedViaEmail);
    assert_eq!(finalized.schedule.final_message.as_deref(), Some(FINALIZED_ACKNOWLEDGEMENT));
    let sent = fx.mailer.sent().await;
    let email = sent.last().unwrap();
    assert_eq!(email.to, fx.learner.email);
    assert!(email.html.contains("<b>Friday</b>"));

    let err = accept_schedule(&fx.store, &fx.notifier, created.schedule.id, fx.owner.id)
        .await
        .unwrap_err();
    match err {
        AppError::InvalidState(message) => assert!(message.contains("FINALIZEDVIAEMAIL")),
        other => panic!("expected InvalidState, got {:?}", other),
    }

    let row = fx.store.find_schedule(created.schedule.id).await.unwrap().unwrap();
    assert_eq!(row.status, ScheduleStatus::FinalizedViaEmail);
    assert_eq!(row.final_message.as_deref(), Some(FINALIZED_ACKNOWLEDGEMENT));
}

#[tokio::test]
async fn test_email_failure_keeps_transition() {
    let fx = fixture().await;
    prepare_learner(&fx, true).await;
    fx.mailer.set_failing(true).await;

    let created = create_schedule(&fx.store, &fx.notifier, fx.learner.id, &request(&fx, 3), Utc::now())
        .await
        .unwrap();
    assert!(!created.notification_sent);
    assert_eq!(fx.store.row_counts().await.schedules, 1);

    let accepted = accept_schedule(&fx.store, &fx.notifier, created.schedule.id, fx.owner.id)
        .await
        .unwrap();
    assert!(!accepted.notification_sent);
    assert_eq!(accepted.schedule.status, ScheduleStatus::Accepted);
}

#[tokio::test]
async fn test_new_request_allowed_after_accept() {
    let fx = fixture().await;
    prepare_learner(&fx, true).await;
    let first = create_schedule(&fx.store, &fx.notifier, fx.learner.id, &request(&fx, 3), Utc::now())
        .await
        .unwrap();
    accept_schedule(&fx.store, &fx.notifier, first.schedule.id, fx.owner.id)
        .await
        .unwrap();

    let second = create_schedule(&fx.store, &fx.notifier, fx.learner.id, &request(&fx, 10), Utc::now())
        .await
        .unwrap();
    assert_ne!(second.schedule.id, first.schedule.id);

    let learner_view = list_schedules(&fx.store, fx.learner.id).await.unwrap();
    assert_eq!(learner_view.requested.len(), 2);
    assert!(learner_view.received.is_empty());

    let owner_view = list_schedules(&fx.store, fx.owner.id).await.unwrap();
    assert_eq!(owner_view.received.len(), 2);
    // Latest meeting time first.
    assert_eq!(owner_view.received[0].id, second.schedule.id);
}

#[tokio::test]
async fn test_owner_without_email_can_still_respond() {
    let fx = fixture().await;
    let silent_owner = add_user(&fx.store, "", ROLE_OWNER).await;
    let pilot = add_pilot(&fx.store, silent_owner.id, "Gliding").await;
    let pending = fx
        .store
        .insert_schedule(NewSchedule {
            pilot_id: pilot.id,
            user_id: fx.learner.id,
            owner_id: silent_owner.id,
            scheduled_date_time: Utc::now() + Duration::days(4),
            message: None,
        })
        .await
        .unwrap();

    let accepted = accept_schedule(&fx.store, &fx.notifier, pending.id, silent_owner.id)
        .await
        .unwrap();
    assert_eq!(accepted.schedule.status, ScheduleStatus::Accepted);
    assert_eq!(
        fx.mailer.sent().await.last().map(|e| e.to.clone()),
        Some(fx.learner.email.clone())
    );

    // A new request still needs a reachable owner.
    approve(&fx.store, pilot.id, fx.learner.id).await;
    let quiz = fx.store.create_quiz(pilot.id, &quiz_request(&[10], 50)).await.unwrap();
    create_attempt(&fx.store, quiz.info.id, fx.learner.id, &answers(&quiz, &[true]))
        .await
        .unwrap();
    let err = create_schedule(
        &fx.store,
        &fx.notifier,
        fx.learner.id,
        &CreateScheduleRequest {
            pilot_id: pilot.id,
            scheduled_date_time: (Utc::now() + Duration::days(6)).to_rfc3339(),
            message: None,
        },
        Utc::now(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
