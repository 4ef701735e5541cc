// tests/pilot_deletion_tests.rs

mod common;

use std::time::Duration;

use chrono::Utc;
use common::{Fixture, add_pilot, add_user, answers, approve, fixture, quiz_request};
use prism_backend::{
    error::AppError,
    models::{
        schedule::NewSchedule,
        user::{ROLE_ADMIN, ROLE_OWNER},
    },
    services::{attempts::create_attempt, pilot_deletion::delete_pilot},
    store::{PortalStore, memory::RowCounts},
    utils::storage::ObjectStorage,
};

const BUDGET: Duration = Duration::from_secs(30);

/// Keys of the objects a populated pilot owns.
struct PilotObjects {
    video: String,
    note: String,
    thumbnail: String,
}

async fn stored_file(fx: &Fixture, key: &str) -> i64 {
    fx.storage.put(key, b"bytes".to_vec(), None).await.unwrap();
    fx.store.insert_file(key, None).await.unwrap().id
}

/// Gives `pilot_id` a quiz with attempts, an enrollment, a schedule, a lesson
/// with video, note and progress, and a thumbnail.
async fn populate(fx: &Fixture, pilot_id: i64) -> PilotObjects {
    let objects = PilotObjects {
        video: format!("lessons/{}/video.mp4", pilot_id),
        note: format!("lessons/{}/notes.pdf", pilot_id),
        thumbnail: format!("pilots/{}/thumbnail.png", pilot_id),
    };

    approve(&fx.store, pilot_id, fx.learner.id).await;

    let quiz = fx
        .store
        .create_quiz(pilot_id, &quiz_request(&[10, 20], 50))
        .await
        .unwrap();
    for correct in [[true, true], [false, false]] {
        create_attempt(&fx.store, quiz.info.id, fx.learner.id, &answers(&quiz, &correct))
            .await
            .unwrap();
    }

    let owner = fx.store.find_pilot_owner(pilot_id).await.unwrap().unwrap();
    fx.store
        .insert_schedule(NewSchedule {
            pilot_id,
            user_id: fx.learner.id,
            owner_id: owner.owner_id,
            scheduled_date_time: Utc::now() + chrono::Duration::days(2),
            message: None,
        })
        .await
        .unwrap();

    let video_id = stored_file(fx, &objects.video).await;
    let lesson = fx
        .store
        .insert_lesson(pilot_id, "Pre-flight", Some(video_id))
        .await
        .unwrap();
    let note_id = stored_file(fx, &objects.note).await;
    fx.store
        .insert_note(lesson.id, "Checklist", Some(note_id))
        .await
        .unwrap();
    fx.store
        .insert_note(lesson.id, "Blank note", None)
        .await
        .unwrap();
    fx.store
        .record_lesson_progress(lesson.id, fx.learner.id)
        .await
        .unwrap();

    let thumbnail_id = stored_file(fx, &objects.thumbnail).await;
    fx.store
        .set_pilot_thumbnail(pilot_id, thumbnail_id)
        .await
        .unwrap();

    objects
}

#[tokio::test]
async fn test_delete_leaves_no_rows_behind() {
    let fx = fixture().await;

    // A neighbouring pilot of the same owner must survive untouched.
    let neighbour = add_pilot(&fx.store, fx.owner.id, "Night Flying").await;
    let neighbour_objects = populate(&fx, neighbour.id).await;
    let before = fx.store.row_counts().await;

    let objects = populate(&fx, fx.pilot.id).await;

    let report = delete_pilot(&fx.store, &fx.storage, fx.pilot.id, fx.owner.id, false, BUDGET)
        .await
        .unwrap();

    // Only the deleted pilot's own row differs from the snapshot.
    assert_eq!(
        fx.store.row_counts().await,
        RowCounts {
            pilots: before.pilots - 1,
            ..before
        }
    );
    assert!(fx.store.find_pilot(fx.pilot.id).await.unwrap().is_none());
    assert!(fx.store.find_pilot(neighbour.id).await.unwrap().is_some());

    assert_eq!(report.quizzes, 1);
    assert_eq!(report.questions, 2);
    assert_eq!(report.options, 4);
    assert_eq!(report.attempts, 2);
    assert_eq!(report.results, 2);
    assert_eq!(report.user_answers, 4);
    assert_eq!(report.quiz_settings, 1);
    assert_eq!(report.enrollments, 1);
    assert_eq!(report.schedules, 1);
    assert_eq!(report.lessons, 1);
    assert_eq!(report.lesson_progress, 1);
    assert_eq!(report.notes, 2);
    assert_eq!(report.files, 3);
    assert!(report.orphaned_keys.is_empty());

    for key in [&objects.video, &objects.note, &objects.thumbnail] {
        assert!(!fx.storage.contains(key).await, "{} still stored", key);
    }
    assert!(fx.storage.contains(&neighbour_objects.video).await);
}

#[tokio::test]
async fn test_failed_video_delete_rolls_back() {
    let fx = fixture().await;
    let objects = populate(&fx, fx.pilot.id).await;
    fx.storage.fail_deletes_for(&objects.video).await;
    let before = fx.store.row_counts().await;

    let err = delete_pilot(&fx.store, &fx.storage, fx.pilot.id, fx.owner.id, false, BUDGET)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::DependencyFailure(_)));
    assert_eq!(fx.store.row_counts().await, before);
    let pilot = fx.store.find_pilot(fx.pilot.id).await.unwrap().unwrap();
    assert!(pilot.thumbnail_file_id.is_some());
}

#[tokio::test]
async fn test_failed_thumbnail_delete_rolls_back() {
    let fx = fixture().await;
    let objects = populate(&fx, fx.pilot.id).await;
    fx.storage.fail_deletes_for(&objects.thumbnail).await;
    let before = fx.store.row_counts().await;

    let err = delete_pilot(&fx.store, &fx.storage, fx.pilot.id, fx.owner.id, false, BUDGET)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::DependencyFailure(_)));
    assert_eq!(fx.store.row_counts().await, before);
}

#[tokio::test]
async fn test_failed_note_delete_is_reported() {
    let fx = fixture().await;
    let objects = populate(&fx, fx.pilot.id).await;
    fx.storage.fail_deletes_for(&objects.note).await;

    let report = delete_pilot(&fx.store, &fx.storage, fx.pilot.id, fx.owner.id, false, BUDGET)
        .await
        .unwrap();

    assert_eq!(report.orphaned_keys, vec![objects.note.clone()]);
    assert!(fx.storage.contains(&objects.note).await);
    let counts = fx.store.row_counts().await;
    assert_eq!((counts.pilots, counts.notes, counts.files), (0, 0, 0));
}

#[tokio::test]
async fn test_only_owner_or_admin_may_delete() {
    let fx = fixture().await;
    populate(&fx, fx.pilot.id).await;
    let before = fx.store.row_counts().await;
    let other_owner = add_user(&fx.store, "rival@example.com", ROLE_OWNER).await;
    let admin = add_user(&fx.store, "admin@example.com", ROLE_ADMIN).await;

    let err = delete_pilot(&fx.store, &fx.storage, fx.pilot.id, other_owner.id, false, BUDGET)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(fx.store.row_counts().await, before);

    delete_pilot(&fx.store, &fx.storage, fx.pilot.id, admin.id, true, BUDGET)
        .await
        .unwrap();
    assert_eq!(fx.store.row_counts().await.pilots, 0);
}

#[tokio::test]
async fn test_unknown_pilot_not_found() {
    let fx = fixture().await;
    let err = delete_pilot(&fx.store, &fx.storage, 4_242, fx.owner.id, false, BUDGET)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
