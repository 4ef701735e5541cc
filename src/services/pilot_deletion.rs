// src/services/pilot_deletion.rs

//! Deletes a pilot and everything hanging off it inside one transaction.
//!
//! Children go before parents in a fixed order; the schema has no cascades.
//! Stored objects cannot be rolled back, so the video and thumbnail deletes
//! abort the transaction while note files are only reported as orphaned.

use std::time::Duration;

use crate::{
    error::AppError,
    models::pilot::{DeletionReport, StoredFile},
    store::{PortalStore, StoreTx},
    utils::storage::ObjectStorage,
};

pub async fn delete_pilot(
    store: &dyn PortalStore,
    storage: &dyn ObjectStorage,
    pilot_id: i64,
    caller_id: i64,
    caller_is_admin: bool,
    budget: Duration,
) -> Result<DeletionReport, AppError> {
    let pilot = store
        .find_pilot(pilot_id)
        .await?
        .ok_or(AppError::NotFound("Pilot not found".to_string()))?;

    if pilot.owner_id != caller_id && !caller_is_admin {
        return Err(AppError::Forbidden(
            "Only the pilot owner can delete this pilot".to_string(),
        ));
    }

    let report = tokio::time::timeout(budget, run(store, storage, pilot_id, budget))
        .await
        .map_err(|_| {
            AppError::InternalServerError(format!(
                "Deleting pilot {} exceeded {}s",
                pilot_id,
                budget.as_secs()
            ))
        })??;

    tracing::info!(
        pilot_id,
        caller_id,
        quizzes = report.quizzes,
        lessons = report.lessons,
        files = report.files,
        orphaned = report.orphaned_keys.len(),
        "pilot deleted"
    );
    Ok(report)
}

async fn run(
    store: &dyn PortalStore,
    storage: &dyn ObjectStorage,
    pilot_id: i64,
    budget: Duration,
) -> Result<DeletionReport, AppError> {
    let mut tx = store.begin().await?;
    tx.set_timeout(budget.as_secs().max(1)).await?;

    let mut report = DeletionReport {
        pilot_id,
        ..Default::default()
    };

    // 1. quiz trees
    for quiz_id in tx.quiz_ids_for_pilot(pilot_id).await? {
        for attempt_id in tx.attempt_ids_for_quiz(quiz_id).await? {
            report.user_answers += tx.delete_user_answers(attempt_id).await?;
            report.results += tx.delete_quiz_result(attempt_id).await?;
        }
        report.attempts += tx.delete_attempts(quiz_id).await?;
        report.options += tx.delete_options(quiz_id).await?;
        report.questions += tx.delete_questions(quiz_id).await?;
        report.quiz_settings += tx.delete_quiz_settings(quiz_id).await?;
    }

    // 2.
    report.quizzes = tx.delete_quizzes(pilot_id).await?;

    // 3. enrollments, then the meeting requests that also point at the pilot
    report.enrollments = tx.delete_enrollments(pilot_id).await?;
    report.schedules = tx.delete_schedules(pilot_id).await?;

    // 4. lessons
    for lesson in tx.lessons_for_pilot(pilot_id).await? {
        report.lesson_progress += tx.delete_lesson_progress(lesson.lesson_id).await?;

        if let Some(video) = &lesson.video {
            report.files += remove_file(tx.as_mut(), storage, video).await?;
        }

        for note in &lesson.notes {
            if let Some(file) = &note.file {
                if let Err(e) = storage.delete(&file.key).await {
                    tracing::warn!(key = %file.key, error = %e, "note file left in storage");
                    report.orphaned_keys.push(file.key.clone());
                }
                report.files += tx.delete_file(file.id).await?;
            }
            report.notes += tx.delete_note(note.note_id).await?;
        }

        report.lessons += tx.delete_lesson(lesson.lesson_id).await?;
    }

    // 5.
    if let Some(thumbnail) = tx.pilot_thumbnail(pilot_id).await? {
        report.files += remove_file(tx.as_mut(), storage, &thumbnail).await?;
    }

    // 6.
    if tx.delete_pilot(pilot_id).await? == 0 {
        return Err(AppError::NotFound("Pilot not found".to_string()));
    }

    tx.commit().await?;
    Ok(report)
}

/// Storage first: a failure here must abort before the row goes.
async fn remove_file(
    tx: &mut dyn StoreTx,
    storage: &dyn ObjectStorage,
    file: &StoredFile,
) -> Result<u64, AppError> {
    storage.delete(&file.key).await?;
    tx.delete_file(file.id).await
}
