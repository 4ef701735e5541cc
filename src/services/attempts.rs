// src/services/attempts.rs

use crate::{
    error::AppError,
    models::quiz::{AnswerSubmission, AttemptOutcome, AttemptSummary, NewAttempt},
    services::grading,
    store::PortalStore,
};

/// Grades a submission and persists attempt, answers and result in one transaction.
///
/// Every call creates a new attempt; resubmitting identical answers is not deduplicated.
pub async fn create_attempt(
    store: &dyn PortalStore,
    quiz_info_id: i64,
    user_id: i64,
    answers: &[AnswerSubmission],
) -> Result<AttemptOutcome, AppError> {
    let bundle = store
        .load_quiz(quiz_info_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    let settings = bundle
        .settings
        .as_ref()
        .ok_or(AppError::NotFound("Quiz settings not found".to_string()))?;

    let report = grading::grade(&bundle, answers)?;
    if report.total_points == 0 {
        tracing::warn!(quiz_info_id, "grading a quiz with no points; scoring 0");
    }

    let passed = report.total_points > 0 && report.score >= settings.passing_grade;
    let feedback = grading::feedback(passed, report.score, settings.passing_grade);

    let attempt = NewAttempt {
        user_id,
        quiz_info_id,
        answers: report.answers,
        score: report.score,
        passed,
        feedback,
    };

    let mut tx = store.begin().await?;
    if let Some(limit) = settings.attempts_allowed {
        let used = tx.count_attempts(user_id, quiz_info_id).await?;
        if used >= limit as i64 {
            return Err(AppError::Conflict(format!(
                "Attempt limit reached ({} of {})",
                used, limit
            )));
        }
    }
    let result = tx.insert_attempt(&attempt).await?;
    tx.commit().await?;

    tracing::info!(
        quiz_info_id,
        user_id,
        attempt_id = result.attempt_id,
        score = result.score,
        passed = result.passed,
        "quiz attempt recorded"
    );

    Ok(AttemptOutcome {
        attempt_id: result.attempt_id,
        score: result.score,
        passed: result.passed,
        feedback: result.feedback,
        correct_questions: report.correct_questions,
        total_questions: report.total_questions,
    })
}

/// Latest attempt's result for this user and quiz, if any. Read-only.
pub async fn check_attempt(
    store: &dyn PortalStore,
    user_id: i64,
    quiz_info_id: i64,
) -> Result<Option<AttemptSummary>, AppError> {
    store.latest_attempt(user_id, quiz_info_id).await
}
