// tests/attempt_tests.rs

mod common;

use common::{answers, fixture, multiple_choice_request, option_ids, quiz_request};
use prism_backend::{
    error::AppError,
    models::quiz::AnswerSubmission,
    services::attempts::{check_attempt, create_attempt},
    store::PortalStore,
};

#[tokio::test]
async fn test_weighted_score() {
    let fx = fixture().await;
    let quiz = fx
        .store
        .create_quiz(fx.pilot.id, &quiz_request(&[10, 20, 30, 40], 60))
        .await
        .unwrap();

    // Only the 20- and 40-point questions are right.
    let outcome = create_attempt(
        &fx.store,
        quiz.info.id,
        fx.learner.id,
        &answers(&quiz, &[false, true, false, true]),
    )
    .await
    .unwrap();

    assert_eq!(outcome.score, 60);
    assert!(outcome.passed);
    assert_eq!(outcome.correct_questions, 2);
    assert_eq!(outcome.total_questions, 4);
}

#[tokio::test]
async fn test_pass_boundary() {
    let fx = fixture().await;

    let at_sixty = fx
        .store
        .create_quiz(fx.pilot.id, &quiz_request(&[60, 40], 60))
        .await
        .unwrap();
    let outcome = create_attempt(&fx.store, at_sixty.info.id, fx.learner.id, &answers(&at_sixty, &[true, false]))
        .await
        .unwrap();
    assert_eq!(outcome.score, 60);
    assert!(outcome.passed);

    let at_fifty_nine = fx
        .store
        .create_quiz(fx.pilot.id, &quiz_request(&[59, 41], 60))
        .await
        .unwrap();
    let outcome = create_attempt(
        &fx.store,
        at_fifty_nine.info.id,
        fx.learner.id,
        &answers(&at_fifty_nine, &[true, false]),
    )
    .await
    .unwrap();
    assert_eq!(outcome.score, 59);
    assert!(!outcome.passed);
    assert!(outcome.feedback.contains("59%"));
}

#[tokio::test]
async fn test_exact_set_matching() {
    let fx = fixture().await;
    let quiz = fx
        .store
        .create_quiz(fx.pilot.id, &multiple_choice_request())
        .await
        .unwrap();
    let ids = option_ids(&quiz);
    let (a, c, d) = (ids[0], ids[2], ids[3]);
    let question_id = quiz.questions[0].question.id;

    let submit = |selected: Vec<i64>| {
        vec![AnswerSubmission {
            question_id,
            selected_option_ids: selected,
        }]
    };

    let only_a = create_attempt(&fx.store, quiz.info.id, fx.learner.id, &submit(vec![a]))
        .await
        .unwrap();
    assert_eq!(only_a.score, 0);

    let too_many = create_attempt(&fx.store, quiz.info.id, fx.learner.id, &submit(vec![a, c, d]))
        .await
        .unwrap();
    assert_eq!(too_many.score, 0);

    let exact = create_attempt(&fx.store, quiz.info.id, fx.learner.id, &submit(vec![c, a]))
        .await
        .unwrap();
    assert_eq!(exact.score, 100);
    assert!(exact.passed);
}

#[tokio::test]
async fn test_resubmission_creates_new_attempt() {
    let fx = fixture().await;
    let quiz = fx
        .store
        .create_quiz(fx.pilot.id, &quiz_request(&[10, 10], 50))
        .await
        .unwrap();
    let submission = answers(&quiz, &[true, true]);

    let first = create_attempt(&fx.store, quiz.info.id, fx.learner.id, &submission)
        .await
        .unwrap();
    let second = create_attempt(&fx.store, quiz.info.id, fx.learner.id, &submission)
        .await
        .unwrap();

    assert_ne!(first.attempt_id, second.attempt_id);
    assert_eq!(fx.store.attempts_for(fx.learner.id, quiz.info.id).await.len(), 2);

    let counts = fx.store.row_counts().await;
    assert_eq!(counts.attempts, 2);
    assert_eq!(counts.results, 2);
    assert_eq!(counts.user_answers, 4);
    assert_eq!(fx.store.answers_for(first.attempt_id).await.len(), 2);
}

#[tokio::test]
async fn test_check_attempt_returns_latest() {
    let fx = fixture().await;
    let quiz = fx
        .store
        .create_quiz(fx.pilot.id, &quiz_request(&[10, 10], 50))
        .await
        .unwrap();

    assert!(check_attempt(&fx.store, fx.learner.id, quiz.info.id).await.unwrap().is_none());

    create_attempt(&fx.store, quiz.info.id, fx.learner.id, &answers(&quiz, &[false, false]))
        .await
        .unwrap();
    let latest = create_attempt(&fx.store, quiz.info.id, fx.learner.id, &answers(&quiz, &[true, false]))
        .await
        .unwrap();

    let summary = check_attempt(&fx.store, fx.learner.id, quiz.info.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.attempt_id, latest.attempt_id);
    assert_eq!(summary.score, 50);
    assert!(summary.passed);
}

#[tokio::test]
async fn test_attempt_limit_enforced() {
    let fx = fixture().await;
    let mut request = quiz_request(&[10], 50);
    request.settings.attempts_allowed = Some(1);
    let quiz = fx.store.create_quiz(fx.pilot.id, &request).await.unwrap();

    create_attempt(&fx.store, quiz.info.id, fx.learner.id, &answers(&quiz, &[false]))
        .await
        .unwrap();
    let err = create_attempt(&fx.store, quiz.info.id, fx.learner.id, &answers(&quiz, &[true]))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(fx.store.row_counts().await.attempts, 1);
}

#[tokio::test]
async fn test_attempt_limit_holds_under_concurrent_submissions() {
    let fx = fixture().await;
    let mut request = quiz_request(&[10], 50);
    request.settings.attempts_allowed = Some(1);
    let quiz = fx.store.create_quiz(fx.pilot.id, &request).await.unwrap();
    let submission = answers(&quiz, &[true]);

    let (first, second) = tokio::join!(
        create_attempt(&fx.store, quiz.info.id, fx.learner.id, &submission),
        create_attempt(&fx.store, quiz.info.id, fx.learner.id, &submission),
    );

    assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert_eq!(fx.store.row_counts().await.attempts, 1);
}

#[tokio::test]
async fn test_zero_point_quiz_scores_zero() {
    let fx = fixture().await;
    let quiz = fx
        .store
        .create_quiz(fx.pilot.id, &quiz_request(&[], 0))
        .await
        .unwrap();

    let outcome = create_attempt(&fx.store, quiz.info.id, fx.learner.id, &[])
        .await
        .unwrap();
    assert_eq!(outcome.score, 0);
    assert!(!outcome.passed);
}

#[tokio::test]
async fn test_unknown_quiz_not_found() {
    let fx = fixture().await;
    let err = create_attempt(&fx.store, 9_999, fx.learner.id, &[]).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_foreign_question_writes_nothing() {
    let fx = fixture().await;
    let quiz = fx
        .store
        .create_quiz(fx.pilot.id, &quiz_request(&[10], 50))
        .await
        .unwrap();
    let other = fx
        .store
        .create_quiz(fx.pilot.id, &quiz_request(&[10], 50))
        .await
        .unwrap();

    let err = create_attempt(&fx.store, quiz.info.id, fx.learner.id, &answers(&other, &[true]))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
    let counts = fx.store.row_counts().await;
    assert_eq!((counts.attempts, counts.user_answers, counts.results), (0, 0, 0));
}
