// src/services/grading.rs

use std::collections::{BTreeSet, HashMap};

use crate::{
    error::AppError,
    models::quiz::{AnswerSubmission, GradedAnswer, QuizBundle, QuizOption},
};

/// Outcome of grading one submission against a quiz's answer key.
#[derive(Debug, Clone)]
pub struct GradeReport {
    pub answers: Vec<GradedAnswer>,
    pub correct_questions: usize,
    pub total_questions: usize,
    pub earned_points: i64,
    pub total_points: i64,
    pub score: i32,
}

/// A question is correct iff the selected set equals the correct set exactly.
/// Order and duplicate ids in the selection do not matter; there is no partial credit.
pub fn is_correct(selected: &[i64], options: &[QuizOption]) -> bool {
    let selected: BTreeSet<i64> = selected.iter().copied().collect();
    let expected: BTreeSet<i64> = options.iter().filter(|o| o.is_correct).map(|o| o.id).collect();
    selected == expected
}

/// `round(100 * earned / total)`, halves rounded up. A quiz worth zero points scores 0.
pub fn score_percent(earned: i64, total: i64) -> i32 {
    if total <= 0 {
        return 0;
    }
    ((200 * earned + total) / (2 * total)) as i32
}

pub fn feedback(passed: bool, score: i32, passing_grade: i32) -> String {
    if passed {
        format!("Congratulations! You passed with a score of {}%.", score)
    } else {
        format!(
            "You scored {}%, below the passing grade of {}%. Review the lessons and try again.",
            score, passing_grade
        )
    }
}

/// Grades `submissions` against `bundle`.
///
/// Unanswered questions count as incorrect. Answers naming a question outside
/// the quiz, an option outside its question, or the same question twice are rejected.
pub fn grade(bundle: &QuizBundle, submissions: &[AnswerSubmission]) -> Result<GradeReport, AppError> {
    let by_id: HashMap<i64, &[QuizOption]> = bundle
        .questions
        .iter()
        .map(|q| (q.question.id, q.options.as_slice()))
        .collect();

    let mut correct_ids = BTreeSet::new();
    let mut seen = BTreeSet::new();
    let mut answers = Vec::with_capacity(submissions.len());

    for submission in submissions {
        let options = by_id.get(&submission.question_id).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Question {} does not belong to this quiz",
                submission.question_id
            ))
        })?;

        if !seen.insert(submission.question_id) {
            return Err(AppError::BadRequest(format!(
                "Question {} was answered more than once",
                submission.question_id
            )));
        }

        if let Some(stray) = submission
            .selected_option_ids
            .iter()
            .find(|id| !options.iter().any(|o| o.id == **id))
        {
            return Err(AppError::BadRequest(format!(
                "Option {} does not belong to question {}",
                stray, submission.question_id
            )));
        }

        let correct = is_correct(&submission.selected_option_ids, options);
        if correct {
            correct_ids.insert(submission.question_id);
        }

        let mut selected = submission.selected_option_ids.clone();
        selected.sort_unstable();
        selected.dedup();
        answers.push(GradedAnswer {
            question_id: submission.question_id,
            selected_option_ids: selected,
            correct,
        });
    }

    let total_points: i64 = bundle.questions.iter().map(|q| q.question.points as i64).sum();
    let earned_points: i64 = bundle
        .questions
        .iter()
        .filter(|q| correct_ids.contains(&q.question.id))
        .map(|q| q.question.points as i64)
        .sum();

    Ok(GradeReport {
        answers,
        correct_questions: correct_ids.len(),
        total_questions: bundle.questions.len(),
        earned_points,
        total_points,
        score: score_percent(earned_points, total_points),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::{Question, QuestionType, QuestionWithOptions, QuizInfo};

    fn option(id: i64, question_id: i64, is_correct: bool) -> QuizOption {
        QuizOption {
            id,
            question_id,
            position: 0,
            text: format!("option {}", id),
            is_correct,
        }
    }

    fn question(id: i64, points: i32, question_type: QuestionType, options: Vec<QuizOption>) -> QuestionWithOptions {
        QuestionWithOptions {
            question: Question {
                id,
                quiz_info_id: 1,
                position: id as i32,
                text: format!("question {}", id),
                question_type,
                points,
                answer_required: true,
                randomize: false,
            },
            options,
        }
    }

    fn bundle(questions: Vec<QuestionWithOptions>) -> QuizBundle {
        QuizBundle {
            info: QuizInfo {
                id: 1,
                pilot_id: 1,
                title: "Quiz".to_string(),
                summary: None,
                set_as_exam: false,
                created_at: None,
            },
            settings: None,
            questions,
        }
    }

    /// Four single-choice questions worth 10/20/30/40; option `q*10+1` is correct.
    fn weighted_quiz() -> QuizBundle {
        bundle(
            [(1, 10), (2, 20), (3, 30), (4, 40)]
                .into_iter()
                .map(|(id, points)| {
                    question(
                        id,
                        points,
                        QuestionType::Single,
                        vec![option(id * 10 + 1, id, true), option(id * 10 + 2, id, false)],
                    )
                })
                .collect(),
        )
    }

    fn answer(question_id: i64, selected: &[i64]) -> AnswerSubmission {
        AnswerSubmission {
            question_id,
            selected_option_ids: selected.to_vec(),
        }
    }

    #[test]
    fn test_weighted_score() {
        let report = grade(
            &weighted_quiz(),
            &[
                answer(1, &[12]),
                answer(2, &[21]),
                answer(3, &[32]),
                answer(4, &[41]),
            ],
        )
        .unwrap();

        assert_eq!(report.earned_points, 60);
        assert_eq!(report.total_points, 100);
        assert_eq!(report.score, 60);
        assert_eq!(report.correct_questions, 2);
    }

    #[test]
    fn test_exact_set_matching() {
        let options = vec![option(1, 9, true), option(2, 9, false), option(3, 9, true), option(4, 9, false)];
        assert!(!is_correct(&[1], &options));
        assert!(!is_correct(&[1, 3, 4], &options));
        assert!(is_correct(&[1, 3], &options));
        assert!(is_correct(&[3, 1, 3], &options));
        assert!(!is_correct(&[], &options));
    }

    #[test]
    fn test_score_rounding() {
        assert_eq!(score_percent(1, 3), 33);
        assert_eq!(score_percent(2, 3), 67);
        assert_eq!(score_percent(1, 8), 13); // 12.5 rounds up
        assert_eq!(score_percent(0, 0), 0);
    }

    #[test]
    fn test_unanswered_questions_score_zero() {
        let report = grade(&weighted_quiz(), &[answer(4, &[41])]).unwrap();
        assert_eq!(report.score, 40);
        assert_eq!(report.answers.len(), 1);
    }

    #[test]
    fn test_foreign_question_rejected() {
        let err = grade(&weighted_quiz(), &[answer(99, &[1])]).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_foreign_option_rejected() {
        let err = grade(&weighted_quiz(), &[answer(1, &[21])]).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_duplicate_answer_rejected() {
        let err = grade(&weighted_quiz(), &[answer(1, &[11]), answer(1, &[12])]).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_empty_quiz_scores_zero() {
        let report = grade(&bundle(vec![]), &[]).unwrap();
        assert_eq!(report.score, 0);
        assert_eq!(report.total_points, 0);
    }
}
