// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use prism_backend::{
    models::{
        pilot::{EnrollStatus, NewPilot, Pilot},
        quiz::{
            AnswerSubmission, CreateQuizRequest, OptionInput, QuestionInput, QuestionType, QuizBundle,
            QuizSettingsInput,
        },
        user::{NewUser, ROLE_LEARNER, ROLE_OWNER, User},
    },
    services::notifier::Notifier,
    store::{MemoryStore, PortalStore},
    utils::{email::MemoryMailer, storage::MemoryStorage},
};

/// In-memory collaborators plus one owner, one learner and one pilot.
pub struct Fixture {
    pub store: MemoryStore,
    pub storage: MemoryStorage,
    pub mailer: MemoryMailer,
    pub notifier: Notifier,
    pub owner: User,
    pub learner: User,
    pub pilot: Pilot,
}

pub async fn fixture() -> Fixture {
    let store = MemoryStore::new();
    let mailer = MemoryMailer::new();
    let owner = add_user(&store, "owner@example.com", ROLE_OWNER).await;
    let learner = add_user(&store, "learner@example.com", ROLE_LEARNER).await;
    let pilot = add_pilot(&store, owner.id, "Flight Basics").await;

    Fixture {
        store,
        storage: MemoryStorage::new(),
        notifier: Notifier::new(Arc::new(mailer.clone())),
        mailer,
        owner,
        learner,
        pilot,
    }
}

pub async fn add_user(store: &MemoryStore, email: &str, role: &str) -> User {
    store
        .insert_user(NewUser {
            email: email.to_string(),
            name: email.split('@').next().unwrap_or(email).to_string(),
            password: "not-a-real-hash".to_string(),
            role: role.to_string(),
        })
        .await
        .unwrap()
}

pub async fn add_pilot(store: &MemoryStore, owner_id: i64, title: &str) -> Pilot {
    store
        .insert_pilot(NewPilot {
            owner_id,
            title: title.to_string(),
            description: None,
        })
        .await
        .unwrap()
}

pub async fn approve(store: &MemoryStore, pilot_id: i64, user_id: i64) {
    let enrollment = store.request_enrollment(pilot_id, user_id).await.unwrap();
    store
        .set_enrollment_status(enrollment.id, EnrollStatus::Approved)
        .await
        .unwrap();
}

fn single(text: &str, points: i32) -> QuestionInput {
    QuestionInput {
        text: text.to_string(),
        question_type: QuestionType::Single,
        points,
        answer_required: true,
        randomize: false,
        options: vec![
            OptionInput {
                text: "right".to_string(),
                is_correct: true,
            },
            OptionInput {
                text: "wrong".to_string(),
                is_correct: false,
            },
        ],
    }
}

/// Single-choice questions worth `points` each; the first option is the correct one.
pub fn quiz_request(points: &[i32], passing_grade: i32) -> CreateQuizRequest {
    CreateQuizRequest {
        title: "Checkride".to_string(),
        summary: None,
        set_as_exam: true,
        settings: QuizSettingsInput {
            time_limit: 30,
            passing_grade,
            attempts_allowed: None,
            question_order: "fixed".to_string(),
            show_feedback: true,
            show_correct_answers: false,
        },
        questions: points
            .iter()
            .enumerate()
            .map(|(i, p)| single(&format!("Question {}", i + 1), *p))
            .collect(),
    }
}

/// A quiz with one multiple-choice question: options A..D, A and C correct.
pub fn multiple_choice_request() -> CreateQuizRequest {
    let mut request = quiz_request(&[], 100);
    request.questions.push(QuestionInput {
        text: "Which instruments are required?".to_string(),
        question_type: QuestionType::Multiple,
        points: 10,
        answer_required: true,
        randomize: false,
        options: ["A", "B", "C", "D"]
            .iter()
            .map(|label| OptionInput {
                text: label.to_string(),
                is_correct: *label == "A" || *label == "C",
            })
            .collect(),
    });
    request
}

/// One answer per question: the correct option where `correct[i]`, a wrong one otherwise.
pub fn answers(bundle: &QuizBundle, correct: &[bool]) -> Vec<AnswerSubmission> {
    bundle
        .questions
        .iter()
        .zip(correct)
        .map(|(q, right)| AnswerSubmission {
            question_id: q.question.id,
            selected_option_ids: q
                .options
                .iter()
                .filter(|o| o.is_correct == *right)
                .map(|o| o.id)
                .take(1)
                .collect(),
        })
        .collect()
}

/// Option ids of the only question of `bundle`, in authoring order.
pub fn option_ids(bundle: &QuizBundle) -> Vec<i64> {
    bundle.questions[0].options.iter().map(|o| o.id).collect()
}
