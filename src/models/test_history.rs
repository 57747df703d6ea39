// src/models/test_history.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::question::StoredQuestion;

/// Represents the 'test_history' table in the database.
/// One row per completed attempt at a question set. `set_id` is cleared when
/// the set is deleted; the copied name and size remain.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TestHistory {
    pub id: i64,
    pub user_id: i64,
    pub set_id: Option<i64>,
    pub set_name: String,
    pub total_questions: i32,
    pub sum_correct: i32,
    /// Seconds.
    pub time_spent: i32,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    /// `None` when the question was skipped.
    pub answer_id: Option<i64>,
}

/// DTO for submitting a finished test.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitTestRequest {
    pub set_id: i64,
    #[validate(range(min = 0, message = "Time spent cannot be negative."))]
    pub time_spent: i32,
    pub answers: Vec<SubmittedAnswer>,
}

/// Per-question outcome, as stored in 'user_answers'.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerResult {
    pub question_id: i64,
    pub answer_id: Option<i64>,
    pub is_correct: bool,
}

/// A stored 'user_answers' row. `question_id` is cleared when the question's
/// set is deleted.
#[derive(Debug, Serialize, FromRow)]
pub struct UserAnswerRow {
    #[serde(skip_serializing)]
    pub test_id: i64,
    pub question_id: Option<i64>,
    pub answer_id: Option<i64>,
    pub is_correct: bool,
}

#[derive(Debug, Serialize)]
pub struct TestHistoryResponse {
    #[serde(flatten)]
    pub entry: TestHistory,
    pub answers: Vec<UserAnswerRow>,
}

/// Grades a submission against the set's questions.
///
/// Every question of the set gets a result, in set order. Unanswered
/// questions count as wrong. Answers for questions outside the set are
/// ignored; if a question is answered twice the last answer wins. An answer
/// id that is not one of the question's own answers is recorded as skipped.
pub fn grade(questions: &[StoredQuestion], submitted: &[SubmittedAnswer]) -> Vec<AnswerResult> {
    let chosen: HashMap<i64, Option<i64>> = submitted
        .iter()
        .map(|a| (a.question_id, a.answer_id))
        .collect();

    questions
        .iter()
        .filter_map(|q| {
            let question_id = q.id?;
            let answer_id = chosen
                .get(&question_id)
                .copied()
                .flatten()
                .filter(|id| q.answers.iter().any(|a| a.id == Some(*id)));
            let is_correct = answer_id.is_some() && answer_id == q.correct_answer_id();
            Some(AnswerResult {
                question_id,
                answer_id,
                is_correct,
            })
        })
        .collect()
}
