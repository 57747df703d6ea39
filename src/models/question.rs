// src/models/question.rs

use serde::Serialize;
use sqlx::FromRow;

use crate::{
    error::AppError,
    pipeline::{GeneratedQuestion, QuestionOption},
};

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: i64,
    pub set_id: i64,
    pub position: i32,
    pub question_text: String,
    pub correct_answer_id: Option<i64>,
}

/// Represents the 'answers' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct AnswerRow {
    pub id: i64,
    pub question_id: i64,
    pub position: i32,
    pub answer_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAnswer {
    /// `None` until the answer has been inserted.
    pub id: Option<i64>,
    pub answer_text: String,
}

/// A question in its persisted shape: ordered answers plus a reference to the
/// correct one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredQuestion {
    pub id: Option<i64>,
    pub question_text: String,
    pub answers: Vec<StoredAnswer>,
    /// Index into `answers`.
    pub correct: usize,
}

impl StoredQuestion {
    /// Converts a question into its storable shape.
    ///
    /// Requires at least two options and exactly one marked correct, which is
    /// what the validator guarantees for generated output. Client-supplied
    /// questions are checked here as well.
    pub fn from_generated(question: &GeneratedQuestion, index: usize) -> Result<Self, AppError> {
        if question.question.trim().is_empty() {
            return Err(AppError::BadRequest(format!(
                "Question {} has no text",
                index + 1
            )));
        }
        if question.options.len() < 2 {
            return Err(AppError::BadRequest(format!(
                "Question {} needs at least 2 options",
                index + 1
            )));
        }

        let correct: Vec<usize> = question
            .options
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_correct)
            .map(|(i, _)| i)
            .collect();

        let [correct] = correct[..] else {
            return Err(AppError::BadRequest(format!(
                "Question {} must have exactly 1 correct option, found {}",
                index + 1,
                correct.len()
            )));
        };

        Ok(Self {
            id: None,
            question_text: question.question.clone(),
            answers: question
                .options
                .iter()
                .map(|o| StoredAnswer {
                    id: None,
                    answer_text: o.text.clone(),
                })
                .collect(),
            correct,
        })
    }

    /// Rebuilds a question from its row and its answer rows.
    ///
    /// Answers are ordered by `position`; the correct answer must be one of
    /// them.
    pub fn from_rows(question: QuestionRow, mut answers: Vec<AnswerRow>) -> Result<Self, AppError> {
        answers.sort_by_key(|a| a.position);

        let correct = question
            .correct_answer_id
            .and_then(|id| answers.iter().position(|a| a.id == id))
            .ok_or_else(|| {
                AppError::InternalServerError(format!(
                    "Question {} has no valid correct answer reference",
                    question.id
                ))
            })?;

        Ok(Self {
            id: Some(question.id),
            question_text: question.question_text,
            answers: answers
                .into_iter()
                .map(|a| StoredAnswer {
                    id: Some(a.id),
                    answer_text: a.answer_text,
                })
                .collect(),
            correct,
        })
    }

    pub fn correct_answer_id(&self) -> Option<i64> {
        self.answers.get(self.correct).and_then(|a| a.id)
    }

    pub fn into_generated(self) -> GeneratedQuestion {
        let correct = self.correct;
        GeneratedQuestion {
            question: self.question_text,
            options: self
                .answers
                .into_iter()
                .enumerate()
                .map(|(i, a)| QuestionOption {
                    text: a.answer_text,
                    is_correct: i == correct,
                })
                .collect(),
        }
    }
}

/// DTO for returning a stored question to the client.
#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub id: Option<i64>,
    pub question_text: String,
    pub answers: Vec<StoredAnswer>,
    pub correct_answer_id: Option<i64>,
}

impl From<StoredQuestion> for QuestionResponse {
    fn from(question: StoredQuestion) -> Self {
        Self {
            correct_answer_id: question.correct_answer_id(),
            id: question.id,
            question_text: question.question_text,
            answers: question.answers,
        }
    }
}
