// src/models/question_set.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{models::question::QuestionResponse, pipeline::GeneratedQuestion};

/// Represents the 'question_sets' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuestionSet {
    pub id: i64,
    pub set_name: String,
    pub created_by: i64,
    /// 'private' or 'public'.
    pub status: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl QuestionSet {
    /// Owners always see their sets; everyone else only public ones.
    pub fn is_visible_to(&self, user_id: i64) -> bool {
        self.created_by == user_id || self.status == SetStatus::Public.as_str()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetStatus {
    #[default]
    Private,
    Public,
}

impl SetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetStatus::Private => "private",
            SetStatus::Public => "public",
        }
    }
}

/// DTO for saving a generated question set.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionSetRequest {
    #[validate(length(min = 1, max = 255, message = "Set name must be 1 to 255 characters."))]
    pub set_name: String,
    #[serde(default)]
    pub status: SetStatus,
    #[validate(length(min = 1, message = "A question set needs at least one question."))]
    pub questions: Vec<GeneratedQuestion>,
}

/// List entry: the set plus how many questions it holds.
#[derive(Debug, Serialize, FromRow)]
pub struct QuestionSetSummary {
    pub id: i64,
    pub set_name: String,
    pub status: String,
    pub question_count: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize)]
pub struct QuestionSetDetail {
    #[serde(flatten)]
    pub set: QuestionSet,
    pub questions: Vec<QuestionResponse>,
}
