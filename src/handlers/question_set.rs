// src/handlers/question_set.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        question::{AnswerRow, QuestionResponse, QuestionRow, StoredQuestion},
        question_set::{CreateQuestionSetRequest, QuestionSet, QuestionSetDetail, QuestionSetSummary},
    },
    utils::jwt::Claims,
};

/// Saves a question set with its questions and answers.
///
/// Everything is written in one transaction; a set is never stored partially.
pub async fn create_question_set(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuestionSetRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user_id = claims.user_id()?;

    let questions = payload
        .questions
        .iter()
        .enumerate()
        .map(|(index, q)| StoredQuestion::from_generated(q, index))
        .collect::<Result<Vec<_>, _>>()?;

    let mut tx = pool.begin().await?;

    let set_id: i64 = sqlx::query_scalar(
        "INSERT INTO question_sets (set_name, created_by, status) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(payload.set_name.trim())
    .bind(user_id)
    .bind(payload.status.as_str())
    .fetch_one(&mut *tx)
    .await?;

    for (position, question) in questions.iter().enumerate() {
        insert_question(&mut tx, set_id, position as i32, question).await?;
    }

    tx.commit().await?;

    tracing::info!(set_id, user_id, questions = questions.len(), "Question set saved");

    Ok((StatusCode::CREATED, Json(json!({ "id": set_id }))))
}

async fn insert_question(
    tx: &mut Transaction<'_, Postgres>,
    set_id: i64,
    position: i32,
    question: &StoredQuestion,
) -> Result<(), AppError> {
    let question_id: i64 = sqlx::query_scalar(
        "INSERT INTO questions (set_id, position, question_text) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(set_id)
    .bind(position)
    .bind(&question.question_text)
    .fetch_one(&mut **tx)
    .await?;

    let mut correct_answer_id = None;
    for (answer_position, answer) in question.answers.iter().enumerate() {
        let answer_id: i64 = sqlx::query_scalar(
            "INSERT INTO answers (question_id, position, answer_text) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(question_id)
        .bind(answer_position as i32)
        .bind(&answer.answer_text)
        .fetch_one(&mut **tx)
        .await?;

        if answer_position == question.correct {
            correct_answer_id = Some(answer_id);
        }
    }

    sqlx::query("UPDATE questions SET correct_answer_id = $1 WHERE id = $2")
        .bind(correct_answer_id)
        .bind(question_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Lists the caller's own question sets, newest first.
pub async fn list_question_sets(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let sets = sqlx::query_as::<_, QuestionSetSummary>(
        r#"
        SELECT
            s.id,
            s.set_name,
            s.status,
            COUNT(q.id) AS question_count,
            s.created_at
        FROM question_sets s
        LEFT JOIN questions q ON q.set_id = s.id
        WHERE s.created_by = $1
        GROUP BY s.id
        ORDER BY s.created_at DESC, s.id DESC
        "#,
    )
    .bind(claims.user_id()?)
    .fetch_all(&pool)
    .await?;

    Ok(Json(sets))
}

/// Returns a set with its questions, answers and correct-answer references.
/// Private sets are only visible to their owner.
pub async fn get_question_set(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let set = fetch_set(&pool, id).await?;
    if !set.is_visible_to(claims.user_id()?) {
        return Err(AppError::Forbidden(
            "You are not allowed to view this question set".to_string(),
        ));
    }

    let questions = load_questions(&pool, id)
        .await?
        .into_iter()
        .map(QuestionResponse::from)
        .collect();

    Ok(Json(QuestionSetDetail { set, questions }))
}

/// Deletes a set. Owner only; questions and answers cascade.
///
/// Test attempts by any user survive: they keep the copied set name, score
/// and per-question results, with set, question and answer ids cleared.
pub async fn delete_question_set(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let set = fetch_set(&pool, id).await?;
    if set.created_by != claims.user_id()? {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this question set".to_string(),
        ));
    }

    sqlx::query("DELETE FROM question_sets WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question set: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn fetch_set(pool: &PgPool, id: i64) -> Result<QuestionSet, AppError> {
    sqlx::query_as::<_, QuestionSet>(
        "SELECT id, set_name, created_by, status, created_at FROM question_sets WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Question set not found".to_string()))
}

/// Loads all questions of a set in order, with their answers.
pub(crate) async fn load_questions(pool: &PgPool, set_id: i64) -> Result<Vec<StoredQuestion>, AppError> {
    let rows = sqlx::query_as::<_, QuestionRow>(
        r#"
        SELECT id, set_id, position, question_text, correct_answer_id
        FROM questions
        WHERE set_id = $1
        ORDER BY position
        "#,
    )
    .bind(set_id)
    .fetch_all(pool)
    .await?;

    let question_ids: Vec<i64> = rows.iter().map(|q| q.id).collect();
    let answers = sqlx::query_as::<_, AnswerRow>(
        r#"
        SELECT id, question_id, position, answer_text
        FROM answers
        WHERE question_id = ANY($1)
        "#,
    )
    .bind(&question_ids[..])
    .fetch_all(pool)
    .await?;

    let mut by_question: HashMap<i64, Vec<AnswerRow>> = HashMap::new();
    for answer in answers {
        by_question.entry(answer.question_id).or_default().push(answer);
    }

    rows.into_iter()
        .map(|row| {
            let answers = by_question.remove(&row.id).unwrap_or_default();
            StoredQuestion::from_rows(row, answers)
        })
        .collect()
}
