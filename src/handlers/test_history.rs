// src/handlers/test_history.rs

use std::collections::HashMap;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::question_set::{fetch_set, load_questions},
    models::test_history::{SubmitTestRequest, TestHistory, TestHistoryResponse, UserAnswerRow, grade},
    utils::jwt::Claims,
};

/// Records a finished test.
///
/// Answers are graded server-side against the stored correct answers; the
/// client never reports its own score.
pub async fn submit_test(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SubmitTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user_id = claims.user_id()?;

    let set = fetch_set(&pool, payload.set_id).await?;
    if !set.is_visible_to(user_id) {
        return Err(AppError::Forbidden(
            "You are not allowed to take this test".to_string(),
        ));
    }

    let questions = load_questions(&pool, set.id).await?;
    if questions.is_empty() {
        return Err(AppError::BadRequest("Question set has no questions".to_string()));
    }

    let results = grade(&questions, &payload.answers);
    let sum_correct = results.iter().filter(|r| r.is_correct).count() as i32;

    let mut tx = pool.begin().await?;

    let record = sqlx::query_as::<_, TestHistory>(
        r#"
        INSERT INTO test_history (user_id, set_id, set_name, total_questions, sum_correct, time_spent)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, user_id, set_id, set_name, total_questions, sum_correct, time_spent, completed_at
        "#,
    )
    .bind(user_id)
    .bind(set.id)
    .bind(&set.set_name)
    .bind(results.len() as i32)
    .bind(sum_correct)
    .bind(payload.time_spent)
    .fetch_one(&mut *tx)
    .await?;

    for result in &results {
        sqlx::query(
            "INSERT INTO user_answers (test_id, question_id, answer_id, is_correct) VALUES ($1, $2, $3, $4)",
        )
        .bind(record.id)
        .bind(result.question_id)
        .bind(result.answer_id)
        .bind(result.is_correct)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await.map_err(|e| {
        tracing::error!("Failed to save test result: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tracing::info!(test_id = record.id, user_id, set_id = set.id, sum_correct, "Test submitted");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "test": record,
            "total_questions": results.len(),
            "answers": results,
        })),
    ))
}

/// Lists the caller's test attempts, newest first, with per-question results.
/// Attempts at deleted sets are still listed, with `set_id` null.
pub async fn list_test_history(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let entries = sqlx::query_as::<_, TestHistory>(
        r#"
        SELECT id, user_id, set_id, set_name, total_questions, sum_correct, time_spent, completed_at
        FROM test_history
        WHERE user_id = $1
        ORDER BY completed_at DESC, id DESC
        "#,
    )
    .bind(claims.user_id()?)
    .fetch_all(&pool)
    .await?;

    let test_ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
    let rows = sqlx::query_as::<_, UserAnswerRow>(
        r#"
        SELECT test_id, question_id, answer_id, is_correct
        FROM user_answers
        WHERE test_id = ANY($1)
        ORDER BY id
        "#,
    )
    .bind(&test_ids[..])
    .fetch_all(&pool)
    .await?;

    let mut by_test: HashMap<i64, Vec<UserAnswerRow>> = HashMap::new();
    for row in rows {
        by_test.entry(row.test_id).or_default().push(row);
    }

    let history: Vec<TestHistoryResponse> = entries
        .into_iter()
        .map(|entry| TestHistoryResponse {
            answers: by_test.remove(&entry.id).unwrap_or_default(),
            entry,
        })
        .collect();

    Ok(Json(json!({ "history": history })))
}
