// src/handlers/generation.rs

use std::{io::Write, num::NonZeroU32, path::Path, sync::Arc};

use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Query, State},
    http::header,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{
    config::Config,
    error::AppError,
    pipeline::{GeneratedQuestion, QuestionGenerator},
    utils::pdf::PdfRenderer,
};

#[derive(Debug, Deserialize)]
pub struct GenerateParams {
    pub num_questions: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub questions: Vec<GeneratedQuestion>,
    /// Human-readable diagnostics (count mismatches, repaired answers).
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PdfRequest {
    pub questions: Vec<GeneratedQuestion>,
}

struct Upload {
    file_name: String,
    data: Bytes,
}

/// Generates questions from an uploaded PDF, DOCX or PPTX file.
///
/// Expects a multipart form with a `file` field. The upload is written to a
/// temporary file that lives until the pipeline returns.
pub async fn generate_questions(
    State(config): State<Config>,
    State(generator): State<Arc<QuestionGenerator>>,
    Query(params): Query<GenerateParams>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let count = requested_count(params.num_questions, &config)?;
    let upload = read_upload(multipart).await?;

    tracing::info!(
        file_name = %upload.file_name,
        size = upload.data.len(),
        count = count.get(),
        "Received document for question generation"
    );

    let temp_file = persist_upload(upload).await?;
    let set = generator
        .generate_from_document(temp_file.path().to_path_buf(), count)
        .await?;
    drop(temp_file);

    Ok(Json(GenerateResponse {
        warnings: set.diagnostics.iter().map(ToString::to_string).collect(),
        questions: set.questions,
    }))
}

/// Renders the given questions as a downloadable PDF.
///
/// Text the export font cannot show is a 400 listing the offending characters.
pub async fn generate_pdf(
    State(renderer): State<Arc<PdfRenderer>>,
    Json(payload): Json<PdfRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.questions.is_empty() {
        return Err(AppError::BadRequest("No questions to export".to_string()));
    }

    let pdf = renderer.render(&payload.questions)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=exam_questions.pdf",
            ),
        ],
        pdf,
    ))
}

fn requested_count(requested: Option<u32>, config: &Config) -> Result<NonZeroU32, AppError> {
    let Some(n) = requested else {
        return Ok(config.default_question_count);
    };

    NonZeroU32::new(n)
        .filter(|n| *n <= config.max_question_count)
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "num_questions must be between 1 and {}",
                config.max_question_count
            ))
        })
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("Uploaded file has no name".to_string()))?;
        let data = field.bytes().await?;
        if data.is_empty() {
            return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
        }
        return Ok(Upload { file_name, data });
    }

    Err(AppError::BadRequest("Missing 'file' field".to_string()))
}

/// Writes the upload to a temporary file keeping its extension, which is
/// what the extractor dispatches on.
async fn persist_upload(upload: Upload) -> Result<NamedTempFile, AppError> {
    let suffix = Path::new(&upload.file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(&upload.data)?;
        file.flush()?;
        Ok(file)
    })
    .await
    .map_err(|e| AppError::InternalServerError(format!("upload task failed: {e}")))?
    .map_err(|e| AppError::InternalServerError(format!("failed to store upload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/test".to_string()),
            "JWT_SECRET" | "LLM_API_KEY" => Some("x".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_requested_count_bounds() {
        let config = config();

        assert_eq!(requested_count(None, &config).unwrap().get(), 10);
        assert_eq!(requested_count(Some(1), &config).unwrap().get(), 1);
        assert_eq!(requested_count(Some(50), &config).unwrap().get(), 50);
        assert!(requested_count(Some(0), &config).is_err());
        assert!(requested_count(Some(51), &config).is_err());
    }

    #[tokio::test]
    async fn test_persisted_upload_keeps_extension() {
        let file = persist_upload(Upload {
            file_name: "Lecture 3.PPTX".to_string(),
            data: Bytes::from_static(b"data"),
        })
        .await
        .unwrap();

        assert!(file.path().to_string_lossy().ends_with(".PPTX"));
        assert_eq!(std::fs::read(file.path()).unwrap(), b"data");
    }
}
