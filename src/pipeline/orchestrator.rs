// src/pipeline/orchestrator.rs

use std::{num::NonZeroU32, path::PathBuf, sync::Arc, time::Duration};

use serde_json::Value;
use thiserror::Error;

use super::{
    extractor::{DocumentFormat, ExtractionError, extract_document},
    llm_client::{GenerationError, LlmClient, truncate},
    request_builder::build_request,
    sanitizer::sanitize,
    types::GeneratedQuestionSet,
    validator::{ValidationError, validate},
};

const PARSE_FAILURE_LOG_LIMIT: usize = 1000;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Runs extract -> build -> call -> sanitize -> validate for one request.
///
/// Holds only immutable collaborators, so a single instance is shared across
/// concurrent requests behind an `Arc`.
pub struct QuestionGenerator {
    client: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl QuestionGenerator {
    pub fn new(client: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Extracts `path` and generates questions from its text.
    ///
    /// The file is read on the blocking pool. Unsupported extensions fail
    /// before the model is contacted.
    #[tracing::instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn generate_from_document(
        &self,
        path: PathBuf,
        requested_count: NonZeroU32,
    ) -> Result<GeneratedQuestionSet, PipelineError> {
        let format = DocumentFormat::from_path(&path)?;

        let document = tokio::task::spawn_blocking(move || extract_document(&path))
            .await
            .map_err(|e| ExtractionError::ParseFailure {
                format,
                cause: format!("extraction task failed: {e}"),
            })??;

        tracing::info!(
            format = %document.format,
            chars = document.text.chars().count(),
            "Document text extracted"
        );

        self.generate_questions(&document.text, requested_count).await
    }

    #[tracing::instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn generate_questions(
        &self,
        text: &str,
        requested_count: NonZeroU32,
    ) -> Result<GeneratedQuestionSet, PipelineError> {
        let request = build_request(text, requested_count);

        let raw = tokio::time::timeout(self.timeout, self.client.complete(&request))
            .await
            .map_err(|_| GenerationError::UpstreamFailure {
                status: None,
                message: format!("request timed out after {}s", self.timeout.as_secs()),
            })??;

        let cleaned = sanitize(&raw);
        let parsed: Value = serde_json::from_str(&cleaned).map_err(|e| {
            tracing::error!(
                error = %e,
                content = %truncate(&cleaned, PARSE_FAILURE_LOG_LIMIT),
                "Model output is not valid JSON"
            );
            GenerationError::MalformedOutput(e.to_string())
        })?;

        let validated = validate(parsed, requested_count.get() as usize)?;

        tracing::info!(
            generated = validated.value.len(),
            diagnostics = validated.diagnostics.len(),
            "Questions generated"
        );

        Ok(GeneratedQuestionSet {
            questions: validated.value,
            requested_count: requested_count.get(),
            diagnostics: validated.diagnostics,
        })
    }
}
