// src/pipeline/mod.rs

//! Question-generation pipeline.
//!
//! Extractor -> request builder -> LLM client -> sanitizer -> validator.
//! Extraction and the LLM call do I/O; the other stages are pure functions.

pub mod extractor;
pub mod llm_client;
pub mod orchestrator;
pub mod request_builder;
pub mod sanitizer;
pub mod validator;

mod types;

pub use extractor::{DocumentFormat, ExtractedDocument, ExtractionError, extract_document, extract_text};
pub use llm_client::{GenerationError, LlmClient, MistralClient};
pub use orchestrator::{PipelineError, QuestionGenerator};
pub use request_builder::{GenerationRequest, ModelParameters, build_request};
pub use sanitizer::sanitize;
pub use types::{Diagnostic, GeneratedQuestion, GeneratedQuestionSet, QuestionOption, Validated};
pub use validator::{ValidationError, validate};
