// src/pipeline/request_builder.rs

use std::num::NonZeroU32;

use serde::Serialize;
use serde_json::{Value, json};

pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4000;
pub const OPTIONS_PER_QUESTION: usize = 4;

const SYSTEM_PROMPT: &str = "You are an expert exam question generator for IT and computer science topics. You MUST output valid JSON only.";

/// Output format hint passed to the model endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    JsonObject,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelParameters {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub response_format: ResponseFormat,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            response_format: ResponseFormat::JsonObject,
        }
    }
}

/// A fully-formed generation request. Built fresh per call, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub prompt_text: String,
    pub requested_count: NonZeroU32,
    pub model_parameters: ModelParameters,
}

impl GenerationRequest {
    /// Renders the chat-completions request body for `model`.
    pub fn to_chat_completion(&self, model: &str) -> Value {
        let response_format = match self.model_parameters.response_format {
            ResponseFormat::JsonObject => json!({ "type": "json_object" }),
        };

        json!({
            "model": model,
            "messages": [
                { "role": "system", "content": self.system_prompt },
                { "role": "user", "content": self.prompt_text },
            ],
            "max_tokens": self.model_parameters.max_output_tokens,
            "temperature": self.model_parameters.temperature,
            "response_format": response_format,
        })
    }
}

/// Builds the prompt asking for `requested_count` questions about `text`.
///
/// The count is stated twice on purpose; models drift from a number they
/// only see once.
pub fn build_request(text: &str, requested_count: NonZeroU32) -> GenerationRequest {
    let count = requested_count.get();

    let prompt_text = format!(
        r#"Generate EXACTLY {count} multiple-choice exam questions for an IT course.

Return your response in this EXACT JSON format:
{{
    "questions": [
        {{
            "question": "Precise technical question about IT topic",
            "options": [
                {{"text": "Option A", "is_correct": false}},
                {{"text": "Option B", "is_correct": false}},
                {{"text": "Option C", "is_correct": true}},
                {{"text": "Option D", "is_correct": false}}
            ]
        }}
    ]
}}

Context to consider:
{text}

IMPORTANT RULES:
1. The response MUST be a valid JSON object with a 'questions' array
2. You MUST generate EXACTLY {count} questions, no more, no less
3. Each question must have exactly {OPTIONS_PER_QUESTION} options
4. Each question must have exactly 1 correct option
5. Each question must be unique
6. Cover various aspects of the context
7. Maintain high quality and technical accuracy"#
    );

    GenerationRequest {
        system_prompt: SYSTEM_PROMPT.to_string(),
        prompt_text,
        requested_count,
        model_parameters: ModelParameters::default(),
    }
}
