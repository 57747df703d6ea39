// src/pipeline/validator.rs

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{Diagnostic, GeneratedQuestion, QuestionOption, Validated};

pub const MIN_OPTIONS: usize = 2;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unexpected response shape: {0}")]
    BadShape(String),

    #[error("No questions generated")]
    Empty,

    #[error("Question {} is missing '{field}' field", .index + 1)]
    MissingField { field: &'static str, index: usize },

    #[error("Question {} has invalid options", .index + 1)]
    TooFewOptions { index: usize },
}

/// The two payload shapes the model is known to return.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    Bare(Vec<Value>),
    Wrapped { questions: Vec<Value> },
}

impl Payload {
    fn into_entries(self) -> Vec<Value> {
        match self {
            Payload::Bare(entries) => entries,
            Payload::Wrapped { questions } => questions,
        }
    }
}

/// Checks the parsed model output and applies the correct-option repair
/// policy.
///
/// Structural problems are errors. Count mismatches and correctness repairs
/// are returned as diagnostics alongside the questions.
#[tracing::instrument(skip_all, fields(expected_count = expected_count))]
pub fn validate(
    parsed: Value,
    expected_count: usize,
) -> Result<Validated<Vec<GeneratedQuestion>>, ValidationError> {
    let entries = serde_json::from_value::<Payload>(parsed)
        .map_err(|_| {
            ValidationError::BadShape(
                "expected an array or an object with a 'questions' array".to_string(),
            )
        })?
        .into_entries();

    if entries.is_empty() {
        return Err(ValidationError::Empty);
    }

    let mut diagnostics = Vec::new();

    if entries.len() != expected_count {
        diagnostics.push(Diagnostic::CountMismatch {
            requested: expected_count,
            generated: entries.len(),
        });
    }

    let mut questions = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let mut question = parse_entry(entry, index)?;
        if let Some(diagnostic) = enforce_single_correct(&mut question, index) {
            diagnostics.push(diagnostic);
        }
        questions.push(question);
    }

    for diagnostic in &diagnostics {
        tracing::warn!(%diagnostic, "Generated questions needed attention");
    }

    Ok(Validated {
        value: questions,
        diagnostics,
    })
}

fn parse_entry(entry: &Value, index: usize) -> Result<GeneratedQuestion, ValidationError> {
    let object = entry
        .as_object()
        .ok_or_else(|| ValidationError::BadShape(format!("question {} is not an object", index + 1)))?;

    let question = non_blank_string(object, "question")
        .ok_or(ValidationError::MissingField {
            field: "question",
            index,
        })?;

    let options = match object.get("options") {
        None | Some(Value::Null) => {
            return Err(ValidationError::MissingField {
                field: "options",
                index,
            });
        }
        Some(Value::Array(options)) if options.len() >= MIN_OPTIONS => options,
        Some(_) => return Err(ValidationError::TooFewOptions { index }),
    };

    let options = options
        .iter()
        .map(|option| parse_option(option, index))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(GeneratedQuestion { question, options })
}

fn parse_option(option: &Value, index: usize) -> Result<QuestionOption, ValidationError> {
    let missing_text = ValidationError::MissingField {
        field: "text",
        index,
    };
    let object = option.as_object().ok_or(missing_text.clone())?;
    let text = non_blank_string(object, "text").ok_or(missing_text)?;

    Ok(QuestionOption {
        text,
        is_correct: object.get("is_correct").is_some_and(truthy),
    })
}

fn non_blank_string(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Models sometimes emit `"true"` or `1` instead of a JSON boolean.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

/// Zero correct: promote the first option. Several: keep the first marked.
fn enforce_single_correct(question: &mut GeneratedQuestion, index: usize) -> Option<Diagnostic> {
    let correct = question.options.iter().filter(|o| o.is_correct).count();

    match correct {
        1 => None,
        0 => {
            let first = question.options.first_mut()?;
            first.is_correct = true;
            Some(Diagnostic::NoCorrectOption { index })
        }
        count => {
            let mut seen = false;
            for option in question.options.iter_mut().filter(|o| o.is_correct) {
                option.is_correct = !seen;
                seen = true;
            }
            Some(Diagnostic::MultipleCorrectOptions { index, count })
        }
    }
}
