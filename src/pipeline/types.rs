// src/pipeline/types.rs

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single answer choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub text: String,
    pub is_correct: bool,
}

/// A multiple-choice question as produced by the validator.
///
/// Once validated, exactly one option has `is_correct == true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question: String,
    pub options: Vec<QuestionOption>,
}

impl GeneratedQuestion {
    /// Index of the first option marked correct.
    pub fn correct_index(&self) -> Option<usize> {
        self.options.iter().position(|o| o.is_correct)
    }
}

/// Advisory findings recorded while validating model output.
///
/// None of these abort the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The model returned a different number of questions than requested.
    CountMismatch { requested: usize, generated: usize },
    /// No option was marked correct; the first option was promoted.
    NoCorrectOption { index: usize },
    /// Several options were marked correct; only the first was kept.
    MultipleCorrectOptions { index: usize, count: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::CountMismatch {
                requested,
                generated,
            } => write!(f, "Generated {generated} questions instead of {requested}"),
            Diagnostic::NoCorrectOption { index } => write!(
                f,
                "Question {} has 0 correct answers instead of 1; first option marked correct",
                index + 1
            ),
            Diagnostic::MultipleCorrectOptions { index, count } => write!(
                f,
                "Question {} has {count} correct answers instead of 1; kept the first",
                index + 1
            ),
        }
    }
}

/// A value that passed validation, plus the diagnostics collected on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

/// Output of one pipeline invocation.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedQuestionSet {
    pub questions: Vec<GeneratedQuestion>,
    pub requested_count: u32,
    pub diagnostics: Vec<Diagnostic>,
}

impl GeneratedQuestionSet {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
