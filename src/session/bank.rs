//! Question bank and its loaders
//!
//! The bank only changes by wholesale replacement. Uploaded questions are
//! validated into canonical [`Question`]s before anything is swapped.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::types::Question;

pub const DEFAULT_QUESTION_SECONDS: u32 = 30;

#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("Failed to read question file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse questions: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Question {index} is invalid: {reason}")]
    Invalid { index: usize, reason: String },
}

/// A question as uploaded, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    pub choices: Vec<String>,
    pub correct_index: i64,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

impl QuestionInput {
    fn into_question(self, index: usize) -> Result<Question, BankError> {
        let invalid = |reason: &str| BankError::Invalid {
            index,
            reason: reason.to_string(),
        };

        if self.text.trim().is_empty() {
            return Err(invalid("text is empty"));
        }
        let choices: [String; 4] = self
            .choices
            .try_into()
            .map_err(|_| invalid("exactly 4 choices are required"))?;
        if !(0..4).contains(&self.correct_index) {
            return Err(invalid("correctIndex must be between 0 and 3"));
        }
        let duration_seconds = self.duration_seconds.unwrap_or(DEFAULT_QUESTION_SECONDS);
        if duration_seconds == 0 {
            return Err(invalid("durationSeconds must be positive"));
        }

        Ok(Question {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| format!("q{}", index + 1)),
            text: self.text,
            choices,
            correct_index: self.correct_index as usize,
            duration_seconds,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: Arc<Vec<Question>>,
}

impl QuestionBank {
    /// Validate every input; a single bad question rejects the whole upload.
    pub fn from_inputs(inputs: Vec<QuestionInput>) -> Result<Self, BankError> {
        let questions = inputs
            .into_iter()
            .enumerate()
            .map(|(index, input)| input.into_question(index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(questions))
    }

    pub fn from_json(json: &str) -> Result<Self, BankError> {
        let inputs: Vec<QuestionInput> = serde_json::from_str(json)?;
        Self::from_inputs(inputs)
    }

    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions: Arc::new(questions),
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }
}

/// Where `host:load-sample` gets its questions from
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn load(&self) -> Result<QuestionBank, BankError>;

    /// Human-readable origin, for logs
    fn describe(&self) -> String;
}

/// Reads a JSON array of questions from disk
#[derive(Debug, Clone)]
pub struct FileQuestionSource {
    path: PathBuf,
}

impl FileQuestionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl QuestionSource for FileQuestionSource {
    async fn load(&self) -> Result<QuestionBank, BankError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        QuestionBank::from_json(&content)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
