//! Questions and Answers
//!
//! The question pool is read once at startup and never mutated by the engine.

use serde::{Serialize, Deserialize};

use crate::game::engine::EngineError;

/// One answer slot of a question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    /// Answer text
    pub text: String,
    /// Is this the correct answer?
    #[serde(default)]
    pub is_correct: bool,
}

impl Answer {
    /// Create an answer.
    pub fn new(text: impl Into<String>, is_correct: bool) -> Self {
        Self { text: text.into(), is_correct }
    }
}

/// A trivia question with ordered answers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Question text (also its identity for repeat avoidance)
    pub text: String,
    /// Answers, index-aligned with the layout's answer zones
    pub answers: Vec<Answer>,
}

impl Question {
    /// Create a question.
    pub fn new(text: impl Into<String>, answers: Vec<Answer>) -> Self {
        Self { text: text.into(), answers }
    }

    /// The correct answer, if the question is well formed.
    pub fn correct_answer(&self) -> Option<&Answer> {
        self.answers.iter().find(|a| a.is_correct)
    }

    /// Check that exactly one answer is marked correct.
    pub fn validate(&self) -> Result<(), EngineError> {
        let correct = self.answers.iter().filter(|a| a.is_correct).count();
        if correct != 1 {
            return Err(EngineError::InvalidCorrectAnswerCount {
                question: self.text.clone(),
                correct,
            });
        }
        Ok(())
    }
}

/// Validate a whole pool against the number of answer zones.
pub fn validate_pool(questions: &[Question], answer_zones: usize) -> Result<(), EngineError> {
    if questions.is_empty() {
        return Err(EngineError::EmptyQuestionPool);
    }

    for question in questions {
        if question.answers.len() != answer_zones {
            return Err(EngineError::AnswerZoneMismatch {
                question: question.text.clone(),
                answers: question.answers.len(),
                zones: answer_zones,
            });
        }
        question.validate()?;
    }

    Ok(())
}
