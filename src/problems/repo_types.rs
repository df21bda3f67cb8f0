use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Where a problem's wrong-answer suggestions come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistractorMode {
    /// Generated on demand by the suggestion service.
    Ai,
    /// Written by the author at creation time.
    Prewritten,
}

impl DistractorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistractorMode::Ai => "ai",
            DistractorMode::Prewritten => "prewritten",
        }
    }
}

impl fmt::Display for DistractorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown distractor mode {0}")]
pub struct UnknownDistractorMode(pub String);

impl FromStr for DistractorMode {
    type Err = UnknownDistractorMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai" => Ok(DistractorMode::Ai),
            "prewritten" => Ok(DistractorMode::Prewritten),
            other => Err(UnknownDistractorMode(other.to_string())),
        }
    }
}

impl TryFrom<String> for DistractorMode {
    type Error = UnknownDistractorMode;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Problem record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Problem {
    pub id: i64,
    pub teacher_id: i64, // author, always a teacher or admin
    pub access_code: String,
    pub title: String,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub distractor_mode: DistractorMode,
    pub num_distractors: Option<i64>,
    pub max_generations: Option<i64>,
    pub max_attempts: Option<i64>,
    pub time_limit_minutes: Option<i64>,
    pub allow_copy_paste: bool,
    pub track_tab_switching: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// One language a problem can be solved in, with its starter code.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProblemLanguage {
    #[serde(skip_serializing)]
    pub problem_id: i64,
    pub language: String,
    pub boilerplate: String,
}

/// Prewritten suggestion. Which one is correct is never sent to clients.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProblemSuggestion {
    #[serde(skip_serializing)]
    pub problem_id: i64,
    pub language: String,
    #[serde(skip_serializing)]
    pub is_correct: bool,
    pub content: String,
}

/// A problem with its languages and prewritten suggestions, as served.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemView {
    #[serde(flatten)]
    pub problem: Problem,
    pub languages: Vec<ProblemLanguage>,
    pub suggestions: Vec<ProblemSuggestion>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLanguage {
    pub language: String,
    pub boilerplate: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSuggestion {
    pub language: String,
    pub is_correct: bool,
    pub content: String,
}

/// Validated input for a new problem.
#[derive(Debug, Clone)]
pub struct NewProblem {
    pub title: String,
    pub description: String,
    pub distractor_mode: DistractorMode,
    pub num_distractors: Option<i64>,
    pub max_generations: Option<i64>,
    pub max_attempts: Option<i64>,
    pub time_limit_minutes: Option<i64>,
    pub allow_copy_paste: bool,
    pub track_tab_switching: bool,
    pub languages: Vec<NewLanguage>,
    pub suggestions: Vec<NewSuggestion>,
}

/// Result of a successful insert.
#[derive(Debug, Clone)]
pub struct CreatedProblem {
    pub id: i64,
    pub access_code: String,
}
