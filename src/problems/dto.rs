use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::repo_types::{DistractorMode, NewLanguage, NewProblem, NewSuggestion};
use crate::error::AppError;

pub const LANGUAGES: &[&str] = &["python", "javascript", "java", "c"];

const DEFAULT_NUM_DISTRACTORS: i64 = 4;

pub fn is_supported_language(language: &str) -> bool {
    LANGUAGES.contains(&language)
}

#[derive(Debug, Default, Deserialize)]
pub struct PrewrittenSuggestions {
    #[serde(default)]
    pub correct: String,
    #[serde(default)]
    pub distractors: Vec<String>,
}

/// Accepts the editor's camelCase payload. A single `language` and
/// `boilerplate` is shorthand for a one-language problem.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProblemRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub boilerplate: Option<String>,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default)]
    pub starter_code: HashMap<String, String>,
    #[serde(default)]
    pub distractor_mode: Option<String>,
    #[serde(default)]
    pub num_distractors: Option<i64>,
    #[serde(default)]
    pub max_generations: Option<i64>,
    #[serde(default)]
    pub suggestions: HashMap<String, PrewrittenSuggestions>,
    #[serde(default)]
    pub max_attempts: Option<i64>,
    #[serde(default)]
    pub time_limit_minutes: Option<i64>,
    #[serde(default)]
    pub allow_copy_paste: Option<bool>,
    #[serde(default)]
    pub track_tab_switching: Option<bool>,
}

fn invalid(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}

fn positive(value: Option<i64>, name: &str) -> Result<Option<i64>, AppError> {
    match value {
        Some(v) if v < 1 => Err(invalid(format!("{} must be at least 1", name))),
        other => Ok(other),
    }
}

impl TryFrom<CreateProblemRequest> for NewProblem {
    type Error = AppError;

    fn try_from(req: CreateProblemRequest) -> Result<Self, Self::Error> {
        let description = req
            .description
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| invalid("Missing description"))?;

        let requested = match req.languages {
            Some(list) => list,
            None => vec![req.language.unwrap_or_else(|| "python".into())],
        };
        let mut selected: Vec<String> = Vec::with_capacity(requested.len());
        for language in requested {
            if !is_supported_language(&language) {
                return Err(invalid(format!("Unsupported language {}", language)));
            }
            if !selected.contains(&language) {
                selected.push(language);
            }
        }
        if selected.is_empty() {
            return Err(invalid("Select at least one language"));
        }

        let mut starter = req.starter_code;
        if let Some(unselected) = starter.keys().find(|k| !selected.contains(*k)) {
            return Err(invalid(format!("Starter code for unselected language {}", unselected)));
        }
        if let Some(boilerplate) = req.boilerplate {
            starter.entry(selected[0].clone()).or_insert(boilerplate);
        }
        let languages = selected
            .iter()
            .map(|language| NewLanguage {
                language: language.clone(),
                boilerplate: starter.remove(language).unwrap_or_default(),
            })
            .collect();

        let distractor_mode = match req.distractor_mode {
            Some(mode) => mode
                .parse()
                .map_err(|_| invalid(format!("Invalid distractor mode {}", mode)))?,
            None => DistractorMode::Ai,
        };

        let (num_distractors, max_generations, suggestions) = match distractor_mode {
            DistractorMode::Ai => {
                let n = req.num_distractors.unwrap_or(DEFAULT_NUM_DISTRACTORS);
                if n < 1 {
                    return Err(invalid("Number of distractors must be at least 1"));
                }
                (Some(n), positive(req.max_generations, "Max generations")?, Vec::new())
            }
            DistractorMode::Prewritten => {
                let mut given = req.suggestions;
                let mut rows = Vec::new();
                for language in &selected {
                    let entry = given.remove(language).unwrap_or_default();
                    let correct = entry.correct.trim();
                    if correct.is_empty() {
                        return Err(invalid(format!("Correct answer required for {}", language)));
                    }
                    rows.push(NewSuggestion {
                        language: language.clone(),
                        is_correct: true,
                        content: correct.to_string(),
                    });

                    let mut distractors: Vec<&str> = Vec::new();
                    for d in entry.distractors.iter().map(|d| d.trim()) {
                        if !d.is_empty() && !distractors.contains(&d) {
                            distractors.push(d);
                        }
                    }
                    if distractors.is_empty() {
                        return Err(invalid(format!(
                            "At least one distractor required for {}",
                            language
                        )));
                    }
                    rows.extend(distractors.into_iter().map(|d| NewSuggestion {
                        language: language.clone(),
                        is_correct: false,
                        content: d.to_string(),
                    }));
                }
                (None, None, rows)
            }
        };

        Ok(NewProblem {
            title: req.title.unwrap_or_default(),
            description,
            distractor_mode,
            num_distractors,
            max_generations,
            max_attempts: positive(req.max_attempts, "Max attempts")?,
            time_limit_minutes: positive(req.time_limit_minutes, "Time limit")?,
            allow_copy_paste: req.allow_copy_paste.unwrap_or(true),
            track_tab_switching: req.track_tab_switching.unwrap_or(false),
            languages,
            suggestions,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedProblemResponse {
    pub message: &'static str,
    pub problem_id: i64,
    pub access_code: String,
}
