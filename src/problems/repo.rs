use std::collections::HashMap;

use rand::Rng;
use sqlx::SqlitePool;
use tracing::warn;

use super::repo_types::{
    CreatedProblem, NewProblem, Problem, ProblemLanguage, ProblemSuggestion, ProblemView,
};

const ACCESS_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ACCESS_CODE_LEN: usize = 6;
const ACCESS_CODE_ATTEMPTS: usize = 5;

const PROBLEM_COLUMNS: &str = "id, teacher_id, access_code, title, description, distractor_mode, \
     num_distractors, max_generations, max_attempts, time_limit_minutes, \
     allow_copy_paste, track_tab_switching, created_at";

/// Short code students type to join a problem. No 0/O or 1/I.
pub(crate) fn generate_access_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ACCESS_CODE_LEN)
        .map(|_| ACCESS_CODE_ALPHABET[rng.gen_range(0..ACCESS_CODE_ALPHABET.len())] as char)
        .collect()
}

fn is_access_code_collision(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|d| d.is_unique_violation() && d.message().contains("access_code"))
}

impl Problem {
    /// Insert the problem with its languages and suggestions in one
    /// transaction, drawing a fresh access code on collision.
    pub async fn create(
        db: &SqlitePool,
        teacher_id: i64,
        new: &NewProblem,
    ) -> anyhow::Result<CreatedProblem> {
        for _ in 0..ACCESS_CODE_ATTEMPTS {
            let access_code = generate_access_code();
            match Self::insert_with_code(db, teacher_id, new, &access_code).await {
                Ok(id) => return Ok(CreatedProblem { id, access_code }),
                Err(e) if is_access_code_collision(&e) => {
                    warn!(access_code = %access_code, "access code taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        anyhow::bail!("no free access code after {} attempts", ACCESS_CODE_ATTEMPTS)
    }

    pub(crate) async fn insert_with_code(
        db: &SqlitePool,
        teacher_id: i64,
        new: &NewProblem,
        access_code: &str,
    ) -> Result<i64, sqlx::Error> {
        let mut tx = db.begin().await?;

        let (id,) = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO problems (
                teacher_id, access_code, title, description, distractor_mode,
                num_distractors, max_generations, max_attempts, time_limit_minutes,
                allow_copy_paste, track_tab_switching
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(teacher_id)
        .bind(access_code)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.distractor_mode.as_str())
        .bind(new.num_distractors)
        .bind(new.max_generations)
        .bind(new.max_attempts)
        .bind(new.time_limit_minutes)
        .bind(new.allow_copy_paste)
        .bind(new.track_tab_switching)
        .fetch_one(&mut *tx)
        .await?;

        for lang in &new.languages {
            sqlx::query(
                "INSERT INTO problem_languages (problem_id, language, boilerplate) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(&lang.language)
            .bind(&lang.boilerplate)
            .execute(&mut *tx)
            .await?;
        }

        for s in &new.suggestions {
            sqlx::query(
                "INSERT INTO problem_suggestions (problem_id, language, is_correct, content) VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(&s.language)
            .bind(s.is_correct)
            .bind(&s.content)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    /// All problems, newest first.
    pub async fn list(db: &SqlitePool) -> anyhow::Result<Vec<Problem>> {
        let rows = sqlx::query_as::<_, Problem>(&format!(
            "SELECT {} FROM problems ORDER BY id DESC",
            PROBLEM_COLUMNS
        ))
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find_by_id(db: &SqlitePool, id: i64) -> anyhow::Result<Option<Problem>> {
        let row = sqlx::query_as::<_, Problem>(&format!(
            "SELECT {} FROM problems WHERE id = ?",
            PROBLEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }
}

impl ProblemView {
    /// Every problem with its languages and suggestions, newest first.
    pub async fn list(db: &SqlitePool) -> anyhow::Result<Vec<ProblemView>> {
        let problems = Problem::list(db).await?;

        let mut languages: HashMap<i64, Vec<ProblemLanguage>> = HashMap::new();
        for row in sqlx::query_as::<_, ProblemLanguage>(
            "SELECT problem_id, language, boilerplate FROM problem_languages ORDER BY id",
        )
        .fetch_all(db)
        .await?
        {
            languages.entry(row.problem_id).or_default().push(row);
        }

        let mut suggestions: HashMap<i64, Vec<ProblemSuggestion>> = HashMap::new();
        for row in sqlx::query_as::<_, ProblemSuggestion>(
            "SELECT problem_id, language, is_correct, content FROM problem_suggestions ORDER BY id",
        )
        .fetch_all(db)
        .await?
        {
            suggestions.entry(row.problem_id).or_default().push(row);
        }

        Ok(problems
            .into_iter()
            .map(|problem| ProblemView {
                languages: languages.remove(&problem.id).unwrap_or_default(),
                suggestions: suggestions.remove(&problem.id).unwrap_or_default(),
                problem,
            })
            .collect())
    }

    pub async fn find_by_id(db: &SqlitePool, id: i64) -> anyhow::Result<Option<ProblemView>> {
        let Some(problem) = Problem::find_by_id(db, id).await? else {
            return Ok(None);
        };

        let languages = sqlx::query_as::<_, ProblemLanguage>(
            "SELECT problem_id, language, boilerplate FROM problem_languages WHERE problem_id = ? ORDER BY id",
        )
        .bind(id)
        .fetch_all(db)
        .await?;

        let suggestions = sqlx::query_as::<_, ProblemSuggestion>(
            "SELECT problem_id, language, is_correct, content FROM problem_suggestions WHERE problem_id = ? ORDER BY id",
        )
        .bind(id)
        .fetch_all(db)
        .await?;

        Ok(Some(ProblemView {
            problem,
            languages,
            suggestions,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::repo_types::User,
        auth::Role,
        db,
        problems::repo_types::{DistractorMode, NewLanguage, NewSuggestion},
    };

    fn sample(description: &str) -> NewProblem {
        NewProblem {
            title: String::new(),
            description: description.into(),
            distractor_mode: DistractorMode::Ai,
            num_distractors: Some(4),
            max_generations: None,
            max_attempts: None,
            time_limit_minutes: None,
            allow_copy_paste: true,
            track_tab_switching: false,
            languages: vec![NewLanguage {
                language: "python".into(),
                boilerplate: String::new(),
            }],
            suggestions: Vec::new(),
        }
    }

    async fn teacher(pool: &SqlitePool) -> i64 {
        User::create(pool, "Ann", "a@x.com", "h", Role::Teacher)
            .await
            .unwrap()
            .id
    }

    #[test]
    fn access_codes_use_the_unambiguous_alphabet() {
        for _ in 0..50 {
            let code = generate_access_code();
            assert_eq!(code.len(), ACCESS_CODE_LEN);
            assert!(code.bytes().all(|b| ACCESS_CODE_ALPHABET.contains(&b)));
        }
    }

    #[tokio::test]
    async fn create_list_and_fetch() {
        let pool = db::connect_in_memory().await.unwrap();
        let teacher = teacher(&pool).await;

        let first = Problem::create(&pool, teacher, &sample("first")).await.unwrap();
        let second = Problem::create(&pool, teacher, &sample("second")).await.unwrap();
        assert_ne!(first.access_code, second.access_code);

        let all = Problem::list(&pool).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);

        let got = Problem::find_by_id(&pool, first.id).await.unwrap().unwrap();
        assert_eq!(got.description, "first");
        assert_eq!(got.teacher_id, teacher);
        assert_eq!(got.access_code, first.access_code);
        assert_eq!(got.distractor_mode, DistractorMode::Ai);
        assert_eq!(got.num_distractors, Some(4));
        assert!(got.allow_copy_paste);
        assert!(!got.track_tab_switching);
        assert!(Problem::find_by_id(&pool, 9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn languages_and_suggestions_come_back_with_the_problem() {
        let pool = db::connect_in_memory().await.unwrap();
        let teacher = teacher(&pool).await;

        let mut new = sample("add two numbers");
        new.distractor_mode = DistractorMode::Prewritten;
        new.num_distractors = None;
        new.languages.push(NewLanguage {
            language: "java".into(),
            boilerplate: "class Main {}".into(),
        });
        new.suggestions = vec![
            NewSuggestion {
                language: "python".into(),
                is_correct: true,
                content: "return a + b".into(),
            },
            NewSuggestion {
                language: "python".into(),
                is_correct: false,
                content: "return a - b".into(),
            },
        ];
        let created = Problem::create(&pool, teacher, &new).await.unwrap();
        Problem::create(&pool, teacher, &sample("other")).await.unwrap();

        let view = ProblemView::find_by_id(&pool, created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.problem.distractor_mode, DistractorMode::Prewritten);
        let langs: Vec<_> = view.languages.iter().map(|l| l.language.as_str()).collect();
        assert_eq!(langs, ["python", "java"]);
        assert_eq!(view.languages[1].boilerplate, "class Main {}");
        assert_eq!(view.suggestions.len(), 2);
        assert!(view.suggestions[0].is_correct);

        let all = ProblemView::list(&pool).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].problem.id, created.id);
        assert_eq!(all[1].languages.len(), 2);
        assert_eq!(all[0].languages.len(), 1);
        assert!(all[0].suggestions.is_empty());
    }

    #[tokio::test]
    async fn reused_access_code_is_detected_as_collision() {
        let pool = db::connect_in_memory().await.unwrap();
        let teacher = teacher(&pool).await;

        Problem::insert_with_code(&pool, teacher, &sample("a"), "ABCDEF")
            .await
            .unwrap();
        let err = Problem::insert_with_code(&pool, teacher, &sample("b"), "ABCDEF")
            .await
            .unwrap_err();
        assert!(is_access_code_collision(&err));
        assert_eq!(Problem::list(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_child_insert_rolls_back_the_problem() {
        let pool = db::connect_in_memory().await.unwrap();
        let teacher = teacher(&pool).await;

        let mut new = sample("dup languages");
        new.languages.push(new.languages[0].clone());
        let err = Problem::insert_with_code(&pool, teacher, &new, "QWERTY")
            .await
            .unwrap_err();
        assert!(!is_access_code_collision(&err));
        assert!(Problem::list(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_teacher_violates_foreign_key() {
        let pool = db::connect_in_memory().await.unwrap();
        assert!(Problem::create(&pool, 404, &sample("orphan")).await.is_err());
    }
}
