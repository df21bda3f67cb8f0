use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::JwtKeys;
use crate::config::AppConfig;
use crate::db;
use crate::suggestions::{OpenAiSuggester, SuggestionService};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub suggestions: Arc<dyn SuggestionService>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = db::connect(&config.database_url).await?;
        db::init_schema(&db).await?;

        let jwt = JwtKeys::from_config(&config.jwt);
        let suggestions =
            Arc::new(OpenAiSuggester::new(&config.openai)?) as Arc<dyn SuggestionService>;

        Ok(Self::from_parts(db, config, jwt, suggestions))
    }

    pub fn from_parts(
        db: SqlitePool,
        config: Arc<AppConfig>,
        jwt: JwtKeys,
        suggestions: Arc<dyn SuggestionService>,
    ) -> Self {
        Self {
            db,
            config,
            jwt,
            suggestions,
        }
    }

    /// In-memory database, fixed secret and a canned suggestion service.
    #[cfg(test)]
    pub async fn fake() -> Self {
        use crate::config::{JwtConfig, OpenAiConfig};
        use crate::suggestions::Suggestion;
        use async_trait::async_trait;

        struct FakeSuggester;
        #[async_trait]
        impl SuggestionService for FakeSuggester {
            async fn suggest(
                &self,
                current_code: &str,
                _problem_prompt: &str,
                _language: &str,
            ) -> anyhow::Result<Suggestion> {
                if current_code.is_empty() {
                    anyhow::bail!("upstream refused empty code");
                }
                Ok(Suggestion {
                    suggestion: "return a + b".into(),
                    explanation: "add the two arguments".into(),
                })
            }
        }

        let db = db::connect_in_memory().await.expect("in-memory db");
        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            database_url: "sqlite::memory:".into(),
            jwt: JwtConfig {
                secret: "test".into(),
            },
            openai: OpenAiConfig {
                api_key: None,
                base_url: "http://fake.local/v1".into(),
                model: "fake".into(),
                timeout_secs: 1,
            },
            cors_allow_origin: "http://localhost:3000".into(),
        });
        let jwt = JwtKeys::from_config(&config.jwt);

        Self::from_parts(db, config, jwt, Arc::new(FakeSuggester))
    }
}
