use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use coco_agent::llm::AnthropicClient;
use coco_agent::profile::HttpProfileFetcher;
use coco_agent::SessionOrchestrator;
use coco_core::config::{AppConfig, ConfigError, LoadOptions};
use coco_db::{connect_with_settings, migrations, DbPool, SqlHistoryStore};
use coco_gateway::pacer::TokioSleeper;
use coco_gateway::transport::WassengerTransport;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: Arc<SessionOrchestrator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client setup failed: {0}")]
    Llm(#[source] coco_agent::ProviderError),
    #[error("profile fetcher setup failed: {0}")]
    ProfileFetcher(#[source] coco_agent::profile::FetchError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let llm = Arc::new(AnthropicClient::from_config(&config.llm).map_err(BootstrapError::Llm)?);
    let fetcher = Arc::new(
        HttpProfileFetcher::new(config.llm.timeout_secs).map_err(BootstrapError::ProfileFetcher)?,
    );
    let transport = Arc::new(WassengerTransport::new(
        config.wassenger.base_url.clone(),
        config.wassenger.api_token.clone(),
    ));

    let orchestrator = Arc::new(SessionOrchestrator::new(
        Arc::new(SqlHistoryStore::new(db_pool.clone())),
        llm,
        fetcher,
        transport,
        Arc::new(TokioSleeper),
        config.wassenger.group_id.clone(),
        &config.pipeline,
    ));
    info!(
        event_name = "system.bootstrap.pipeline_wired",
        correlation_id = "bootstrap",
        model = %config.llm.model,
        "session pipeline wired"
    );

    Ok(Application { config, db_pool, orchestrator })
}

#[cfg(test)]
mod tests {
    use coco_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                llm_api_key: Some("sk-ant-test".to_string()),
                wassenger_api_token: Some("wss-test".to_string()),
                wassenger_group_id: Some("120363012345@g.us".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_the_wassenger_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                llm_api_key: Some("sk-ant-test".to_string()),
                wassenger_group_id: Some("120363012345@g.us".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("wassenger.api_token"));
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_wires_the_pipeline() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'turns'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("turns table should exist after bootstrap");
        assert_eq!(table_count, 1);

        app.db_pool.close().await;
    }
}
