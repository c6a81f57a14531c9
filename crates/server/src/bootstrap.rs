use std::sync::Arc;
use std::time::Duration;

use stampdesk_agent::{
    ExtractionGateway, IntakeRuntime, LlmClient, LlmError, OrderFinalizer, YandexGptClient,
};
use stampdesk_core::config::{AppConfig, ConfigError, OrderBackend, SessionBackend};
use stampdesk_core::{CustomerNotifier, FieldSchema, IntakeFlow, StaffNotifier};
use stampdesk_db::{
    connect_with_settings, migrations, CsvOrderLedger, DbPool, InMemorySessionStore,
    OrderRepository, SessionStore, SqlOrderRepository, SqlSessionStore,
};
use stampdesk_telegram::{
    intake_dispatcher, BotApiClient, ChatOutbox, LongPollRunner, ReconnectPolicy,
    TelegramCustomerNotifier, TelegramStaffNotifier, TransportError, UpdateSource,
};
use thiserror::Error;
use tracing::info;

use crate::service::IntakeConversationService;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub intake_runtime: Arc<IntakeRuntime>,
    pub telegram_runner: LongPollRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("telegram client setup failed: {0}")]
    Telegram(#[source] TransportError),
    #[error("llm client setup failed: {0}")]
    Llm(#[source] LlmError),
}

/// The outside world the intake pipeline talks to.
pub struct Collaborators {
    pub updates: Arc<dyn UpdateSource>,
    pub outbox: Arc<dyn ChatOutbox>,
    pub llm: Arc<dyn LlmClient>,
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let bot =
        Arc::new(BotApiClient::from_config(&config.telegram).map_err(BootstrapError::Telegram)?);
    let llm = Arc::new(YandexGptClient::from_config(&config.llm).map_err(BootstrapError::Llm)?);
    info!(
        event_name = "system.bootstrap.clients_ready",
        correlation_id = "bootstrap",
        llm_auth_mode = ?config.llm.auth_mode,
        "telegram and llm clients configured"
    );

    assemble(config, Collaborators { updates: bot.clone(), outbox: bot, llm }).await
}

/// Connects storage and wires the intake pipeline around the given collaborators.
pub async fn assemble(
    config: AppConfig,
    collaborators: Collaborators,
) -> Result<Application, BootstrapError> {
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

    let schema = FieldSchema::order();
    let sessions: Arc<dyn SessionStore> = match config.intake.session_store {
        SessionBackend::Memory => Arc::new(InMemorySessionStore::default()),
        SessionBackend::Sqlite => Arc::new(SqlSessionStore::new(db_pool.clone())),
    };
    let orders: Arc<dyn OrderRepository> = match config.orders.backend {
        OrderBackend::Sqlite => Arc::new(SqlOrderRepository::with_schema(db_pool.clone(), schema)),
        OrderBackend::Csv => {
            Arc::new(CsvOrderLedger::with_schema(config.orders.csv_path.clone(), schema))
        }
    };
    let notifier: Arc<dyn StaffNotifier> = Arc::new(TelegramStaffNotifier::new(
        collaborators.outbox.clone(),
        config.telegram.staff_chat_id.clone(),
    ));
    let customer: Arc<dyn CustomerNotifier> =
        Arc::new(TelegramCustomerNotifier::new(collaborators.outbox.clone()));
    info!(
        event_name = "system.bootstrap.storage_selected",
        correlation_id = "bootstrap",
        session_store = ?config.intake.session_store,
        orders_backend = ?config.orders.backend,
        "intake storage selected"
    );

    let intake_runtime = Arc::new(IntakeRuntime::new(
        sessions,
        ExtractionGateway::new(
            collaborators.llm,
            schema,
            Duration::from_secs(config.llm.timeout_secs),
        ),
        IntakeFlow::new(schema, config.intake.completion_policy),
        OrderFinalizer::new(orders, notifier, customer, schema),
    ));

    let telegram_runner = LongPollRunner::new(
        collaborators.updates,
        collaborators.outbox,
        intake_dispatcher(Arc::new(IntakeConversationService::new(intake_runtime.clone()))),
        ReconnectPolicy::default(),
    );

    Ok(Application { config, db_pool, intake_runtime, telegram_runner })
}
