use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flows::CompletionPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub llm: LlmConfig,
    pub orders: OrdersConfig,
    pub intake: IntakeConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
    /// Chat that receives the short summary of every completed order.
    pub staff_chat_id: String,
    pub poll_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub auth_mode: LlmAuthMode,
    pub oauth_token: Option<SecretString>,
    pub api_key: Option<SecretString>,
    pub folder_id: String,
    pub model: String,
    pub completion_url: String,
    pub iam_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct OrdersConfig {
    pub backend: OrderBackend,
    pub csv_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct IntakeConfig {
    pub completion_policy: CompletionPolicy,
    pub session_store: SessionBackend,
    pub session_idle_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmAuthMode {
    /// Exchange a Yandex OAuth token for short-lived IAM tokens.
    OauthIam,
    /// Authenticate with a static service account API key.
    ApiKey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBackend {
    Sqlite,
    Csv,
}

/// Where in-progress conversations live between messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionBackend {
    Memory,
    Sqlite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_staff_chat_id: Option<String>,
    pub llm_auth_mode: Option<LlmAuthMode>,
    pub llm_oauth_token: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_folder_id: Option<String>,
    pub orders_backend: Option<OrderBackend>,
    pub orders_csv_path: Option<PathBuf>,
    pub completion_policy: Option<CompletionPolicy>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://stampdesk.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                api_base_url: "https://api.telegram.org".to_string(),
                staff_chat_id: String::new(),
                poll_timeout_secs: 30,
            },
            llm: LlmConfig {
                auth_mode: LlmAuthMode::OauthIam,
                oauth_token: None,
                api_key: None,
                folder_id: String::new(),
                model: "yandexgpt-lite".to_string(),
                completion_url: "https://llm.api.cloud.yandex.net/foundationModels/v1/completion"
                    .to_string(),
                iam_url: "https://iam.api.cloud.yandex.net/iam/v1/tokens".to_string(),
                temperature: 0.0,
                max_tokens: 500,
                timeout_secs: 30,
            },
            orders: OrdersConfig {
                backend: OrderBackend::Sqlite,
                csv_path: PathBuf::from("orders.csv"),
            },
            intake: IntakeConfig {
                completion_policy: CompletionPolicy::TrustExtractor,
                session_store: SessionBackend::Memory,
                session_idle_secs: 86_400,
                sweep_interval_secs: 300,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmAuthMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "oauth_iam" | "oauth" | "iam" => Ok(Self::OauthIam),
            "api_key" => Ok(Self::ApiKey),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm auth mode `{other}` (expected oauth_iam|api_key)"
            ))),
        }
    }
}

impl std::str::FromStr for OrderBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "csv" => Ok(Self::Csv),
            other => Err(ConfigError::Validation(format!(
                "unsupported orders backend `{other}` (expected sqlite|csv)"
            ))),
        }
    }
}

impl std::str::FromStr for SessionBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::Validation(format!(
                "unsupported session store `{other}` (expected memory|sqlite)"
            ))),
        }
    }
}

impl std::str::FromStr for CompletionPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "trust_extractor" => Ok(Self::TrustExtractor),
            "require_all_fields" => Ok(Self::RequireAllFields),
            other => Err(ConfigError::Validation(format!(
                "unsupported completion policy `{other}` (expected trust_extractor|require_all_fields)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("stampdesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(telegram) = patch.telegram {
            if let Some(bot_token) = telegram.bot_token {
                self.telegram.bot_token = secret_value(bot_token);
            }
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
            if let Some(staff_chat_id) = telegram.staff_chat_id {
                self.telegram.staff_chat_id = staff_chat_id;
            }
            if let Some(poll_timeout_secs) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = poll_timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(auth_mode) = llm.auth_mode {
                self.llm.auth_mode = auth_mode;
            }
            if let Some(oauth_token) = llm.oauth_token {
                self.llm.oauth_token = Some(secret_value(oauth_token));
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(folder_id) = llm.folder_id {
                self.llm.folder_id = folder_id;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(completion_url) = llm.completion_url {
                self.llm.completion_url = completion_url;
            }
            if let Some(iam_url) = llm.iam_url {
                self.llm.iam_url = iam_url;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(orders) = patch.orders {
            if let Some(backend) = orders.backend {
                self.orders.backend = backend;
            }
            if let Some(csv_path) = orders.csv_path {
                self.orders.csv_path = csv_path;
            }
        }

        if let Some(intake) = patch.intake {
            if let Some(completion_policy) = intake.completion_policy {
                self.intake.completion_policy = completion_policy;
            }
            if let Some(session_store) = intake.session_store {
                self.intake.session_store = session_store;
            }
            if let Some(session_idle_secs) = intake.session_idle_secs {
                self.intake.session_idle_secs = session_idle_secs;
            }
            if let Some(sweep_interval_secs) = intake.sweep_interval_secs {
                self.intake.sweep_interval_secs = sweep_interval_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("STAMPDESK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("STAMPDESK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("STAMPDESK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("STAMPDESK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("STAMPDESK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("STAMPDESK_TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("STAMPDESK_TELEGRAM_API_BASE_URL") {
            self.telegram.api_base_url = value;
        }
        if let Some(value) = read_env("STAMPDESK_TELEGRAM_STAFF_CHAT_ID") {
            self.telegram.staff_chat_id = value;
        }
        if let Some(value) = read_env("STAMPDESK_TELEGRAM_POLL_TIMEOUT_SECS") {
            self.telegram.poll_timeout_secs =
                parse_u64("STAMPDESK_TELEGRAM_POLL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("STAMPDESK_LLM_AUTH_MODE") {
            self.llm.auth_mode = value.parse()?;
        }
        if let Some(value) = read_env("STAMPDESK_LLM_OAUTH_TOKEN") {
            self.llm.oauth_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("STAMPDESK_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("STAMPDESK_LLM_FOLDER_ID") {
            self.llm.folder_id = value;
        }
        if let Some(value) = read_env("STAMPDESK_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("STAMPDESK_LLM_COMPLETION_URL") {
            self.llm.completion_url = value;
        }
        if let Some(value) = read_env("STAMPDESK_LLM_IAM_URL") {
            self.llm.iam_url = value;
        }
        if let Some(value) = read_env("STAMPDESK_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("STAMPDESK_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("STAMPDESK_ORDERS_BACKEND") {
            self.orders.backend = value.parse()?;
        }
        if let Some(value) = read_env("STAMPDESK_ORDERS_CSV_PATH") {
            self.orders.csv_path = PathBuf::from(value);
        }

        if let Some(value) = read_env("STAMPDESK_INTAKE_COMPLETION_POLICY") {
            self.intake.completion_policy = value.parse()?;
        }
        if let Some(value) = read_env("STAMPDESK_INTAKE_SESSION_STORE") {
            self.intake.session_store = value.parse()?;
        }
        if let Some(value) = read_env("STAMPDESK_INTAKE_SESSION_IDLE_SECS") {
            self.intake.session_idle_secs =
                parse_u64("STAMPDESK_INTAKE_SESSION_IDLE_SECS", &value)?;
        }
        if let Some(value) = read_env("STAMPDESK_INTAKE_SWEEP_INTERVAL_SECS") {
            self.intake.sweep_interval_secs =
                parse_u64("STAMPDESK_INTAKE_SWEEP_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("STAMPDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("STAMPDESK_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("STAMPDESK_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("STAMPDESK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("STAMPDESK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("STAMPDESK_LOGGING_LEVEL").or_else(|| read_env("STAMPDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("STAMPDESK_LOGGING_FORMAT").or_else(|| read_env("STAMPDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.telegram_bot_token {
            self.telegram.bot_token = secret_value(bot_token);
        }
        if let Some(staff_chat_id) = overrides.telegram_staff_chat_id {
            self.telegram.staff_chat_id = staff_chat_id;
        }
        if let Some(auth_mode) = overrides.llm_auth_mode {
            self.llm.auth_mode = auth_mode;
        }
        if let Some(oauth_token) = overrides.llm_oauth_token {
            self.llm.oauth_token = Some(secret_value(oauth_token));
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(api_key));
        }
        if let Some(folder_id) = overrides.llm_folder_id {
            self.llm.folder_id = folder_id;
        }
        if let Some(backend) = overrides.orders_backend {
            self.orders.backend = backend;
        }
        if let Some(csv_path) = overrides.orders_csv_path {
            self.orders.csv_path = csv_path;
        }
        if let Some(completion_policy) = overrides.completion_policy {
            self.intake.completion_policy = completion_policy;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_telegram(&self.telegram)?;
        validate_llm(&self.llm)?;
        validate_orders(&self.orders)?;
        validate_intake(&self.intake)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("stampdesk.toml"), PathBuf::from("config/stampdesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    let bot_token = telegram.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required. Get it from @BotFather (/newbot or /token)"
                .to_string(),
        ));
    }
    let well_formed = bot_token.split_once(':').is_some_and(|(bot_id, secret)| {
        !bot_id.is_empty() && bot_id.chars().all(|ch| ch.is_ascii_digit()) && !secret.is_empty()
    });
    if !well_formed {
        return Err(ConfigError::Validation(
            "telegram.bot_token must look like `<bot id>:<secret>` as issued by @BotFather"
                .to_string(),
        ));
    }

    if telegram.staff_chat_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "telegram.staff_chat_id is required; completed orders are announced there"
                .to_string(),
        ));
    }

    let base_url = telegram.api_base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "telegram.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if telegram.poll_timeout_secs > 50 {
        return Err(ConfigError::Validation(
            "telegram.poll_timeout_secs must be in range 0..=50".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.folder_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "llm.folder_id is required to build the model URI".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if !(0.0..=1.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=1.0".to_string(),
        ));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    let is_blank = |value: &Option<SecretString>| {
        value.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true)
    };
    match llm.auth_mode {
        LlmAuthMode::OauthIam => {
            if is_blank(&llm.oauth_token) {
                return Err(ConfigError::Validation(
                    "llm.oauth_token is required for the oauth_iam auth mode".to_string(),
                ));
            }
        }
        LlmAuthMode::ApiKey => {
            if is_blank(&llm.api_key) {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the api_key auth mode".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_orders(orders: &OrdersConfig) -> Result<(), ConfigError> {
    if orders.backend == OrderBackend::Csv && orders.csv_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "orders.csv_path is required for the csv backend".to_string(),
        ));
    }

    Ok(())
}

fn validate_intake(intake: &IntakeConfig) -> Result<(), ConfigError> {
    if intake.session_idle_secs == 0 {
        return Err(ConfigError::Validation(
            "intake.session_idle_secs must be greater than zero".to_string(),
        ));
    }

    if intake.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "intake.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    telegram: Option<TelegramPatch>,
    llm: Option<LlmPatch>,
    orders: Option<OrdersPatch>,
    intake: Option<IntakePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
    staff_chat_id: Option<String>,
    poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    auth_mode: Option<LlmAuthMode>,
    oauth_token: Option<String>,
    api_key: Option<String>,
    folder_id: Option<String>,
    model: Option<String>,
    completion_url: Option<String>,
    iam_url: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct OrdersPatch {
    backend: Option<OrderBackend>,
    csv_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct IntakePatch {
    completion_policy: Option<CompletionPolicy>,
    session_store: Option<SessionBackend>,
    session_idle_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        AppConfig, ConfigError, ConfigOverrides, LlmAuthMode, LoadOptions, LogFormat, OrderBackend,
        SessionBackend,
    };
    use crate::flows::CompletionPolicy;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const REQUIRED_VARS: &[(&str, &str)] = &[
        ("STAMPDESK_TELEGRAM_BOT_TOKEN", "123456:test-secret"),
        ("STAMPDESK_TELEGRAM_STAFF_CHAT_ID", "-100200300"),
        ("STAMPDESK_LLM_OAUTH_TOKEN", "y0_test"),
        ("STAMPDESK_LLM_FOLDER_ID", "b1gfolder"),
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_required_vars() {
        for (key, value) in REQUIRED_VARS {
            env::set_var(key, value);
        }
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
        for (key, _) in REQUIRED_VARS {
            env::remove_var(key);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_TELEGRAM_TOKEN", "987654:from-env");
        env::set_var("TEST_YANDEX_OAUTH", "y0_from_env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("stampdesk.toml");
            fs::write(
                &path,
                r#"
[telegram]
bot_token = "${TEST_TELEGRAM_TOKEN}"
staff_chat_id = "-1001"

[llm]
oauth_token = "${TEST_YANDEX_OAUTH}"
folder_id = "b1gfolder"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.telegram.bot_token.expose_secret() == "987654:from-env",
                "bot token should be loaded from environment",
            )?;
            ensure(
                config
                    .llm
                    .oauth_token
                    .as_ref()
                    .is_some_and(|token| token.expose_secret() == "y0_from_env"),
                "oauth token should be loaded from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_TELEGRAM_TOKEN", "TEST_YANDEX_OAUTH"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("STAMPDESK_LOG_LEVEL", "warn");
        env::set_var("STAMPDESK_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["STAMPDESK_LOG_LEVEL", "STAMPDESK_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("STAMPDESK_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("STAMPDESK_ORDERS_BACKEND", "csv");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("stampdesk.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[orders]
backend = "sqlite"
csv_path = "from-file.csv"

[intake]
completion_policy = "require_all_fields"
session_store = "sqlite"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.orders.backend == OrderBackend::Csv, "env backend should win over file")?;
            ensure(
                config.orders.csv_path.to_str() == Some("from-file.csv"),
                "file csv path should win over default",
            )?;
            ensure(
                config.intake.completion_policy == CompletionPolicy::RequireAllFields,
                "file completion policy should be applied",
            )?;
            ensure(
                config.intake.session_store == SessionBackend::Sqlite,
                "file session store should be applied",
            )?;
            Ok(())
        })();

        clear_vars(&["STAMPDESK_DATABASE_URL", "STAMPDESK_ORDERS_BACKEND"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("STAMPDESK_TELEGRAM_BOT_TOKEN", "not-a-bot-token");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("telegram.bot_token")
            );
            ensure(has_message, "validation failure should mention telegram.bot_token")
        })();

        clear_vars(&[]);
        result
    }

    #[test]
    fn api_key_mode_requires_api_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("STAMPDESK_LLM_AUTH_MODE", "api-key");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("api_key mode without a key should fail".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::Validation(ref message) if message.contains("llm.api_key")),
                "validation failure should mention llm.api_key",
            )?;

            let config = AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    llm_api_key: Some("AQVN-test".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.llm.auth_mode == LlmAuthMode::ApiKey, "auth mode should be api_key")
        })();

        clear_vars(&["STAMPDESK_LLM_AUTH_MODE"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("STAMPDESK_TELEGRAM_BOT_TOKEN", "555:bot-secret-value");
        env::set_var("STAMPDESK_LLM_OAUTH_TOKEN", "y0_oauth-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("bot-secret-value"), "debug output should not contain bot token")?;
            ensure(
                !debug.contains("oauth-secret-value"),
                "debug output should not contain oauth token",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&[]);
        result
    }
}
