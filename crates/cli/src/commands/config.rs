use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use stampdesk_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct ConfigLine {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl ConfigLine {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.into(), env_keys }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for line in effective_lines(&config) {
        let source = field_source(
            line.key,
            line.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(line.key, &line.value, source));
    }

    lines.join("\n")
}

fn effective_lines(config: &AppConfig) -> Vec<ConfigLine> {
    vec![
        ConfigLine::new("database.url", &config.database.url, &["STAMPDESK_DATABASE_URL"]),
        ConfigLine::new(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["STAMPDESK_DATABASE_MAX_CONNECTIONS"],
        ),
        ConfigLine::new(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["STAMPDESK_DATABASE_TIMEOUT_SECS"],
        ),
        ConfigLine::new(
            "telegram.bot_token",
            redact_bot_token(config.telegram.bot_token.expose_secret()),
            &["STAMPDESK_TELEGRAM_BOT_TOKEN"],
        ),
        ConfigLine::new(
            "telegram.api_base_url",
            &config.telegram.api_base_url,
            &["STAMPDESK_TELEGRAM_API_BASE_URL"],
        ),
        ConfigLine::new(
            "telegram.staff_chat_id",
            &config.telegram.staff_chat_id,
            &["STAMPDESK_TELEGRAM_STAFF_CHAT_ID"],
        ),
        ConfigLine::new(
            "telegram.poll_timeout_secs",
            config.telegram.poll_timeout_secs.to_string(),
            &["STAMPDESK_TELEGRAM_POLL_TIMEOUT_SECS"],
        ),
        ConfigLine::new(
            "llm.auth_mode",
            format!("{:?}", config.llm.auth_mode),
            &["STAMPDESK_LLM_AUTH_MODE"],
        ),
        ConfigLine::new(
            "llm.oauth_token",
            redact_optional(config.llm.oauth_token.as_ref()),
            &["STAMPDESK_LLM_OAUTH_TOKEN"],
        ),
        ConfigLine::new(
            "llm.api_key",
            redact_optional(config.llm.api_key.as_ref()),
            &["STAMPDESK_LLM_API_KEY"],
        ),
        ConfigLine::new("llm.folder_id", &config.llm.folder_id, &["STAMPDESK_LLM_FOLDER_ID"]),
        ConfigLine::new("llm.model", &config.llm.model, &["STAMPDESK_LLM_MODEL"]),
        ConfigLine::new(
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            &["STAMPDESK_LLM_TIMEOUT_SECS"],
        ),
        ConfigLine::new(
            "orders.backend",
            format!("{:?}", config.orders.backend),
            &["STAMPDESK_ORDERS_BACKEND"],
        ),
        ConfigLine::new(
            "orders.csv_path",
            config.orders.csv_path.display().to_string(),
            &["STAMPDESK_ORDERS_CSV_PATH"],
        ),
        ConfigLine::new(
            "intake.completion_policy",
            format!("{:?}", config.intake.completion_policy),
            &["STAMPDESK_INTAKE_COMPLETION_POLICY"],
        ),
        ConfigLine::new(
            "intake.session_store",
            format!("{:?}", config.intake.session_store),
            &["STAMPDESK_INTAKE_SESSION_STORE"],
        ),
        ConfigLine::new(
            "intake.session_idle_secs",
            config.intake.session_idle_secs.to_string(),
            &["STAMPDESK_INTAKE_SESSION_IDLE_SECS"],
        ),
        ConfigLine::new(
            "server.bind_address",
            &config.server.bind_address,
            &["STAMPDESK_SERVER_BIND_ADDRESS"],
        ),
        ConfigLine::new(
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            &["STAMPDESK_SERVER_HEALTH_CHECK_PORT"],
        ),
        ConfigLine::new(
            "logging.level",
            &config.logging.level,
            &["STAMPDESK_LOGGING_LEVEL", "STAMPDESK_LOG_LEVEL"],
        ),
        ConfigLine::new(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["STAMPDESK_LOGGING_FORMAT", "STAMPDESK_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("stampdesk.toml"), PathBuf::from("config/stampdesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the public bot id, hides the secret half.
fn redact_bot_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_string()
}

fn redact_optional(secret: Option<&SecretString>) -> &'static str {
    match secret {
        Some(secret) if !secret.expose_secret().trim().is_empty() => "<redacted>",
        _ => "<unset>",
    }
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_bot_token};

    #[test]
    fn bot_token_keeps_only_the_bot_id() {
        assert_eq!(redact_bot_token("123456:AAE-secret"), "123456:***");
        assert_eq!(redact_bot_token("  "), "<empty>");
        assert_eq!(redact_bot_token("opaque"), "<redacted>");
    }

    #[test]
    fn nested_keys_are_found_in_the_file() {
        let doc: Value = "[telegram]\nstaff_chat_id = \"-1\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "telegram.staff_chat_id"));
        assert!(!contains_path(&doc, "telegram.bot_token"));
    }
}
