use serde::Serialize;
use stampdesk_core::config::{AppConfig, LlmAuthMode, LoadOptions, OrderBackend};
use stampdesk_db::connect_with_settings;

use crate::commands::block_on_runtime;

const DEPENDENT_CHECKS: [&str; 4] =
    ["telegram_readiness", "llm_credentials", "orders_destination", "database_connectivity"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_telegram(&config));
            checks.push(check_llm_credentials(&config));
            checks.push(check_orders_destination(&config));
            checks.push(check_database_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_telegram(config: &AppConfig) -> DoctorCheck {
    let staff_chat_id = config.telegram.staff_chat_id.trim();
    let addressable = staff_chat_id.parse::<i64>().is_ok() || staff_chat_id.starts_with('@');

    if addressable {
        DoctorCheck {
            name: "telegram_readiness",
            status: CheckStatus::Pass,
            details: format!("bot token well-formed; staff notifications go to `{staff_chat_id}`"),
        }
    } else {
        DoctorCheck {
            name: "telegram_readiness",
            status: CheckStatus::Fail,
            details: format!(
                "telegram.staff_chat_id `{staff_chat_id}` is neither a numeric chat id nor an @channel"
            ),
        }
    }
}

fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    let credential = match config.llm.auth_mode {
        LlmAuthMode::OauthIam => "OAuth token exchanged for IAM tokens",
        LlmAuthMode::ApiKey => "static API key",
    };
    DoctorCheck {
        name: "llm_credentials",
        status: CheckStatus::Pass,
        details: format!(
            "{credential}; model `{}` in folder `{}`",
            config.llm.model, config.llm.folder_id
        ),
    }
}

fn check_orders_destination(config: &AppConfig) -> DoctorCheck {
    match config.orders.backend {
        OrderBackend::Sqlite => DoctorCheck {
            name: "orders_destination",
            status: CheckStatus::Pass,
            details: "orders are stored in the `stamp_order` table".to_string(),
        },
        OrderBackend::Csv => {
            let path = config.orders.csv_path.as_path();
            if path.is_dir() {
                return DoctorCheck {
                    name: "orders_destination",
                    status: CheckStatus::Fail,
                    details: format!("orders.csv_path `{}` is a directory", path.display()),
                };
            }
            let state = if path.exists() { "existing" } else { "new" };
            DoctorCheck {
                name: "orders_destination",
                status: CheckStatus::Pass,
                details: format!("orders are appended to {state} ledger `{}`", path.display()),
            }
        }
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match block_on_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
