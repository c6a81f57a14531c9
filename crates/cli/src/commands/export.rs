use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use stampdesk_core::config::{AppConfig, LoadOptions};
use stampdesk_core::FieldSchema;
use stampdesk_db::{connect_with_settings, write_orders_csv, SqlOrderRepository};

use crate::commands::{block_on_runtime, CommandResult};

/// Dumps the sqlite order table in the same layout as the CSV ledger.
pub fn run(output: Option<&Path>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "export",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match block_on_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "export",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let orders = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let orders = SqlOrderRepository::new(pool.clone())
            .list()
            .await
            .map_err(|error| ("order_query", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(orders)
    });
    let orders = match orders {
        Ok(orders) => orders,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("export", error_class, message, exit_code);
        }
    };

    let schema = FieldSchema::order();
    match output {
        Some(path) => {
            let written = File::create(path)
                .map_err(|error| error.to_string())
                .and_then(|file| {
                    write_orders_csv(BufWriter::new(file), &schema, &orders)
                        .map_err(|error| error.to_string())
                });
            match written {
                Ok(()) => CommandResult::success(
                    "export",
                    format!("exported {} orders to {}", orders.len(), path.display()),
                ),
                Err(message) => CommandResult::failure("export", "csv_write", message, 6),
            }
        }
        None => {
            let mut buffer = Vec::new();
            if let Err(error) = write_orders_csv(&mut buffer, &schema, &orders) {
                return CommandResult::failure("export", "csv_write", error.to_string(), 6);
            }
            let csv = String::from_utf8_lossy(&buffer).trim_end().to_owned();
            CommandResult { exit_code: 0, output: csv }
        }
    }
}
