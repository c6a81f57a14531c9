pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "stampdesk",
    about = "Stampdesk operator CLI",
    long_about = "Inspect configuration, check readiness, apply migrations and export collected stamp orders.",
    after_help = "Examples:\n  stampdesk doctor --json\n  stampdesk config\n  stampdesk export --output orders.csv"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Telegram and LLM credentials, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Export stored orders as CSV with the question header row")]
    Export {
        #[arg(long, short, help = "Write the CSV to this file instead of stdout")]
        output: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Export { output } => commands::export::run(output.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
