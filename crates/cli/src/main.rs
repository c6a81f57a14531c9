use std::process::ExitCode;

fn main() -> ExitCode {
    stampdesk_cli::run()
}
