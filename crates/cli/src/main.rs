use std::process::ExitCode;

fn main() -> ExitCode {
    orderflow_cli::run()
}
