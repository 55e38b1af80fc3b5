use std::process::ExitCode;

fn main() -> ExitCode {
    ziwu_cli::run()
}
