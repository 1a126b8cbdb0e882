use std::process::ExitCode;

fn main() -> ExitCode {
    newsbot_cli::run()
}
