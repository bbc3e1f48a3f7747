use std::process::ExitCode;

fn main() -> ExitCode {
    bookclub_cli::run()
}
