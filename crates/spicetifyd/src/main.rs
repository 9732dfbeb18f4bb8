use std::process::ExitCode;

fn main() -> ExitCode {
    match spicetifyd::run_daemon() {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("spicetifyd: {error}");
            ExitCode::FAILURE
        }
    }
}
