use std::process::ExitCode;

fn main() -> ExitCode {
    match coverdisp::entry::start() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
