use std::process::ExitCode;

fn main() -> ExitCode {
    match survey_extract::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Survey extract failed to start: {e}");
            eprintln!("survey-extract: {e}");
            ExitCode::FAILURE
        }
    }
}
