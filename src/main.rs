//! minic entry point.

fn main() {
    if minic::cli::run_cli().is_err() {
        std::process::exit(1);
    }
}
