//! Thin entry point; see `litertlm_cli::run` for the actual logic.

fn main() {
    if let Err(err) = litertlm_cli::run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
