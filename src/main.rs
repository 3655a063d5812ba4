//! mccomp entry point.

fn main() {
    if let Err(e) = mccomp::cli::run_cli() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
