//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    if let Err(err) = geomatch_cli::run() {
        eprintln!("geomatch: {err}");
        std::process::exit(1);
    }
}
