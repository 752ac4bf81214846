//! chatdeck CLI binary entrypoint.

fn main() {
    if let Err(err) = chatdeck_cli::app::run() {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
