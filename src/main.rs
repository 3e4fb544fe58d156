use std::process::exit;

fn main() {
    if let Err(e) = dirsweep::app::run_cli() {
        eprintln!("error: {e}");
        exit(1);
    }
}
