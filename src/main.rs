fn main() {
    if let Err(e) = termnotes::app::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
