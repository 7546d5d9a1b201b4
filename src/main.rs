fn main() {
    if let Err(err) = chatwatch_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
