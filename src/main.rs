fn main() {
    if let Err(err) = waterguard_lib::run() {
        log::error!("{err:#}");
        eprintln!("waterguard: {err:#}");
        std::process::exit(1);
    }
}
