fn main() {
    #[cfg(feature = "cli")]
    mangler::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("mangler: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
