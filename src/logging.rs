/// Logging module - logger setup shared by the binaries
///
/// Initialise `env_logger` with `default_level` unless `RUST_LOG` is set.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(default_level: &str) {
    let env = env_logger::Env::default().default_filter_or(default_level);
    if env_logger::Builder::from_env(env)
        .format_timestamp_micros()
        .try_init()
        .is_err()
    {
        log::debug!("Logger already initialised");
    }
}
