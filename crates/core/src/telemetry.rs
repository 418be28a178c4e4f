use tracing_subscriber::{EnvFilter, fmt};

/// Initialise the global tracing subscriber with `info` as the fallback filter.
pub fn init() {
    init_with_default("info");
}

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_directives` is used, e.g.
/// `"info,sqlx=warn"`. Calling this twice is harmless: the second install is
/// ignored.
pub fn init_with_default(default_directives: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
