use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable that overrides the configured log filter.
pub const LOG_ENV: &str = "MARKSYNC_LOG";

/// Installs the global subscriber, writing to stderr so stdout stays free for
/// protocol output. `$MARKSYNC_LOG` wins over `filter`; an unparsable filter
/// falls back to `info`. Calling it twice is harmless.
pub fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    let _ = Registry::default().with(env_filter).with(fmt_layer).try_init();
}
