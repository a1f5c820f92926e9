use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install the global tracing subscriber (stderr, env-filtered).
///
/// `log` records (sqlx logs through `log`) are bridged into tracing.
/// Safe to call more than once; later calls are no-ops, which keeps
/// test binaries from fighting over the global default.
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_log::LogTracer::init();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
