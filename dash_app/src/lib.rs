pub mod config;

pub use config::{Config, ConfigError, Environment};

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub trait ContextProvider: Sized {
    fn new(config: Config) -> impl Future<Output = Result<Self, BoxError>>;
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build application context: {0}")]
    Context(#[source] BoxError),
}

/// Install the global tracing subscriber.
///
/// `dev` gets human-readable lines, `prod` one JSON object per event.
/// `RUST_LOG` overrides the default `info` level in both.
pub fn init_tracing(env: Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match env {
        Environment::Dev => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_file(true)
            .with_line_number(true)
            .try_init(),
        Environment::Prod => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            // span fields are flattened into each event already
            .with_current_span(false)
            .with_ansi(false)
            .with_target(false)
            .try_init(),
    };

    if let Err(err) = result {
        // only happens if a subscriber is already installed, e.g. in tests
        tracing::debug!(error = %err, "tracing already initialised");
    }
}

/// Load [`Config`] from the environment, set up logging for the configured
/// environment and build the application context.
///
/// # Errors
/// If the configuration cannot be extracted from the environment variables,
/// is out of range, or the context itself fails to build.
pub async fn create_app_context<A>() -> Result<A, AppError>
where
    A: ContextProvider,
{
    let config = Config::load();

    // log config errors in the default format rather than not at all
    init_tracing(config.as_ref().map_or(Environment::Dev, |c| c.env));

    let config = config?;
    tracing::info!(env = ?config.env, addr = %config.addr, "configuration loaded");

    A::new(config).await.map_err(AppError::Context)
}
