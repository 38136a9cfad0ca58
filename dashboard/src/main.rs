use dash_app::{BoxError, Config, ContextProvider};
use dash_axum::RouterOptions;
use dash_http::JsonClient;

mod widgets;

#[derive(Debug, Clone)]
struct AppContext {
    config: Config,
    http: JsonClient,
}

impl ContextProvider for AppContext {
    async fn new(config: Config) -> Result<Self, BoxError> {
        // shared by every widget that talks to a public JSON API
        let http = JsonClient::new(&config.user_agent)?
            .with_retries(config.http_retries)
            .with_backoff(config.http_backoff());

        Ok(Self { config, http })
    }
}

fn app(context: &AppContext) -> Result<axum::Router, BoxError> {
    let registry = widgets::build_registry(&context.config, &context.http)?;

    let options = RouterOptions {
        request_timeout: context.config.request_timeout(),
        ..RouterOptions::default()
    };

    Ok(dash_axum::router(&registry, &options))
}

async fn run() -> Result<(), BoxError> {
    let context: AppContext = dash_app::create_app_context().await?;
    let app = app(&context)?;

    dash_axum::run_app(app, &context.config.addr).await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!(error = %err, "startup_failed");
        std::process::exit(1);
    }
}
