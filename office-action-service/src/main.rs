use office_action_service::create_app;
use office_action_service::llm;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured tracing based on environment variables
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "office_action_service=debug,stage_flow=debug,tower_http=debug".into()
    });

    match log_format.as_str() {
        "pretty" => {
            // Human-readable logging for development
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            // Structured JSON logging for production
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // LLM credentials are read once here; a missing variable does not stop
    // the process, it fails each analysis call with a typed error instead.
    for var in [llm::ENDPOINT_VAR, llm::API_KEY_VAR, llm::API_VERSION_VAR] {
        if std::env::var(var).is_err() {
            warn!("{var} is not set; LLM stages will fail until the environment is configured");
        }
    }

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .unwrap_or(3000);

    let app = create_app().await;
    let listener = TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    let addr = listener.local_addr()?;

    info!("Office action analysis service starting on {}", addr);
    info!("Health check endpoint: http://{}/health", addr);
    info!("Create a session: POST http://{}/cases", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
