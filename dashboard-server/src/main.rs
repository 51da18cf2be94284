use dashboard_server::app::{self, AppResult, ServerProperties};
use dashboard_server::error::ServerError;
use error_stack::ResultExt;
use error_stack::fmt::ColorMode;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    match try_main().await {
        Ok(_) => info!("dashboard development server shutting down"),
        Err(e) => {
            error!("dashboard development server exited with error: {e:?}");
        }
    }
}

fn init_logging(filter: EnvFilter) {
    error_stack::Report::set_color_mode(ColorMode::None);

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

async fn try_main() -> AppResult<()> {
    let (filter, dotenv_error) = app::load_environment(None, app::LOG);
    init_logging(filter);

    if let Some(e) = dotenv_error {
        warn!("failed to load .env file: {e}");
    }

    let properties = ServerProperties::from_env().change_context(ServerError)?;
    let routes = app::build_routes(&properties).await?;

    app::run(routes, &properties).await
}
