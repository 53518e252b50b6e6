//! HTTP surface for the survey service.

pub mod routes;

use crate::classifier::{ClassifierConfig, EmotionClassifier};
use crate::config::{Config, ServerConfig, StorageBackend};
use crate::service::SurveyService;
use crate::store::{JsonFileStore, LocalBlobStore, MemoryStore, SurveyStore};
use anyhow::{Context, Result};
use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

pub type AppState = Arc<SurveyService>;

/// Build the router for the survey API.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let mut app = Router::new()
        .route("/health", get(routes::health))
        .route("/api/surveys", post(routes::create_survey))
        .route("/api/surveys/:id", get(routes::get_survey))
        .route(
            "/api/surveys/:id/responses",
            post(routes::submit_response),
        )
        .route("/api/surveys/:id/analytics", get(routes::analytics))
        .route("/api/files", get(routes::list_files))
        .route(
            "/api/files/:name",
            get(routes::download_file)
                .put(routes::upload_file)
                .delete(routes::delete_file),
        )
        .route("/api/results", get(routes::list_results))
        .with_state(state);

    if let Some(ref dir) = config.static_dir {
        info!("Serving static files from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }

    if config.cors {
        let cors = CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([CONTENT_TYPE])
            .max_age(Duration::from_secs(60 * 60));
        app = app.layer(cors);
    }

    app.layer(TraceLayer::new_for_http())
}

/// Assemble the service from configuration.
pub fn build_service(config: &Config) -> Result<SurveyService> {
    let store: Arc<dyn SurveyStore> = match config.storage.backend {
        StorageBackend::File => {
            info!("Using data file {}", config.storage.data_file.display());
            Arc::new(JsonFileStore::new(&config.storage.data_file))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; surveys will not survive a restart");
            Arc::new(MemoryStore)
        }
    };

    let mut service = SurveyService::new(store).context("Failed to load survey data")?;

    if let Some(ref root) = config.storage.blob_root {
        info!("Blob store at {}", root.display());
        service = service.with_blob_store(Arc::new(LocalBlobStore::new(root)));
    }

    if config.classifier.enabled {
        match config.classifier.token() {
            Some(token) => {
                let classifier = EmotionClassifier::new(ClassifierConfig {
                    api_url: config.classifier.api_url.clone(),
                    model: config.classifier.model.clone(),
                    token,
                    timeout_seconds: config.classifier.timeout_seconds,
                })
                .context("Failed to create classifier")?;
                service = service.with_classifier(Arc::new(classifier));
            }
            None => warn!(
                "Classification enabled but {} is not set; skipping",
                config.classifier.token_env
            ),
        }
    }

    Ok(service)
}

/// Run the survey server until Ctrl+C or SIGTERM.
pub async fn serve(config: Config) -> Result<()> {
    info!("Initializing state...");
    let state = Arc::new(build_service(&config)?);
    let app = build_router(state, &config.server);

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Server running on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
