use actix_cors::Cors;
use actix_web::middleware::{Compress, Logger};
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod batch;
pub mod config;
pub mod dataset;
pub mod generator;
pub mod state;
pub mod template;

pub use crate::config::AppConfig;
pub use crate::state::AppState;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn unprocessable(message: &str) -> Self {
        Self::new("UnprocessableEntity", message)
    }

    pub fn conflict(message: &str) -> Self {
        Self::new("Conflict", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::dataset::routes::inspect_dataset,
        crate::template::routes::inspect_template,
        crate::batch::routes::start_batch,
        crate::batch::routes::list_batches,
        crate::batch::routes::get_batch,
        crate::batch::routes::cancel_batch,
        crate::batch::routes::download_document
    ),
    components(
        schemas(
            dataset::Field,
            dataset::routes::InspectDatasetRequest,
            dataset::routes::DatasetSummary,
            template::routes::InspectTemplateRequest,
            template::routes::TemplateSummary,
            generator::PlaceholderStatus,
            generator::GenerationSummary,
            generator::GenerationFailure,
            generator::BatchProgress,
            batch::BatchRequest,
            batch::BatchStatus,
            batch::BatchJob,
            batch::BatchAccepted,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Datasets", description = "Shapefile attribute table inspection."),
        (name = "Templates", description = "Template placeholder discovery."),
        (name = "Batches", description = "Batch document generation jobs.")
    )
)]
pub struct ApiDoc;

/// Mount every API route under `/api`.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(dataset::routes::config)
            .configure(template::routes::config)
            .configure(batch::routes::config),
    );
}

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let bind = (config.host.clone(), config.port);
    let app_state = web::Data::new(AppState::new(config));

    let prometheus = PrometheusMetricsBuilder::new("survey_generator")
        .endpoint("/metrics")
        .build()
        .map_err(|e| anyhow!("failed to create Prometheus metrics middleware: {}", e))?;

    log::info!(
        "Starting server at http://{}:{} (output root {})",
        bind.0,
        bind.1,
        app_state.config.output_root.display()
    );

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();
        let cors = app_state
            .config
            .cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(Logger::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(app_state)
            .configure(configure_api)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind(bind)
    .context("failed to bind server address")?
    .run()
    .await
    .context("server error")
}
