//! REST API implementation

use std::fmt;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::body::MessageBody;
use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{middleware, web, App, HttpResponse, HttpServer, ResponseError};
use serde_json::json;
use tracing::{debug, error, info, warn};

use docbridge_common::config::ServerConfig;
use docbridge_common::metrics::{self, LatencyTimer};
use docbridge_common::{Error, Result};
use docbridge_query::{QueryEngine, SaveRequest, SearchParams};

/// Largest accepted save body; a stored record cannot exceed 16 MiB anyway
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// REST API server
#[derive(Clone)]
pub struct RestServer {
    config: ServerConfig,
    engine: Arc<QueryEngine>,
}

impl RestServer {
    /// Create a new REST server
    pub fn new(config: &ServerConfig, engine: Arc<QueryEngine>) -> Self {
        Self {
            config: config.clone(),
            engine,
        }
    }

    /// Build CORS middleware based on configuration
    fn build_cors(origins: &[String]) -> Cors {
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            return Cors::permissive();
        }

        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .max_age(3600);

        for origin in origins {
            cors = cors.allowed_origin(origin);
        }

        cors
    }

    /// Bind the listener and return the running server.
    ///
    /// Signal handling is left to the caller, which stops the server through
    /// its handle.
    pub fn start(&self) -> Result<Server> {
        let engine = web::Data::from(self.engine.clone());
        let cors_origins = self.config.cors_origins.clone();

        if cors_origins.is_empty() || cors_origins.iter().any(|o| o == "*") {
            warn!("CORS is configured with wildcard origin - not recommended for production");
        }
        info!(
            "Starting REST API server on {}:{} (store: {})",
            self.config.host,
            self.config.port,
            self.engine.backend_name()
        );

        let mut server = HttpServer::new(move || build_app(engine.clone(), &cors_origins))
            .disable_signals();
        if self.config.workers > 0 {
            server = server.workers(self.config.workers);
        }

        Ok(server
            .bind((self.config.host.as_str(), self.config.port))?
            .run())
    }
}

/// Assemble the application: middleware, routes and error handlers
pub fn build_app(
    engine: web::Data<QueryEngine>,
    cors_origins: &[String],
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let json_config = web::JsonConfig::default()
        .limit(MAX_BODY_BYTES)
        .error_handler(|err, _req| {
            warn!("Rejected save body: {}", err);
            ApiError(Error::Validation(format!("request body must be a JSON object: {}", err)))
                .into()
        });
    let query_config = web::QueryConfig::default().error_handler(|err, _req| {
        ApiError(Error::Validation(format!("invalid query string: {}", err))).into()
    });

    App::new()
        .app_data(engine)
        .app_data(json_config)
        .app_data(query_config)
        .wrap(RestServer::build_cors(cors_origins))
        .wrap(middleware::Compress::default())
        .wrap(middleware::Logger::default())
        .service(
            web::resource("/")
                .route(web::get().to(index))
                .default_service(web::to(method_not_allowed)),
        )
        .service(
            web::resource("/metrics")
                .route(web::get().to(metrics_export))
                .default_service(web::to(method_not_allowed)),
        )
        .service(
            web::scope("/api")
                .service(
                    web::resource("/save")
                        .route(web::post().to(save))
                        .default_service(web::to(method_not_allowed)),
                )
                .service(
                    web::resource("/search")
                        .route(web::get().to(search))
                        .default_service(web::to(method_not_allowed)),
                )
                .service(
                    web::resource("/health")
                        .route(web::get().to(health_check))
                        .default_service(web::to(method_not_allowed)),
                ),
        )
        .default_service(web::to(not_found))
}

// ============================================================================
// Errors
// ============================================================================

/// Error response wrapper: `{"error": message}` with the error's status
#[derive(Debug)]
pub struct ApiError(pub Error);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        if self.0.is_server_error() {
            error!(code = self.0.error_code(), "Request failed: {}", self.0);
        } else {
            debug!(code = self.0.error_code(), "Request rejected: {}", self.0);
        }
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.0.client_message(),
        }))
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn index() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "name": "docbridge",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "HTTP save and search over a document database",
        "endpoints": {
            "save": "/api/save",
            "search": "/api/search",
            "health": "/api/health",
            "metrics": "/metrics",
        },
    }))
}

async fn save(
    engine: web::Data<QueryEngine>,
    request: web::Json<SaveRequest>,
) -> std::result::Result<HttpResponse, ApiError> {
    let _timer = LatencyTimer::new("save");
    let outcome = engine.save(&request).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

async fn search(
    engine: web::Data<QueryEngine>,
    params: web::Query<SearchParams>,
) -> std::result::Result<HttpResponse, ApiError> {
    let _timer = LatencyTimer::new("search");
    let records = engine.search(&params).await?;
    Ok(HttpResponse::Ok().json(records))
}

async fn health_check(engine: web::Data<QueryEngine>) -> HttpResponse {
    let _timer = LatencyTimer::new("health");
    match engine.ping().await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "healthy",
            "message": "Service is running normally",
            "database": "connected",
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(json!({
            "status": "unhealthy",
            "message": "Service is unavailable",
            "database": "disconnected",
            "error": e.to_string(),
        })),
    }
}

async fn metrics_export() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(metrics::export_prometheus())
}

async fn not_found() -> std::result::Result<HttpResponse, ApiError> {
    Err(ApiError(Error::NotFound))
}

async fn method_not_allowed() -> std::result::Result<HttpResponse, ApiError> {
    Err(ApiError(Error::MethodNotAllowed))
}
