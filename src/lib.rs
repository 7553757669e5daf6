use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod admin;
pub mod auth;
pub mod checkout;
pub mod config;
pub mod db;
pub mod documents;
pub mod generation;
pub mod purchases;
pub mod storage;
pub mod users;

pub use crate::db::AppState;

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

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

pub async fn run() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    #[derive(OpenApi)]
    #[openapi(
        paths(
            crate::checkout::handlers::create_checkout,
            crate::checkout::handlers::payment_webhook,
            crate::documents::handlers::list_my_purchases,
            crate::documents::handlers::purchase_artifacts,
            crate::documents::handlers::download_document,
            crate::admin::handlers::list_purchases,
            crate::admin::handlers::user_purchases,
            crate::admin::handlers::reprocess,
            crate::auth::handlers::login,
            crate::auth::handlers::refresh_token,
        ),
        components(
            schemas(
                checkout::event::CartItem,
                checkout::handlers::CreateCheckoutRequest,
                checkout::handlers::CreateCheckoutResponse,
                checkout::handlers::WebhookAck,
                purchases::models::Purchase,
                purchases::models::LineItem,
                purchases::models::ItemState,
                purchases::models::GeneratedUnit,
                purchases::models::ArtifactSet,
                purchases::models::ArtifactRef,
                purchases::models::ArtifactKind,
                purchases::models::PurchaseStatus,
                documents::handlers::PurchaseArtifactsResponse,
                documents::handlers::ItemArtifacts,
                documents::handlers::UnitArtifacts,
                documents::handlers::ArtifactLink,
                auth::model::LoginRequest,
                auth::model::TokenResponse,
                auth::model::RefreshRequest,
                users::model::UserInfo,
                users::model::Role,
                ErrorResponse,
            )
        ),
        tags(
            (name = "Checkout", description = "Checkout creation and payment webhook."),
            (name = "Purchases", description = "Purchase and document read endpoints."),
            (name = "Admin", description = "Ledger administration and reprocessing."),
            (name = "Authentication", description = "Login and token refresh.")
        ),
        servers(
            (url = "http://127.0.0.1:8080", description = "Localhost server")
        )
    )]
    struct ApiDoc;

    dotenvy::dotenv().ok(); // Load .env file
    let app_state = match AppState::new().await {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!("Failed to initialize application state. Check DATABASE_URL and the provider credentials in .env. Error: {}", e);
            std::process::exit(1);
        }
    };

    let prometheus = PrometheusMetricsBuilder::new("lexigen_server")
        .endpoint("/metrics")
        .build()
        .expect("Failed to create Prometheus metrics middleware");

    log::info!("Starting server at http://0.0.0.0:8080");

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();
        let cors = Cors::default()
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://localhost:8080")
            .allowed_origin("http://127.0.0.1:8080")
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(app_state)
            .service(
                web::scope("/api")
                    .configure(auth::handlers::config)
                    .configure(admin::handlers::config)
                    .configure(documents::handlers::config)
                    .service(
                        web::resource("/checkout")
                            .route(web::post().to(checkout::handlers::create_checkout)),
                    ),
            )
            // Outside /api: the provider calls this URL directly, and the
            // raw body must reach the handler without any JSON extractor.
            .service(
                web::resource("/webhooks/payment")
                    .route(web::post().to(checkout::handlers::payment_webhook)),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .backlog(8192)
    .max_connections(25000)
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}
