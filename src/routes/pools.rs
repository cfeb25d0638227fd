use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;
use crate::error::MatchingError;
use crate::models::{ErrorResponse, HealthResponse, RunMatchingRequest};
use crate::pool::{run_automatic_matching, Orchestrator};
use crate::services::PgRepository;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Present when running against PostgreSQL; used by the health check
    pub database: Option<Arc<PgRepository>>,
}

/// Configure admin routes for pools and matching runs
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/pools", web::get().to(list_pools))
        .route("/matching/run", web::post().to(run_matching))
        .route("/matching/automatic", web::post().to(run_automatic));
}

fn error_response(err: &MatchingError) -> HttpResponse {
    match err {
        MatchingError::PoolNotFound(_) => HttpResponse::NotFound().json(ErrorResponse {
            error: "Pool not found".to_string(),
            message: err.to_string(),
            status_code: 404,
        }),
        MatchingError::Configuration(_) => HttpResponse::BadRequest().json(ErrorResponse {
            error: "Invalid configuration".to_string(),
            message: err.to_string(),
            status_code: 400,
        }),
        MatchingError::Storage(_) => HttpResponse::InternalServerError().json(ErrorResponse {
            error: "Storage error".to_string(),
            message: err.to_string(),
            status_code: 500,
        }),
    }
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let healthy = match &state.database {
        Some(db) => db.health_check().await.unwrap_or(false),
        None => true,
    };

    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// List registered pools
///
/// GET /api/v1/pools
async fn list_pools(state: web::Data<AppState>) -> impl Responder {
    match state.orchestrator.pool_summaries().await {
        Ok(pools) => HttpResponse::Ok().json(pools),
        Err(e) => {
            tracing::error!("Failed to summarize pools: {}", e);
            error_response(&e)
        }
    }
}

/// Run one pool, as a dry run unless `apply` is set
///
/// POST /api/v1/matching/run
///
/// Request body:
/// ```json
/// {
///   "pool": "lern-fair-now",
///   "apply": false
/// }
/// ```
async fn run_matching(
    state: web::Data<AppState>,
    req: web::Json<RunMatchingRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for run_matching request: {:?}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    match state.orchestrator.run_matching(&req.pool, req.apply).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => {
            tracing::error!("Matching run for pool '{}' failed: {}", req.pool, e);
            error_response(&e)
        }
    }
}

/// Run the automatic gate across all pools
///
/// POST /api/v1/matching/automatic
async fn run_automatic(state: web::Data<AppState>) -> impl Responder {
    let report = run_automatic_matching(&state.orchestrator).await;
    HttpResponse::Ok().json(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};
    use crate::models::MatchingWeights;
    use crate::pool::{PoolDefinition, PoolRegistry};
    use crate::services::InMemoryRepository;

    fn state() -> AppState {
        let repository = Arc::new(InMemoryRepository::default());
        let definition = PoolDefinition {
            name: "empty".to_string(),
            helpers: Default::default(),
            helpees: Default::default(),
            weights: MatchingWeights::balanced(),
            automatic: None,
        };
        let registry = PoolRegistry::from_definitions(vec![definition], repository.clone()).unwrap();

        AppState {
            orchestrator: Arc::new(Orchestrator::new(Arc::new(registry), repository)),
            database: None,
        }
    }

    #[actix_web::test]
    async fn test_unknown_pool_is_not_found() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/matching/run")
            .set_json(serde_json::json!({ "pool": "missing" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_empty_pool_name_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/matching/run")
            .set_json(serde_json::json!({ "pool": "" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_dry_run_of_empty_pool() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/matching/run")
            .set_json(serde_json::json!({ "pool": "empty" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["pool"], "empty");
        assert_eq!(body["applied"], false);
        assert_eq!(body["assignments"].as_array().map(Vec::len), Some(0));
    }
}
